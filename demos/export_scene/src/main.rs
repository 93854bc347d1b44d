use argh::FromArgs;
use std::path::PathBuf;

use rig2colmap::export::{
    command, CancelToken, DatasetExporter, DryRunRenderer, ExportConfig, ExportOutcome, Scene,
};

#[derive(FromArgs, Debug)]
/// Export the marked cameras of a JSON scene as a COLMAP dataset
struct Args {
    /// path to the scene description
    #[argh(option, short = 's')]
    scene: PathBuf,

    /// existing directory to write the dataset into
    #[argh(option, short = 'o')]
    output: PathBuf,

    /// model format, .txt or .bin
    #[argh(option, short = 'f')]
    format: Option<String>,

    /// prefix of the collections to export
    #[argh(option)]
    prefix: Option<String>,

    /// path to a JSON export config
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// only log what would be rendered and written
    #[argh(switch)]
    dry_run: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    log::info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => serde_json::from_str::<ExportConfig>(&std::fs::read_to_string(path)?)?,
        None => ExportConfig::default(),
    };
    if let Some(format) = args.format {
        config.format = format;
    }
    if let Some(prefix) = args.prefix {
        config.collection_prefix = prefix;
    }
    config.dry_run |= args.dry_run;

    let scene: Scene = serde_json::from_str(&std::fs::read_to_string(&args.scene)?)?;

    // stop between two cameras on Ctrl-C
    let cancel_token = CancelToken::new();
    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            log::warn!("Received Ctrl-C signal. Cancelling the export");
            cancel_token.cancel();
        }
    })?;

    let exporter = DatasetExporter::new(config).with_cancel_token(cancel_token);
    let mut renderer = DryRunRenderer::new();

    let outcome = command::execute(&exporter, &scene, &mut renderer, &args.output, |progress| {
        log::info!("Progress: {progress:.1}%");
    })?;

    match outcome {
        ExportOutcome::Finished => log::info!("Dataset written to {}", args.output.display()),
        ExportOutcome::Warning(message) => log::warn!("{message}"),
    }

    Ok(())
}
