use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use super::{
    atomic::write_atomic,
    types::{check_image_name, check_num_params, check_observations, insert_unique},
    CameraModelId, ColmapCamera, ColmapError, ColmapImage, ColmapPoint3d, TrackElement,
};

/// Read the cameras.txt file and return the cameras keyed by id.
///
/// # Arguments
///
/// * `path` - The path to the cameras.txt file.
///
/// # Returns
///
/// A map from camera id to ColmapCamera.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<BTreeMap<u32, ColmapCamera>, ColmapError> {
    let file = File::open(path)?;
    decode_cameras_txt(BufReader::new(file))
}

/// Read the images.txt file and return the images keyed by id.
///
/// # Arguments
///
/// * `path` - The path to the images.txt file.
///
/// # Returns
///
/// A map from image id to ColmapImage.
pub fn read_images_txt(path: impl AsRef<Path>) -> Result<BTreeMap<u32, ColmapImage>, ColmapError> {
    let file = File::open(path)?;
    decode_images_txt(BufReader::new(file))
}

/// Read the points3D.txt file and return the points keyed by id.
///
/// # Arguments
///
/// * `path` - The path to the points3D.txt file.
///
/// # Returns
///
/// A map from point id to ColmapPoint3d.
pub fn read_points3d_txt(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<u64, ColmapPoint3d>, ColmapError> {
    let file = File::open(path)?;
    decode_points3d_txt(BufReader::new(file))
}

/// Write the cameras to a cameras.txt file, replacing it atomically.
pub fn write_cameras_txt(
    path: impl AsRef<Path>,
    cameras: &BTreeMap<u32, ColmapCamera>,
) -> Result<(), ColmapError> {
    write_atomic(path.as_ref(), |writer| encode_cameras_txt(writer, cameras))
}

/// Write the images to an images.txt file, replacing it atomically.
pub fn write_images_txt(
    path: impl AsRef<Path>,
    images: &BTreeMap<u32, ColmapImage>,
) -> Result<(), ColmapError> {
    write_atomic(path.as_ref(), |writer| encode_images_txt(writer, images))
}

/// Write the points to a points3D.txt file, replacing it atomically.
pub fn write_points3d_txt(
    path: impl AsRef<Path>,
    points: &BTreeMap<u64, ColmapPoint3d>,
) -> Result<(), ColmapError> {
    write_atomic(path.as_ref(), |writer| encode_points3d_txt(writer, points))
}

/// Decode cameras from text. Blank lines and `#` comments are skipped.
pub fn decode_cameras_txt<R: BufRead>(
    reader: R,
) -> Result<BTreeMap<u32, ColmapCamera>, ColmapError> {
    let mut cameras = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        if is_skipped(&line) {
            continue;
        }
        let camera = parse_camera_line(&line)?;
        insert_unique("camera", &mut cameras, camera.camera_id, camera)?;
    }
    Ok(cameras)
}

/// Decode images from text.
///
/// Each image takes two lines; the second one lists the 2d points and may be
/// empty, so it is consumed unconditionally after a pose line.
pub fn decode_images_txt<R: BufRead>(reader: R) -> Result<BTreeMap<u32, ColmapImage>, ColmapError> {
    let mut images = BTreeMap::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next() {
        let line = line?;
        if is_skipped(&line) {
            continue;
        }
        let points_line = lines.next().ok_or(ColmapError::Truncated("images"))??;
        let image = parse_image_lines(&line, &points_line)?;
        insert_unique("image", &mut images, image.image_id, image)?;
    }
    Ok(images)
}

/// Decode 3d points from text. Blank lines and `#` comments are skipped.
pub fn decode_points3d_txt<R: BufRead>(
    reader: R,
) -> Result<BTreeMap<u64, ColmapPoint3d>, ColmapError> {
    let mut points = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        if is_skipped(&line) {
            continue;
        }
        let point = parse_point3d_line(&line)?;
        insert_unique("point3D", &mut points, point.point3d_id, point)?;
    }
    Ok(points)
}

/// Encode cameras as text, header comments included.
pub fn encode_cameras_txt<W: Write>(
    writer: &mut W,
    cameras: &BTreeMap<u32, ColmapCamera>,
) -> Result<(), ColmapError> {
    writeln!(writer, "# Camera list with one line of data per camera:")?;
    writeln!(writer, "#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]")?;
    writeln!(writer, "# Number of cameras: {}", cameras.len())?;
    for camera in cameras.values() {
        check_num_params(camera)?;
        write!(
            writer,
            "{} {} {} {}",
            camera.camera_id,
            camera.model_id.name(),
            camera.width,
            camera.height
        )?;
        for param in &camera.params {
            write!(writer, " {}", format_f64(*param))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Encode images as text, header comments included.
pub fn encode_images_txt<W: Write>(
    writer: &mut W,
    images: &BTreeMap<u32, ColmapImage>,
) -> Result<(), ColmapError> {
    let num_observations = images.values().map(|image| image.point3d_ids.len()).sum::<usize>();
    writeln!(writer, "# Image list with two lines of data per image:")?;
    writeln!(writer, "#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME")?;
    writeln!(writer, "#   POINTS2D[] as (X, Y, POINT3D_ID)")?;
    writeln!(
        writer,
        "# Number of images: {}, mean observations per image: {}",
        images.len(),
        format_mean(num_observations, images.len())
    )?;

    for image in images.values() {
        check_observations(image)?;
        check_image_name(&image.name)?;

        write!(writer, "{}", image.image_id)?;
        for value in image.qvec.iter().chain(image.tvec.iter()) {
            write!(writer, " {}", format_f64(*value))?;
        }
        writeln!(writer, " {} {}", image.camera_id, image.name)?;

        let points = image
            .xys
            .iter()
            .zip(&image.point3d_ids)
            .map(|(xy, id)| format!("{} {} {}", format_f64(xy[0]), format_f64(xy[1]), id))
            .collect::<Vec<_>>();
        writeln!(writer, "{}", points.join(" "))?;
    }
    Ok(())
}

/// Encode 3d points as text, header comments included.
pub fn encode_points3d_txt<W: Write>(
    writer: &mut W,
    points: &BTreeMap<u64, ColmapPoint3d>,
) -> Result<(), ColmapError> {
    let track_length = points.values().map(|point| point.track.len()).sum::<usize>();
    writeln!(writer, "# 3D point list with one line of data per point:")?;
    writeln!(
        writer,
        "#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)"
    )?;
    writeln!(
        writer,
        "# Number of points: {}, mean track length: {}",
        points.len(),
        format_mean(track_length, points.len())
    )?;

    for point in points.values() {
        write!(writer, "{}", point.point3d_id)?;
        for value in point.xyz {
            write!(writer, " {}", format_f64(value))?;
        }
        let [r, g, b] = point.rgb;
        write!(writer, " {} {} {} {}", r, g, b, format_f64(point.error))?;
        for element in &point.track {
            write!(writer, " {} {}", element.image_id, element.point2d_idx)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn is_skipped(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Shortest representation that parses back to the same value.
fn format_f64(value: f64) -> String {
    format!("{value:?}")
}

fn format_mean(total: usize, count: usize) -> String {
    match count {
        0 => "0".to_string(),
        _ => format_f64(total as f64 / count as f64),
    }
}

/// Utility functions for parsing COLMAP text files
fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, ColmapError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| ColmapError::ParseError(format!("{}: {}", s, e)))
}

fn parse_array<const N: usize, T>(parts: &[&str]) -> Result<[T; N], ColmapError>
where
    T: std::str::FromStr + Copy + Default,
    T::Err: std::fmt::Display,
{
    if parts.len() != N {
        return Err(ColmapError::ParseError(format!(
            "Expected {} values, got {}",
            N,
            parts.len()
        )));
    }
    let mut values = [T::default(); N];
    for (value, part) in values.iter_mut().zip(parts) {
        *value = parse_part(part)?;
    }
    Ok(values)
}

/// Parse a camera line and return a ColmapCamera struct.
/// NOTE: The number of parameters depends on the camera model.
///       CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[0], PARAMS[1], ...
fn parse_camera_line(line: &str) -> Result<ColmapCamera, ColmapError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 4 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of parts: {}",
            parts.len()
        )));
    }

    let camera = ColmapCamera {
        camera_id: parse_part(parts[0])?,
        model_id: CameraModelId::from_name(parts[1])?,
        width: parse_part(parts[2])?,
        height: parse_part(parts[3])?,
        params: parts[4..]
            .iter()
            .map(|s| parse_part(s))
            .collect::<Result<Vec<_>, _>>()?,
    };
    check_num_params(&camera)?;

    Ok(camera)
}

/// Split off `n` whitespace separated fields and return them with the rest of
/// the line, which must be non-empty.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut rest = line.trim();
    let mut fields = Vec::with_capacity(n);
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Some((fields, rest))
}

/// Parse an image and return a ColmapImage struct.
/// #   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
/// #   POINTS2D[] as (X, Y, POINT3D_ID)
fn parse_image_lines(pose_line: &str, points_line: &str) -> Result<ColmapImage, ColmapError> {
    let (parts, name) = split_fields(pose_line, 9).ok_or_else(|| {
        ColmapError::ParseError(format!("Invalid image line: {}", pose_line.trim()))
    })?;

    let points = points_line.split_whitespace().collect::<Vec<_>>();
    if points.len() % 3 != 0 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of point2D values: {}",
            points.len()
        )));
    }

    let (xys, point3d_ids): (Vec<_>, Vec<_>) = points
        .chunks_exact(3)
        .map(|chunk| -> Result<([f64; 2], i64), ColmapError> {
            Ok((
                [parse_part(chunk[0])?, parse_part(chunk[1])?],
                parse_part(chunk[2])?,
            ))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .unzip();

    Ok(ColmapImage {
        image_id: parse_part(parts[0])?,
        qvec: parse_array(&parts[1..5])?,
        tvec: parse_array(&parts[5..8])?,
        camera_id: parse_part(parts[8])?,
        name: name.to_string(),
        xys,
        point3d_ids,
    })
}

/// Parse a point3d line and return a ColmapPoint3d struct.
/// NOTE: The track length varies per point.
///       POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[0], TRACK[1], ...
fn parse_point3d_line(line: &str) -> Result<ColmapPoint3d, ColmapError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 8 || (parts.len() - 8) % 2 != 0 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of parts: {}",
            parts.len()
        )));
    }

    Ok(ColmapPoint3d {
        point3d_id: parse_part(parts[0])?,
        xyz: parse_array(&parts[1..4])?,
        rgb: parse_array(&parts[4..7])?,
        error: parse_part(parts[7])?,
        track: parts[8..]
            .chunks_exact(2)
            .map(|chunk| -> Result<TrackElement, ColmapError> {
                Ok(TrackElement {
                    image_id: parse_part(chunk[0])?,
                    point2d_idx: parse_part(chunk[1])?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMERAS_TXT: &str = "\
# Camera list with one line of data per camera:
#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]
# Number of cameras: 2
1 OPENCV 800 600 777.7777777777778 875.0 400.0 300.0 0.0 0.0 0.0 0.0
2 PINHOLE 640 480 500.0 500.0 320.0 240.0
";

    const IMAGES_TXT: &str = "\
# Image list with two lines of data per image:
#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
#   POINTS2D[] as (X, Y, POINT3D_ID)
# Number of images: 2, mean observations per image: 1.0
1 0.0 1.0 0.0 0.0 -1.0 2.0 3.0 1 A.jpg

2 1.0 0.0 0.0 0.0 0.5 0.25 -4.0 2 Camera 2.jpg
10.5 20.25 7 30.0 40.0 -1
";

    const POINTS_TXT: &str = "\
# 3D point list with one line of data per point:
#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)
# Number of points: 1, mean track length: 1.0
7 1.0 2.0 3.0 255 128 0 0.5 2 0
";

    #[test]
    fn test_decode_cameras() -> Result<(), ColmapError> {
        let cameras = decode_cameras_txt(CAMERAS_TXT.as_bytes())?;
        assert_eq!(cameras.len(), 2);
        let camera = &cameras[&1];
        assert_eq!(camera.model_id, CameraModelId::CameraModelOpenCV);
        assert_eq!((camera.width, camera.height), (800, 600));
        assert_eq!(camera.params.len(), 8);
        assert_eq!(camera.params[0], 777.7777777777778);
        assert_eq!(cameras[&2].model_id, CameraModelId::CameraModelPinhole);
        Ok(())
    }

    #[test]
    fn test_decode_images_with_empty_points_line() -> Result<(), ColmapError> {
        let images = decode_images_txt(IMAGES_TXT.as_bytes())?;
        assert_eq!(images.len(), 2);

        let first = &images[&1];
        assert_eq!(first.qvec, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(first.tvec, [-1.0, 2.0, 3.0]);
        assert_eq!(first.name, "A.jpg");
        assert!(first.xys.is_empty());
        assert!(first.point3d_ids.is_empty());

        let second = &images[&2];
        assert_eq!(second.name, "Camera 2.jpg");
        assert_eq!(second.xys, vec![[10.5, 20.25], [30.0, 40.0]]);
        assert_eq!(second.point3d_ids, vec![7, -1]);
        Ok(())
    }

    #[test]
    fn test_decode_points3d() -> Result<(), ColmapError> {
        let points = decode_points3d_txt(POINTS_TXT.as_bytes())?;
        let point = &points[&7];
        assert_eq!(point.xyz, [1.0, 2.0, 3.0]);
        assert_eq!(point.rgb, [255, 128, 0]);
        assert_eq!(point.error, 0.5);
        assert_eq!(
            point.track,
            vec![TrackElement {
                image_id: 2,
                point2d_idx: 0
            }]
        );
        Ok(())
    }

    #[test]
    fn test_encode_matches_reference_layout() -> Result<(), ColmapError> {
        let cameras = decode_cameras_txt(CAMERAS_TXT.as_bytes())?;
        let mut buffer = Vec::new();
        encode_cameras_txt(&mut buffer, &cameras)?;
        assert_eq!(String::from_utf8_lossy(&buffer), CAMERAS_TXT);

        let points = decode_points3d_txt(POINTS_TXT.as_bytes())?;
        let mut buffer = Vec::new();
        encode_points3d_txt(&mut buffer, &points)?;
        assert_eq!(String::from_utf8_lossy(&buffer), POINTS_TXT);

        let images = decode_images_txt(IMAGES_TXT.as_bytes())?;
        let mut buffer = Vec::new();
        encode_images_txt(&mut buffer, &images)?;
        assert_eq!(String::from_utf8_lossy(&buffer), IMAGES_TXT);
        Ok(())
    }

    #[test]
    fn test_encode_empty_tables() -> Result<(), ColmapError> {
        let mut buffer = Vec::new();
        encode_images_txt(&mut buffer, &BTreeMap::new())?;
        let text = String::from_utf8_lossy(&buffer);
        assert!(text.ends_with("# Number of images: 0, mean observations per image: 0\n"));

        let mut buffer = Vec::new();
        encode_points3d_txt(&mut buffer, &BTreeMap::new())?;
        let text = String::from_utf8_lossy(&buffer);
        assert!(text.ends_with("# Number of points: 0, mean track length: 0\n"));
        Ok(())
    }

    #[test]
    fn test_unknown_model_name() {
        let text = "1 PINHOLE_DELUXE 10 10 1.0 1.0 5.0 5.0\n";
        assert!(matches!(
            decode_cameras_txt(text.as_bytes()),
            Err(ColmapError::UnknownCameraModel(name)) if name == "PINHOLE_DELUXE"
        ));
    }

    #[test]
    fn test_wrong_param_count() {
        let text = "1 OPENCV 800 600 1.0 1.0 400.0 300.0\n";
        assert!(matches!(
            decode_cameras_txt(text.as_bytes()),
            Err(ColmapError::InvalidNumCameraParams {
                expected: 8,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_lines() {
        // missing name
        let text = "1 1.0 0.0 0.0 0.0 0.0 0.0 0.0 1\n\n";
        assert!(matches!(
            decode_images_txt(text.as_bytes()),
            Err(ColmapError::ParseError(_))
        ));

        // missing points line
        let text = "1 1.0 0.0 0.0 0.0 0.0 0.0 0.0 1 a.jpg";
        assert!(matches!(
            decode_images_txt(text.as_bytes()),
            Err(ColmapError::Truncated("images"))
        ));

        // incomplete observation triple
        let text = "1 1.0 0.0 0.0 0.0 0.0 0.0 0.0 1 a.jpg\n1.0 2.0\n";
        assert!(matches!(
            decode_images_txt(text.as_bytes()),
            Err(ColmapError::ParseError(_))
        ));

        // odd track
        let text = "7 1.0 2.0 3.0 255 128 0 0.5 2\n";
        assert!(matches!(
            decode_points3d_txt(text.as_bytes()),
            Err(ColmapError::ParseError(_))
        ));

        // color out of range
        let text = "7 1.0 2.0 3.0 256 128 0 0.5\n";
        assert!(matches!(
            decode_points3d_txt(text.as_bytes()),
            Err(ColmapError::ParseError(_))
        ));
    }

    #[test]
    fn test_duplicate_ids() {
        let text = "1 PINHOLE 10 10 1.0 1.0 5.0 5.0\n1 PINHOLE 10 10 1.0 1.0 5.0 5.0\n";
        assert!(matches!(
            decode_cameras_txt(text.as_bytes()),
            Err(ColmapError::DuplicateId {
                table: "camera",
                id: 1
            })
        ));
    }

    #[test]
    fn test_encode_rejects_bad_image() {
        let mut images = BTreeMap::new();
        images.insert(
            1,
            ColmapImage {
                image_id: 1,
                qvec: [1.0, 0.0, 0.0, 0.0],
                tvec: [0.0; 3],
                camera_id: 1,
                name: "two\nlines.jpg".to_string(),
                xys: vec![],
                point3d_ids: vec![],
            },
        );
        let mut buffer = Vec::new();
        assert!(matches!(
            encode_images_txt(&mut buffer, &images),
            Err(ColmapError::InvalidImageName(_))
        ));

        let image = images.get_mut(&1).unwrap();
        image.name = "a.jpg".to_string();
        image.xys.push([1.0, 1.0]);
        assert!(matches!(
            encode_images_txt(&mut buffer, &images),
            Err(ColmapError::MismatchedObservations { .. })
        ));
    }
}
