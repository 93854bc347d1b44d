use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, ErrorKind, Read, Write},
    path::Path,
};

use super::{
    atomic::write_atomic,
    types::{check_image_name, check_num_params, check_observations, insert_unique},
    CameraModelId, ColmapCamera, ColmapError, ColmapImage, ColmapPoint3d, TrackElement,
};

/// Upper bound on elements reserved up front from a count read from disk.
const MAX_PREALLOC: u64 = 1 << 16;

/// Upper bound on the byte length of an image name.
const MAX_NAME_LEN: usize = 1 << 16;

/// Read the cameras.bin file and return the cameras keyed by id.
///
/// # Arguments
///
/// * `path` - The path to the cameras.bin file.
///
/// # Returns
///
/// A map from camera id to ColmapCamera.
pub fn read_cameras_bin(path: impl AsRef<Path>) -> Result<BTreeMap<u32, ColmapCamera>, ColmapError> {
    let file = File::open(path)?;
    decode_cameras_bin(BufReader::new(file))
}

/// Read the images.bin file and return the images keyed by id.
///
/// # Arguments
///
/// * `path` - The path to the images.bin file.
///
/// # Returns
///
/// A map from image id to ColmapImage.
pub fn read_images_bin(path: impl AsRef<Path>) -> Result<BTreeMap<u32, ColmapImage>, ColmapError> {
    let file = File::open(path)?;
    decode_images_bin(BufReader::new(file))
}

/// Read the points3D.bin file and return the points keyed by id.
///
/// # Arguments
///
/// * `path` - The path to the points3D.bin file.
///
/// # Returns
///
/// A map from point id to ColmapPoint3d.
pub fn read_points3d_bin(
    path: impl AsRef<Path>,
) -> Result<BTreeMap<u64, ColmapPoint3d>, ColmapError> {
    let file = File::open(path)?;
    decode_points3d_bin(BufReader::new(file))
}

/// Write the cameras to a cameras.bin file, replacing it atomically.
pub fn write_cameras_bin(
    path: impl AsRef<Path>,
    cameras: &BTreeMap<u32, ColmapCamera>,
) -> Result<(), ColmapError> {
    write_atomic(path.as_ref(), |writer| encode_cameras_bin(writer, cameras))
}

/// Write the images to an images.bin file, replacing it atomically.
pub fn write_images_bin(
    path: impl AsRef<Path>,
    images: &BTreeMap<u32, ColmapImage>,
) -> Result<(), ColmapError> {
    write_atomic(path.as_ref(), |writer| encode_images_bin(writer, images))
}

/// Write the points to a points3D.bin file, replacing it atomically.
pub fn write_points3d_bin(
    path: impl AsRef<Path>,
    points: &BTreeMap<u64, ColmapPoint3d>,
) -> Result<(), ColmapError> {
    write_atomic(path.as_ref(), |writer| encode_points3d_bin(writer, points))
}

/// Decode cameras from the little-endian binary layout.
///
/// Layout: `u64` count, then per camera `i32` id, `i32` model id, `u64`
/// width, `u64` height and the model's `f64` parameters.
pub fn decode_cameras_bin<R: Read>(mut reader: R) -> Result<BTreeMap<u32, ColmapCamera>, ColmapError> {
    const TABLE: &str = "cameras";

    let num_cameras = read_u64(&mut reader, TABLE)?;
    let mut cameras = BTreeMap::new();

    for _ in 0..num_cameras {
        let camera_id = id_from_i32(read_i32(&mut reader, TABLE)?, "camera_id")?;
        let model_id = CameraModelId::from_id(read_i32(&mut reader, TABLE)?)?;
        let width = read_u64(&mut reader, TABLE)?;
        let height = read_u64(&mut reader, TABLE)?;
        let params = (0..model_id.num_params())
            .map(|_| read_f64(&mut reader, TABLE))
            .collect::<Result<Vec<_>, _>>()?;

        let camera = ColmapCamera {
            camera_id,
            model_id,
            width,
            height,
            params,
        };
        insert_unique("camera", &mut cameras, camera_id, camera)?;
    }

    ensure_consumed(reader, num_cameras)?;
    Ok(cameras)
}

/// Decode images from the little-endian binary layout.
///
/// Layout: `u64` count, then per image `u32` id, four `f64` qvec, three `f64`
/// tvec, `i32` camera id, the NUL terminated name, `u64` number of points and
/// per point `f64` x, `f64` y and `i64` point3d id.
pub fn decode_images_bin<R: Read>(mut reader: R) -> Result<BTreeMap<u32, ColmapImage>, ColmapError> {
    const TABLE: &str = "images";

    let num_images = read_u64(&mut reader, TABLE)?;
    let mut images = BTreeMap::new();

    for _ in 0..num_images {
        let image_id = read_u32(&mut reader, TABLE)?;
        let mut qvec = [0.0; 4];
        for q in qvec.iter_mut() {
            *q = read_f64(&mut reader, TABLE)?;
        }
        let mut tvec = [0.0; 3];
        for t in tvec.iter_mut() {
            *t = read_f64(&mut reader, TABLE)?;
        }
        let camera_id = id_from_i32(read_i32(&mut reader, TABLE)?, "camera_id")?;
        let name = read_name(&mut reader)?;

        let num_points2d = read_u64(&mut reader, TABLE)?;
        let capacity = num_points2d.min(MAX_PREALLOC) as usize;
        let mut xys = Vec::with_capacity(capacity);
        let mut point3d_ids = Vec::with_capacity(capacity);
        for _ in 0..num_points2d {
            xys.push([read_f64(&mut reader, TABLE)?, read_f64(&mut reader, TABLE)?]);
            point3d_ids.push(read_i64(&mut reader, TABLE)?);
        }

        let image = ColmapImage {
            image_id,
            qvec,
            tvec,
            camera_id,
            name,
            xys,
            point3d_ids,
        };
        insert_unique("image", &mut images, image_id, image)?;
    }

    ensure_consumed(reader, num_images)?;
    Ok(images)
}

/// Decode 3d points from the little-endian binary layout.
///
/// Layout: `u64` count, then per point `u64` id, three `f64` coordinates,
/// three `u8` colors, `f64` error, `u64` track length and per track element
/// `i32` image id and `i32` point2d index.
pub fn decode_points3d_bin<R: Read>(
    mut reader: R,
) -> Result<BTreeMap<u64, ColmapPoint3d>, ColmapError> {
    const TABLE: &str = "points3D";

    let num_points = read_u64(&mut reader, TABLE)?;
    let mut points = BTreeMap::new();

    for _ in 0..num_points {
        let point3d_id = read_u64(&mut reader, TABLE)?;
        let mut xyz = [0.0; 3];
        for v in xyz.iter_mut() {
            *v = read_f64(&mut reader, TABLE)?;
        }
        let mut rgb = [0u8; 3];
        read_bytes(&mut reader, &mut rgb, TABLE)?;
        let error = read_f64(&mut reader, TABLE)?;

        let track_length = read_u64(&mut reader, TABLE)?;
        let mut track = Vec::with_capacity(track_length.min(MAX_PREALLOC) as usize);
        for _ in 0..track_length {
            track.push(TrackElement {
                image_id: id_from_i32(read_i32(&mut reader, TABLE)?, "image_id")?,
                point2d_idx: id_from_i32(read_i32(&mut reader, TABLE)?, "point2D_idx")?,
            });
        }

        let point = ColmapPoint3d {
            point3d_id,
            xyz,
            rgb,
            error,
            track,
        };
        insert_unique("point3D", &mut points, point3d_id, point)?;
    }

    ensure_consumed(reader, num_points)?;
    Ok(points)
}

/// Encode cameras in the little-endian binary layout.
pub fn encode_cameras_bin<W: Write>(
    writer: &mut W,
    cameras: &BTreeMap<u32, ColmapCamera>,
) -> Result<(), ColmapError> {
    writer.write_all(&(cameras.len() as u64).to_le_bytes())?;
    for camera in cameras.values() {
        check_num_params(camera)?;
        writer.write_all(&id_to_i32(camera.camera_id, "camera_id")?.to_le_bytes())?;
        writer.write_all(&camera.model_id.id().to_le_bytes())?;
        writer.write_all(&camera.width.to_le_bytes())?;
        writer.write_all(&camera.height.to_le_bytes())?;
        for param in &camera.params {
            writer.write_all(&param.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Encode images in the little-endian binary layout.
pub fn encode_images_bin<W: Write>(
    writer: &mut W,
    images: &BTreeMap<u32, ColmapImage>,
) -> Result<(), ColmapError> {
    writer.write_all(&(images.len() as u64).to_le_bytes())?;
    for image in images.values() {
        check_observations(image)?;
        check_image_name(&image.name)?;

        writer.write_all(&image.image_id.to_le_bytes())?;
        for value in image.qvec.iter().chain(image.tvec.iter()) {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.write_all(&id_to_i32(image.camera_id, "camera_id")?.to_le_bytes())?;
        writer.write_all(image.name.as_bytes())?;
        writer.write_all(&[0u8])?;

        writer.write_all(&(image.xys.len() as u64).to_le_bytes())?;
        for (xy, point3d_id) in image.xys.iter().zip(&image.point3d_ids) {
            writer.write_all(&xy[0].to_le_bytes())?;
            writer.write_all(&xy[1].to_le_bytes())?;
            writer.write_all(&point3d_id.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Encode 3d points in the little-endian binary layout.
pub fn encode_points3d_bin<W: Write>(
    writer: &mut W,
    points: &BTreeMap<u64, ColmapPoint3d>,
) -> Result<(), ColmapError> {
    writer.write_all(&(points.len() as u64).to_le_bytes())?;
    for point in points.values() {
        writer.write_all(&point.point3d_id.to_le_bytes())?;
        for value in point.xyz {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.write_all(&point.rgb)?;
        writer.write_all(&point.error.to_le_bytes())?;
        writer.write_all(&(point.track.len() as u64).to_le_bytes())?;
        for element in &point.track {
            writer.write_all(&id_to_i32(element.image_id, "image_id")?.to_le_bytes())?;
            writer.write_all(&id_to_i32(element.point2d_idx, "point2D_idx")?.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Fill `buf`, reporting a short read as a truncated table.
#[inline]
fn read_bytes<R: Read>(reader: &mut R, buf: &mut [u8], table: &'static str) -> Result<(), ColmapError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => ColmapError::Truncated(table),
        _ => ColmapError::IoError(e),
    })
}

/// Read a little-endian u32
#[inline]
fn read_u32<R: Read>(reader: &mut R, table: &'static str) -> Result<u32, ColmapError> {
    let mut bytes = [0u8; 4];
    read_bytes(reader, &mut bytes, table)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read a little-endian i32
#[inline]
fn read_i32<R: Read>(reader: &mut R, table: &'static str) -> Result<i32, ColmapError> {
    let mut bytes = [0u8; 4];
    read_bytes(reader, &mut bytes, table)?;
    Ok(i32::from_le_bytes(bytes))
}

/// Read a little-endian u64
#[inline]
fn read_u64<R: Read>(reader: &mut R, table: &'static str) -> Result<u64, ColmapError> {
    let mut bytes = [0u8; 8];
    read_bytes(reader, &mut bytes, table)?;
    Ok(u64::from_le_bytes(bytes))
}

/// Read a little-endian i64
#[inline]
fn read_i64<R: Read>(reader: &mut R, table: &'static str) -> Result<i64, ColmapError> {
    let mut bytes = [0u8; 8];
    read_bytes(reader, &mut bytes, table)?;
    Ok(i64::from_le_bytes(bytes))
}

/// Read a little-endian f64
#[inline]
fn read_f64<R: Read>(reader: &mut R, table: &'static str) -> Result<f64, ColmapError> {
    let mut bytes = [0u8; 8];
    read_bytes(reader, &mut bytes, table)?;
    Ok(f64::from_le_bytes(bytes))
}

fn read_name<R: Read>(reader: &mut R) -> Result<String, ColmapError> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        read_bytes(reader, &mut byte, "images")?;
        if byte[0] == 0 {
            break;
        }
        if bytes.len() == MAX_NAME_LEN {
            return Err(ColmapError::ParseError(format!(
                "image name longer than {MAX_NAME_LEN} bytes"
            )));
        }
        bytes.push(byte[0]);
    }

    let name = String::from_utf8(bytes)
        .map_err(|e| ColmapError::ParseError(format!("image name is not UTF-8: {e}")))?;
    check_image_name(&name)?;
    Ok(name)
}

fn id_from_i32(value: i32, field: &'static str) -> Result<u32, ColmapError> {
    u32::try_from(value).map_err(|_| ColmapError::ParseError(format!("negative {field}: {value}")))
}

fn id_to_i32(value: u32, field: &'static str) -> Result<i32, ColmapError> {
    i32::try_from(value).map_err(|_| ColmapError::IdOutOfRange {
        field,
        value: value as u64,
    })
}

fn ensure_consumed<R: Read>(mut reader: R, num_records: u64) -> Result<(), ColmapError> {
    let trailing = std::io::copy(&mut reader, &mut std::io::sink())?;
    if trailing > 0 {
        return Err(ColmapError::TrailingData(num_records));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pinhole_camera() -> ColmapCamera {
        ColmapCamera {
            camera_id: 3,
            model_id: CameraModelId::CameraModelPinhole,
            width: 640,
            height: 480,
            params: vec![500.0, 510.0, 320.0, 240.0],
        }
    }

    #[test]
    fn test_camera_layout() -> Result<(), ColmapError> {
        let cameras = BTreeMap::from([(3, pinhole_camera())]);
        let mut buffer = Vec::new();
        encode_cameras_bin(&mut buffer, &cameras)?;

        // count + id + model + width + height + 4 params
        assert_eq!(buffer.len(), 8 + 4 + 4 + 8 + 8 + 4 * 8);
        assert_eq!(&buffer[..8], &1u64.to_le_bytes());
        assert_eq!(&buffer[8..12], &3i32.to_le_bytes());
        assert_eq!(&buffer[12..16], &1i32.to_le_bytes());
        assert_eq!(&buffer[16..24], &640u64.to_le_bytes());
        assert_eq!(&buffer[32..40], &500f64.to_le_bytes());

        assert_eq!(decode_cameras_bin(buffer.as_slice())?, cameras);
        Ok(())
    }

    #[test]
    fn test_image_layout() -> Result<(), ColmapError> {
        let image = ColmapImage {
            image_id: 9,
            qvec: [1.0, 0.0, 0.0, 0.0],
            tvec: [0.0, 0.0, 1.0],
            camera_id: 3,
            name: "img 1.jpg".to_string(),
            xys: vec![[1.5, 2.5]],
            point3d_ids: vec![-1],
        };
        let images = BTreeMap::from([(9, image)]);
        let mut buffer = Vec::new();
        encode_images_bin(&mut buffer, &images)?;

        let name_start = 8 + 4 + 7 * 8 + 4;
        let name_end = name_start + "img 1.jpg".len();
        assert_eq!(&buffer[name_start..name_end], b"img 1.jpg");
        assert_eq!(buffer[name_end], 0);
        assert_eq!(&buffer[buffer.len() - 8..], &(-1i64).to_le_bytes());

        assert_eq!(decode_images_bin(buffer.as_slice())?, images);
        Ok(())
    }

    #[test]
    fn test_empty_tables() -> Result<(), ColmapError> {
        let mut buffer = Vec::new();
        encode_points3d_bin(&mut buffer, &BTreeMap::new())?;
        assert_eq!(buffer, 0u64.to_le_bytes());
        assert!(decode_points3d_bin(buffer.as_slice())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_truncated_input() -> Result<(), ColmapError> {
        let cameras = BTreeMap::from([(3, pinhole_camera())]);
        let mut buffer = Vec::new();
        encode_cameras_bin(&mut buffer, &cameras)?;

        for len in [0, 4, 8, 20, buffer.len() - 1] {
            assert!(matches!(
                decode_cameras_bin(&buffer[..len]),
                Err(ColmapError::Truncated("cameras"))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_trailing_data() -> Result<(), ColmapError> {
        let cameras = BTreeMap::from([(3, pinhole_camera())]);
        let mut buffer = Vec::new();
        encode_cameras_bin(&mut buffer, &cameras)?;
        buffer.push(0);

        assert!(matches!(
            decode_cameras_bin(buffer.as_slice()),
            Err(ColmapError::TrailingData(1))
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_model_id() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&1u64.to_le_bytes());
        buffer.extend_from_slice(&1i32.to_le_bytes());
        buffer.extend_from_slice(&42i32.to_le_bytes());

        assert!(matches!(
            decode_cameras_bin(buffer.as_slice()),
            Err(ColmapError::UnknownCameraModelId(42))
        ));
    }

    #[test]
    fn test_huge_count_does_not_preallocate() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&1u64.to_le_bytes());
        buffer.extend_from_slice(&7u64.to_le_bytes());
        buffer.extend_from_slice(&[0u8; 3 * 8 + 3 + 8]);
        buffer.extend_from_slice(&u64::MAX.to_le_bytes());

        assert!(matches!(
            decode_points3d_bin(buffer.as_slice()),
            Err(ColmapError::Truncated("points3D"))
        ));
    }

    #[test]
    fn test_id_out_of_range() {
        let mut camera = pinhole_camera();
        camera.camera_id = u32::MAX;
        let cameras = BTreeMap::from([(u32::MAX, camera)]);
        let mut buffer = Vec::new();

        assert!(matches!(
            encode_cameras_bin(&mut buffer, &cameras),
            Err(ColmapError::IdOutOfRange {
                field: "camera_id",
                ..
            })
        ));
    }

    #[test]
    fn test_unterminated_name() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&1u64.to_le_bytes());
        buffer.extend_from_slice(&1u32.to_le_bytes());
        buffer.extend_from_slice(&[0u8; 7 * 8]);
        buffer.extend_from_slice(&1i32.to_le_bytes());
        buffer.extend_from_slice(b"never ends");

        assert!(matches!(
            decode_images_bin(buffer.as_slice()),
            Err(ColmapError::Truncated("images"))
        ));
    }
}
