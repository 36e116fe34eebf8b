use crate::core::errors::{DecodeError, DecodeResult};
use image::{DynamicImage, ImageFormat};

/// Decode an uploaded file into a bitmap.
///
/// Only PNG and JPEG are accepted; anything else (including bytes whose
/// format cannot be guessed at all) is rejected before decoding. A decoded
/// bitmap is guaranteed to have non-zero dimensions.
pub fn decode_upload(bytes: &[u8]) -> DecodeResult<DynamicImage> {
    let format = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;

    match format {
        ImageFormat::Png | ImageFormat::Jpeg => {}
        other => {
            return Err(DecodeError::UnsupportedFormat(format!("{:?}", other)));
        }
    }

    let img = image::load_from_memory_with_format(bytes, format)?;

    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(DecodeError::EmptyImage { width, height });
    }

    Ok(img)
}
