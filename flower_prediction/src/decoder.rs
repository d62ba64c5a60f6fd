use crate::error::DecodeError;
use image::{ImageReader, RgbImage};
use std::io::Cursor;

/// Decoded image, always RGB8.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalImage(RgbImage);

impl CanonicalImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.0
    }
}

impl From<RgbImage> for CanonicalImage {
    fn from(image: RgbImage) -> Self {
        Self(image)
    }
}

/// Decodes an encoded image (PNG, JPEG, ...) and converts it to RGB.
///
/// Alpha channels are dropped and grayscale or paletted images are expanded,
/// so the result always carries exactly three channels.
pub fn decode(bytes: &[u8]) -> Result<CanonicalImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(DecodeError::UnknownFormat);
    }

    let image = reader.decode().map_err(DecodeError::Image)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "decoded image"
    );

    Ok(CanonicalImage(image.into_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, LumaA, Rgba};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_rgba_png_drops_alpha() {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(12, 7, Rgba([10, 20, 30, 40]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.width(), 12);
        assert_eq!(decoded.height(), 7);
        assert_eq!(decoded.as_rgb().get_pixel(3, 3).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_grayscale_expands_channels() {
        let img = ImageBuffer::<LumaA<u8>, Vec<u8>>::from_pixel(5, 5, LumaA([200, 255]));
        let bytes = encode(DynamicImage::ImageLumaA8(img), ImageFormat::Png);

        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.as_rgb().get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn test_decode_jpeg() {
        let img = ImageBuffer::from_pixel(16, 16, image::Rgb([0u8, 128, 255]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let decoded = decode(&bytes).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn test_decode_paletted_gif() {
        // GIF stores pixels as palette indices.
        let img = ImageBuffer::from_fn(8, 8, |x, _| {
            if x < 4 {
                image::Rgb([255u8, 0, 0])
            } else {
                image::Rgb([0u8, 0, 255])
            }
        });
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Gif);

        let decoded = decode(&bytes).unwrap();

        assert_eq!((decoded.width(), decoded.height()), (8, 8));
        assert_eq!(decoded.as_rgb().get_pixel(1, 1).0, [255, 0, 0]);
        assert_eq!(decoded.as_rgb().get_pixel(6, 6).0, [0, 0, 255]);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert!(matches!(decode(&[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode(b"definitely not an image");
        assert!(matches!(result, Err(DecodeError::UnknownFormat)));
    }

    #[test]
    fn test_decode_truncated_png() {
        let img = ImageBuffer::from_pixel(64, 64, image::Rgb([1u8, 2, 3]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let result = decode(&bytes[..bytes.len() / 2]);

        assert!(matches!(result, Err(DecodeError::Image(_))));
    }
}
