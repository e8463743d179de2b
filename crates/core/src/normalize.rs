//! Re-encoding of embedded raster assets.
//!
//! Images pulled out of a PDF arrive in whatever encoding and color mode the
//! producer chose (CMYK JPEG, 16-bit PNG, images with alpha...). Before they
//! are embedded in a deck they are decoded, bounded in size and re-encoded as
//! PNG so every consumer of the deck can display them.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;

use crate::options::DEFAULT_MAX_IMAGE_DIMENSION;

/// Why an asset could not be normalized.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("image data is empty")]
    Empty,

    #[error("{0}")]
    Image(#[from] image::ImageError),
}

/// An encoded image ready to be embedded, with its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Always PNG or JPEG.
    pub format: ImageFormat,
}

impl NormalizedImage {
    /// Wrap already-encoded bytes (e.g. a rendered page) without re-encoding.
    ///
    /// PNG and JPEG are kept as they are; other formats are transcoded to PNG.
    pub fn from_encoded(data: Vec<u8>) -> Result<Self, NormalizeError> {
        if data.is_empty() {
            return Err(NormalizeError::Empty);
        }

        let format = image::guess_format(&data)?;
        if matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            let (width, height) = ImageReader::with_format(Cursor::new(&data), format)
                .into_dimensions()?;
            return Ok(Self {
                data,
                width,
                height,
                format,
            });
        }

        let decoded = image::load_from_memory_with_format(&data, format)?;
        let (width, height) = (decoded.width(), decoded.height());
        let mut output = Cursor::new(Vec::new());
        decoded.write_to(&mut output, ImageFormat::Png)?;
        Ok(Self {
            data: output.into_inner(),
            width,
            height,
            format: ImageFormat::Png,
        })
    }

    /// File extension used for the media part.
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpeg",
            _ => "png",
        }
    }

    /// MIME type used for the media part.
    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "image/jpeg",
            _ => "image/png",
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

/// Decodes, bounds and re-encodes embedded images.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    /// Longest side allowed after normalization, in pixels.
    max_dimension: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
        }
    }
}

impl ImageNormalizer {
    /// Create a normalizer bounding images at 2000 px.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the longest side allowed after normalization.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Normalize raw image bytes.
    ///
    /// - Plain RGB and grayscale are kept; any other color mode becomes RGB
    /// - Images larger than the bound are downscaled, keeping aspect ratio
    /// - Smaller images are never upscaled
    /// - Output is always PNG
    pub fn normalize(&self, raw: &[u8]) -> Result<NormalizedImage, NormalizeError> {
        if raw.is_empty() {
            return Err(NormalizeError::Empty);
        }

        let decoded = image::load_from_memory(raw)?;
        let image = self.bound(to_supported_color(decoded));

        let (width, height) = (image.width(), image.height());
        let mut output = Cursor::new(Vec::new());
        image.write_to(&mut output, ImageFormat::Png)?;

        Ok(NormalizedImage {
            data: output.into_inner(),
            width,
            height,
            format: ImageFormat::Png,
        })
    }

    /// Downscale so that neither side exceeds the bound.
    fn bound(&self, image: DynamicImage) -> DynamicImage {
        match bounded_size(image.width(), image.height(), self.max_dimension) {
            Some((width, height)) => {
                log::debug!(
                    "Downscaling image {}x{} to {}x{}",
                    image.width(),
                    image.height(),
                    width,
                    height
                );
                image.resize_exact(width, height, FilterType::Lanczos3)
            }
            None => image,
        }
    }
}

/// Target size when `width`x`height` exceeds `max`, or `None` if it fits.
fn bounded_size(width: u32, height: u32, max: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max {
        return None;
    }

    let scale = max as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max);
    Some((scaled(width), scaled(height)))
}

/// Convert anything other than 8-bit RGB or grayscale to 8-bit RGB.
fn to_supported_color(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn decode(data: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(data, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_bounded_size() {
        assert_eq!(bounded_size(100, 50, 2000), None);
        assert_eq!(bounded_size(2000, 2000, 2000), None);
        assert_eq!(bounded_size(4000, 1000, 2000), Some((2000, 500)));
        assert_eq!(bounded_size(1000, 3000, 1500), Some((500, 1500)));
        assert_eq!(bounded_size(10_000, 1, 100), Some((100, 1)));
    }

    #[test]
    fn test_small_rgb_image_kept() {
        let source = RgbImage::from_pixel(40, 30, Rgb([200, 10, 10]));
        let raw = encode(DynamicImage::ImageRgb8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new().normalize(&raw).unwrap();
        assert_eq!((normalized.width, normalized.height), (40, 30));

        let decoded = decode(&normalized.data);
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([200, 10, 10]));
    }

    #[test]
    fn test_grayscale_kept() {
        let source = GrayImage::from_pixel(8, 8, Luma([77]));
        let raw = encode(DynamicImage::ImageLuma8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new().normalize(&raw).unwrap();
        assert!(matches!(decode(&normalized.data), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_alpha_converted_to_rgb() {
        let source = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 128]));
        let raw = encode(DynamicImage::ImageRgba8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new().normalize(&raw).unwrap();
        assert!(matches!(decode(&normalized.data), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_large_image_downscaled() {
        let source = RgbImage::from_pixel(300, 150, Rgb([1, 2, 3]));
        let raw = encode(DynamicImage::ImageRgb8(source), ImageFormat::Png);

        let normalized = ImageNormalizer::new()
            .with_max_dimension(100)
            .normalize(&raw)
            .unwrap();
        assert_eq!((normalized.width, normalized.height), (100, 50));
        assert_eq!(decode(&normalized.data).width(), 100);
        assert_eq!(normalized.aspect_ratio(), 2.0);
    }

    #[test]
    fn test_jpeg_reencoded_as_png() {
        let source = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
        let raw = encode(DynamicImage::ImageRgb8(source), ImageFormat::Jpeg);

        let normalized = ImageNormalizer::new().normalize(&raw).unwrap();
        assert_eq!(
            image::guess_format(&normalized.data).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_from_encoded_keeps_png() {
        let raw = encode(
            DynamicImage::ImageRgb8(RgbImage::new(12, 7)),
            ImageFormat::Png,
        );
        let wrapped = NormalizedImage::from_encoded(raw.clone()).unwrap();
        assert_eq!(wrapped.data, raw);
        assert_eq!((wrapped.width, wrapped.height), (12, 7));
        assert_eq!(wrapped.extension(), "png");
    }

    #[test]
    fn test_from_encoded_transcodes_bmp() {
        let raw = encode(
            DynamicImage::ImageRgb8(RgbImage::new(3, 4)),
            ImageFormat::Bmp,
        );
        let wrapped = NormalizedImage::from_encoded(raw).unwrap();
        assert_eq!(wrapped.format, ImageFormat::Png);
        assert_eq!(wrapped.content_type(), "image/png");
        assert_eq!((wrapped.width, wrapped.height), (3, 4));
    }

    #[test]
    fn test_garbage_fails() {
        let err = ImageNormalizer::new()
            .normalize(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Image(_)));
    }

    #[test]
    fn test_empty_fails() {
        assert!(matches!(
            ImageNormalizer::new().normalize(&[]),
            Err(NormalizeError::Empty)
        ));
    }

    #[test]
    fn test_deterministic_output() {
        let source = RgbImage::from_fn(50, 20, |x, y| Rgb([x as u8, y as u8, 7]));
        let raw = encode(DynamicImage::ImageRgb8(source), ImageFormat::Png);
        let normalizer = ImageNormalizer::new().with_max_dimension(25);

        assert_eq!(
            normalizer.normalize(&raw).unwrap(),
            normalizer.normalize(&raw).unwrap()
        );
    }
}
