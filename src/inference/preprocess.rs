//! Image Preprocessing
//!
//! Decode -> RGB -> 128x128 resize -> scale to [0, 1] -> batch axis.
//! No mean/std normalization: the classifier was trained on plain
//! rescaled pixels.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage};

use crate::utils::error::{Error, Result};
use crate::{IMAGE_CHANNELS, IMAGE_SIZE};

/// Upload extensions accepted by the service (lowercase)
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Resampling filter used for resizing. Fixed so preprocessing is deterministic.
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// True if `filename` has an extension in [`ALLOWED_EXTENSIONS`] (case-insensitive)
pub fn is_allowed_extension(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// A single preprocessed image, shape `[1, channels, size, size]`
///
/// Values are stored channel-first (all R, then all G, then all B), which is
/// the layout the convolution layers consume.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    size: usize,
    channels: usize,
}

impl ImageTensor {
    /// Build from channel-first data; fails if the length does not match
    pub fn from_chw(data: Vec<f32>, channels: usize, size: usize) -> Result<Self> {
        if data.len() != channels * size * size {
            return Err(Error::Inference(format!(
                "expected {} values for a {}x{}x{} image, got {}",
                channels * size * size,
                size,
                size,
                channels,
                data.len()
            )));
        }
        Ok(Self { data, size, channels })
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, self.channels, self.size, self.size]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Value at (channel, row, col)
    pub fn get(&self, channel: usize, row: usize, col: usize) -> f32 {
        self.data[channel * self.size * self.size + row * self.size + col]
    }
}

/// Stateless image preprocessor for a fixed square resolution
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    pub image_size: u32,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE as u32,
        }
    }
}

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an in-memory upload (format sniffed from the content)
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<ImageTensor> {
        if bytes.is_empty() {
            return Err(Error::Decode("empty image buffer".to_string()));
        }
        let image = image::load_from_memory(bytes)?;
        Ok(self.preprocess_image(&image))
    }

    /// Load and preprocess an image from a file path
    pub fn preprocess_file(&self, path: &Path) -> Result<ImageTensor> {
        let image = image::ImageReader::open(path)
            .map_err(|e| Error::ImageLoad(path.to_path_buf(), e.to_string()))?
            .with_guessed_format()
            .map_err(|e| Error::ImageLoad(path.to_path_buf(), e.to_string()))?
            .decode()
            .map_err(|e| Error::ImageLoad(path.to_path_buf(), e.to_string()))?;
        Ok(self.preprocess_image(&image))
    }

    /// Resize and rescale an already decoded image
    pub fn preprocess_image(&self, image: &DynamicImage) -> ImageTensor {
        let resized = image.resize_exact(self.image_size, self.image_size, RESIZE_FILTER);
        let rgb = resized.to_rgb8();

        let size = self.image_size as usize;
        let num_pixels = size * size;
        let mut data = vec![0.0f32; IMAGE_CHANNELS * num_pixels];

        for (i, pixel) in rgb.pixels().enumerate() {
            data[i] = pixel[0] as f32 / 255.0;
            data[num_pixels + i] = pixel[1] as f32 / 255.0;
            data[2 * num_pixels + i] = pixel[2] as f32 / 255.0;
        }

        ImageTensor {
            data,
            size,
            channels: IMAGE_CHANNELS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed_extension("scan.png"));
        assert!(is_allowed_extension("scan.JPG"));
        assert!(is_allowed_extension("patient.01.jpeg"));
        assert!(!is_allowed_extension("scan.gif"));
        assert!(!is_allowed_extension("scan"));
        assert!(!is_allowed_extension("png"));
        assert!(!is_allowed_extension("scan."));
    }

    #[test]
    fn test_output_shape_and_range() {
        let img = DynamicImage::new_rgb8(300, 200);
        let tensor = ImagePreprocessor::new().preprocess_image(&img);

        assert_eq!(tensor.shape(), [1, 3, 128, 128]);
        assert_eq!(tensor.data().len(), 3 * 128 * 128);
        assert!(tensor.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_grayscale_expanded_to_rgb() {
        let gray = GrayImage::from_pixel(64, 64, Luma([255]));
        let bytes = encode(&DynamicImage::ImageLuma8(gray), ImageFormat::Png);
        let tensor = ImagePreprocessor::new().preprocess_bytes(&bytes).unwrap();

        for channel in 0..3 {
            assert!(tensor.get(channel, 10, 10) > 0.99);
        }
    }

    #[test]
    fn test_alpha_channel_dropped() {
        let rgba = RgbaImage::from_pixel(32, 32, Rgba([255, 0, 0, 10]));
        let bytes = encode(&DynamicImage::ImageRgba8(rgba), ImageFormat::Png);
        let tensor = ImagePreprocessor::new().preprocess_bytes(&bytes).unwrap();

        assert!(tensor.get(0, 64, 64) > 0.99);
        assert!(tensor.get(1, 64, 64) < 0.01);
        assert!(tensor.get(2, 64, 64) < 0.01);
    }

    #[test]
    fn test_jpeg_decodes() {
        let img = DynamicImage::new_rgb8(128, 128);
        let bytes = encode(&img, ImageFormat::Jpeg);
        assert!(ImagePreprocessor::new().preprocess_bytes(&bytes).is_ok());
    }

    #[test]
    fn test_invalid_bytes_fail_with_decode_error() {
        let result = ImagePreprocessor::new().preprocess_bytes(b"this is not an image");
        assert!(matches!(result, Err(Error::Decode(_))));

        let result = ImagePreprocessor::new().preprocess_bytes(&[]);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_preprocessing_is_deterministic() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(90, 70, |x, y| {
            image::Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8])
        }));
        let bytes = encode(&img, ImageFormat::Png);
        let pre = ImagePreprocessor::new();

        assert_eq!(pre.preprocess_bytes(&bytes).unwrap(), pre.preprocess_bytes(&bytes).unwrap());
    }

    #[test]
    fn test_from_chw_length_check() {
        assert!(ImageTensor::from_chw(vec![0.0; 12], 3, 2).is_ok());
        assert!(ImageTensor::from_chw(vec![0.0; 11], 3, 2).is_err());
    }
}
