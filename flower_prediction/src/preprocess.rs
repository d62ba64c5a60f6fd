use crate::{decoder::CanonicalImage, error::PreprocessError, IMAGE_SIZE, NORMALIZATION_FACTOR};
use image::imageops::{self, FilterType};
use ndarray::{Array4, ArrayView4};

/// Resampling filter used for every resize. Bilinear keeps results reproducible
/// across runs and close to what the classifier saw during training.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Model input of shape `(1, height, width, 3)` with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    /// Wraps an existing array after checking batch size, channel count and value range.
    pub fn try_from_array(array: Array4<f32>) -> Result<Self, PreprocessError> {
        let shape = array.shape();
        if shape[3] != 3 {
            return Err(PreprocessError::ChannelCount(shape[3]));
        }
        if shape[0] != 1 {
            return Err(PreprocessError::BatchSize(shape[0]));
        }
        if shape[1] == 0 || shape[2] == 0 {
            return Err(PreprocessError::EmptyImage {
                width: shape[2] as u32,
                height: shape[1] as u32,
            });
        }
        if let Some((index, value)) = array
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !(0.0..=1.0).contains(v))
        {
            return Err(PreprocessError::OutOfRange { index, value });
        }
        Ok(Self(array.as_standard_layout().into_owned()))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn into_inner(self) -> Array4<f32> {
        self.0
    }
}

/// Resizes and normalizes an image into the tensor layout the classifier expects.
pub fn preprocess(
    image: &CanonicalImage,
    target_size: (u32, u32),
) -> Result<NormalizedTensor, PreprocessError> {
    let (target_width, target_height) = target_size;
    if target_width == 0 || target_height == 0 {
        return Err(PreprocessError::InvalidTargetSize {
            width: target_width,
            height: target_height,
        });
    }

    let rgb = image.as_rgb();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessError::EmptyImage { width, height });
    }
    let channels = rgb.as_raw().len() / (width as usize * height as usize);
    if channels != 3 {
        return Err(PreprocessError::ChannelCount(channels));
    }

    let resized = imageops::resize(rgb, target_width, target_height, RESIZE_FILTER);
    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / NORMALIZATION_FACTOR)
        .collect();

    let array = Array4::from_shape_vec(
        (1, target_height as usize, target_width as usize, 3),
        data,
    )?;

    Ok(NormalizedTensor(array))
}

pub fn preprocess_default(image: &CanonicalImage) -> Result<NormalizedTensor, PreprocessError> {
    preprocess(image, IMAGE_SIZE)
}
