//! Conversion between 8-bit RGB images and the normalized, channel-first
//! tensors the feature network consumes.

use crate::{errors::ShapeError, utils::resize_image, Dims, Error};
use burn::tensor::{backend::Backend, Tensor, TensorData};

/// Per-channel statistics of the distribution the network was trained on.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    /// The ImageNet statistics every torchvision/gluon classifier expects.
    pub const IMAGENET: Self = Self {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };
}

impl Default for Normalization {
    fn default() -> Self {
        Self::IMAGENET
    }
}

/// Resizes `img` to `size` and turns it into a `[1, 3, height, width]`
/// tensor normalized with `norm`.
pub fn preprocess<B: Backend>(
    img: &image::RgbImage,
    size: Dims,
    norm: &Normalization,
    device: &B::Device,
) -> Result<Tensor<B, 4>, Error> {
    if size.width == 0 || size.height == 0 {
        return Err(ShapeError::Empty {
            what: "target size",
            shape: vec![size.width as usize, size.height as usize],
        }
        .into());
    }

    let img = resize_image(img, size);
    let (width, height) = (size.width as usize, size.height as usize);
    let plane = width * height;

    let mut values = vec![0f32; 3 * plane];
    for (i, pixel) in img.pixels().enumerate() {
        for c in 0..3 {
            let v = f32::from(pixel[c]) / 255.0;
            values[c * plane + i] = (v - norm.mean[c]) / norm.std[c];
        }
    }

    Ok(Tensor::from_data(
        TensorData::new(values, [1, 3, height, width]),
        device,
    ))
}

/// Undoes the normalization of [`preprocess`] and converts the first image
/// of the batch back to 8-bit RGB, clipping anything outside of `0..=255`.
pub fn postprocess<B: Backend>(
    tensor: Tensor<B, 4>,
    norm: &Normalization,
) -> Result<image::RgbImage, Error> {
    let [batch, channels, height, width] = tensor.dims();
    if channels != 3 || batch == 0 {
        return Err(ShapeError::Mismatch {
            what: "synthesized image",
            expected: vec![1, 3, height, width],
            actual: vec![batch, channels, height, width],
        }
        .into());
    }

    let values = tensor
        .slice([0..1, 0..3, 0..height, 0..width])
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| Error::Tensor(format!("{:?}", err)))?;

    let plane = width * height;
    let img = image::RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let i = y as usize * width + x as usize;
        let mut pixel = [0u8; 3];
        for (c, out) in pixel.iter_mut().enumerate() {
            let v = (values[c * plane + i] * norm.std[c] + norm.mean[c]) * 255.0;
            *out = v.round().max(0.0).min(255.0) as u8;
        }
        image::Rgb(pixel)
    });

    Ok(img)
}
