#![allow(dead_code)]

use neural_style::{
    burn::backend::{Autodiff, NdArray},
    Vgg, VggConfig,
};
use rand::{Rng, SeedableRng};

pub type B = Autodiff<NdArray<f32>>;

/// Same layer layout as VGG-19, but thin enough to train in a test.
pub fn narrow_vgg(seed: u64) -> Vgg<B> {
    use neural_style::burn::tensor::backend::Backend;

    B::seed(seed);
    VggConfig::new(&[2, 2, 4, 4, 4], &[4, 4, 8, 8, 8]).init(&Default::default())
}

/// Uniform noise, which gives the style something to correlate.
pub fn noise_image(width: u32, height: u32, seed: u64) -> image::RgbImage {
    let mut rng = rand_pcg::Pcg32::seed_from_u64(seed);
    image::RgbImage::from_fn(width, height, |_, _| {
        image::Rgb([rng.gen(), rng.gen(), rng.gen()])
    })
}

/// Smooth diagonal ramps, a stand-in for a photo.
pub fn ramp_image(width: u32, height: u32) -> image::RgbImage {
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) * 127 / (width + height).max(1)) as u8,
        ])
    })
}
