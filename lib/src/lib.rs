// BEGIN - Embark standard lints v0.4
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v0.4

//! `neural-style` is a light API for neural style transfer, synthesizing an
//! image with the structure of a content image and the texture of a style
//! image.
//!
//! The pixels of the synthesized image are the only trainable parameter.
//! Every iteration runs the image through a frozen VGG network, compares
//! the activations at a few layers against the fixed features of the
//! content and style images, and applies one Adam step to the pixels.
//!
//! First, you build a `Session` via a `SessionBuilder`, which follows the
//! builder pattern. Calling `build` on the `SessionBuilder` loads the input
//! images, checks the parameters and computes the target features.
//!
//! `Session` has a `run()` method that performs the optimization and returns
//! the result as a `StylizedImage`, which you can save, stream, or inspect.
//!
//! The building blocks, preprocessing, the feature extractor, the losses and
//! the training loop, are public as well, for when the session is too
//! coarse.
//!
//! ## Usage
//!
//! ```no_run
//! use neural_style::burn::backend::{Autodiff, NdArray};
//!
//! type Backend = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let network = neural_style::VggConfig::vgg19()
//!     .init::<Backend>(&device)
//!     .load_weights("vgg19.mpk", &device)
//!     .expect("failed to load weights");
//!
//! let stylized = neural_style::Session::<Backend>::builder()
//!     // the content is kept
//!     .content(&"imgs/rainier.jpg")
//!     // the style is transferred onto it
//!     .style(&"imgs/autumn-oak.jpg")
//!     .output_size(neural_style::Dims::new(450, 300))
//!     .epochs(500)
//!     .network(network)
//!     .build().expect("failed to build session")
//!     .run(None).expect("failed to transfer style");
//!
//! stylized.save("out/result.png").expect("failed to save image");
//! ```
mod errors;
pub mod features;
mod imaging;
pub mod loss;
pub mod session;
pub mod synthesis;
pub mod train;
mod utils;

pub use burn;
pub use image;

use burn::tensor::{backend::AutodiffBackend, Tensor};
use std::path::Path;
use utils::load_image;

pub use errors::{Error, ShapeError};
pub use features::{FeatureExtractor, Features, LayerConfig, Vgg, VggConfig};
pub use imaging::{postprocess, preprocess, Normalization};
pub use loss::{
    compute_total_loss, content_loss, gram, style_loss, tv_loss, LossBreakdown, LossValues,
    LossWeights,
};
pub use session::{Session, SessionBuilder};
pub use synthesis::{init_synthesis, Synthesis, SynthesizedImage};
pub use train::{train, ProgressUpdate, Targets, TrainOutcome, TrainParams, TrainingProgress};
pub use utils::{load_dynamic_image, ImageSource};

/// Simple dimensions struct
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

struct Parameters {
    output_size: Dims,
    layers: LayerConfig,
    weights: LossWeights,
    normalization: Normalization,
    learning_rate: f64,
    num_epochs: u32,
    lr_decay_epoch: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            output_size: Dims::new(450, 300),
            layers: LayerConfig::default(),
            weights: LossWeights::default(),
            normalization: Normalization::IMAGENET,
            learning_rate: 0.9,
            num_epochs: 500,
            lr_decay_epoch: 50,
        }
    }
}

impl Parameters {
    fn to_train_params(&self) -> TrainParams {
        TrainParams {
            weights: self.weights,
            num_epochs: self.num_epochs,
            lr_decay_epoch: self.lr_decay_epoch,
        }
    }
}

/// An image produced by `Session::run()`
pub struct StylizedImage {
    image: image::RgbImage,
    learning_rate: f64,
    epochs: u32,
    last_loss: Option<LossValues>,
}

impl StylizedImage {
    /// Saves the image to the specified path, the format is determined by the
    /// file extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent_path) = path.parent() {
            std::fs::create_dir_all(parent_path)?;
        }

        self.image.save(path)?;
        Ok(())
    }

    /// Writes the image to the specified stream
    pub fn write<W: std::io::Write>(
        self,
        writer: &mut W,
        fmt: image::ImageOutputFormat,
    ) -> Result<(), Error> {
        let dyn_img = self.into_image();
        Ok(dyn_img.write_to(writer, fmt)?)
    }

    /// The learning rate after the final decay
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// The number of iterations the image was optimized for
    pub fn epochs(&self) -> u32 {
        self.epochs
    }

    /// The losses of the final iteration, `None` if no iteration ran
    pub fn last_loss(&self) -> Option<&LossValues> {
        self.last_loss.as_ref()
    }

    /// Returns the output image
    pub fn into_image(self) -> image::DynamicImage {
        image::DynamicImage::ImageRgb8(self.image)
    }
}

impl AsRef<image::RgbImage> for StylizedImage {
    fn as_ref(&self) -> &image::RgbImage {
        &self.image
    }
}
