use crate::loss::gram;
use burn::{
    module::{Module, Param},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

/// The image being synthesized. Its pixels are the one and only parameter
/// of the optimization.
#[derive(Module, Debug)]
pub struct SynthesizedImage<B: Backend> {
    weight: Param<Tensor<B, 4>>,
}

impl<B: Backend> SynthesizedImage<B> {
    /// Creates a parameter holding a copy of `init`.
    pub fn new(init: Tensor<B, 4>) -> Self {
        Self {
            weight: Param::from_tensor(init),
        }
    }

    /// The current pixel values.
    pub fn forward(&self) -> Tensor<B, 4> {
        self.weight.val()
    }

    pub fn dims(&self) -> [usize; 4] {
        self.weight.val().dims()
    }
}

/// Everything the training loop mutates: the image, the optimizer state and
/// the current learning rate, along with the fixed Gram targets of the style.
pub struct Synthesis<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SynthesizedImage<B>, B>,
{
    image: SynthesizedImage<B>,
    style_grams: Vec<Tensor<B, 2>>,
    optimizer: O,
    learning_rate: f64,
}

impl<B, O> Synthesis<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SynthesizedImage<B>, B>,
{
    pub fn image(&self) -> &SynthesizedImage<B> {
        &self.image
    }

    pub fn style_grams(&self) -> &[Tensor<B, 2>] {
        &self.style_grams
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Backpropagates `loss` into the image, and only the image, then applies
    /// one optimizer update with the current learning rate.
    pub fn step(&mut self, loss: Tensor<B, 1>) {
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.image);

        // cloning a module only bumps the reference counts of its tensors
        let image = self.image.clone();
        self.image = self.optimizer.step(self.learning_rate, image, grads);
    }

    /// Consumes the synthesis, returning the final pixels without any
    /// autodiff bookkeeping.
    pub fn into_image(self) -> Tensor<B::InnerBackend, 4> {
        self.image.forward().inner()
    }
}

/// Sets up the optimization: the image starts out as an exact copy of
/// `content_x`, and the Gram targets are computed once from the style
/// activations since the style image never changes.
pub fn init_synthesis<B: AutodiffBackend>(
    content_x: Tensor<B, 4>,
    style_activations: Vec<Tensor<B, 4>>,
    learning_rate: f64,
) -> Synthesis<B, impl Optimizer<SynthesizedImage<B>, B>> {
    let image = SynthesizedImage::new(content_x.detach());
    let style_grams = style_activations
        .into_iter()
        .map(|y| gram(y).detach())
        .collect();

    let optimizer = AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-8)
        .init::<B, SynthesizedImage<B>>();

    Synthesis {
        image,
        style_grams,
        optimizer,
        learning_rate,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray<f32>>;

    fn to_vec(t: Tensor<B, 4>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn starts_as_content() {
        let device = Default::default();
        let content = Tensor::<B, 1>::from_floats([0.5, -1.0, 2.0, 0.25], &device)
            .reshape([1, 1, 2, 2]);

        let synthesis = init_synthesis(content.clone(), Vec::new(), 0.9);

        assert_eq!(synthesis.image().dims(), [1, 1, 2, 2]);
        assert_eq!(to_vec(synthesis.image().forward()), to_vec(content));
        assert_eq!(synthesis.learning_rate(), 0.9);
    }

    #[test]
    fn precomputes_style_grams() {
        let device = Default::default();
        let content = Tensor::<B, 4>::zeros([1, 3, 4, 4], &device);
        let style = Tensor::<B, 4>::ones([1, 2, 3, 3], &device);

        let synthesis = init_synthesis(content, vec![style], 0.1);

        assert_eq!(synthesis.style_grams().len(), 1);
        let gram = synthesis.style_grams()[0].clone();
        assert_eq!(gram.dims(), [2, 2]);
        assert_eq!(gram.into_data().to_vec::<f32>().unwrap(), vec![0.5; 4]);
    }

    #[test]
    fn step_descends() {
        let device = Default::default();
        let content = Tensor::<B, 4>::ones([1, 1, 2, 2], &device);
        let mut synthesis = init_synthesis(content, Vec::new(), 0.1);

        // minimize the sum of squares, which pulls every pixel towards 0
        let loss = synthesis.image().forward().powf_scalar(2.0).sum();
        synthesis.step(loss);

        for v in to_vec(synthesis.image().forward()) {
            assert!(v < 1.0 && v > 0.5, "{}", v);
        }
    }
}
