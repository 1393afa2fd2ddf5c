//! Content, style and total variation losses.

use crate::{errors::ShapeError, Error};
use burn::tensor::{backend::Backend, ElementConversion, Tensor};

/// Extra factor applied to every style term on top of the style weight.
pub const STYLE_SCALE: f32 = 10.0;

/// Relative weights of the three loss terms.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LossWeights {
    pub content: f32,
    pub style: f32,
    pub tv: f32,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            content: 1.0,
            style: 1e3,
            tv: 10.0,
        }
    }
}

/// Mean squared error between a synthesized and a target activation.
pub fn content_loss<B: Backend>(y_hat: Tensor<B, 4>, y: Tensor<B, 4>) -> Tensor<B, 1> {
    (y_hat - y).powf_scalar(2.0).mean()
}

/// The channel correlation matrix of an activation, normalized by its
/// element count.
pub fn gram<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch, channels, height, width] = x.dims();
    let n = batch * height * width;

    let x = x.reshape([channels, n]);
    x.clone()
        .matmul(x.transpose())
        .div_scalar((channels * n) as f32)
}

/// Mean squared error between the Gram matrix of `y_hat` and a precomputed
/// target Gram matrix.
pub fn style_loss<B: Backend>(y_hat: Tensor<B, 4>, gram_y: Tensor<B, 2>) -> Tensor<B, 1> {
    (gram(y_hat) - gram_y).powf_scalar(2.0).mean()
}

/// Total variation, the halved sum of the mean absolute differences between
/// vertically and horizontally neighboring pixels.
pub fn tv_loss<B: Backend>(y_hat: Tensor<B, 4>) -> Tensor<B, 1> {
    let [batch, channels, height, width] = y_hat.dims();
    let device = y_hat.device();

    let vertical = if height > 1 {
        let below = y_hat
            .clone()
            .slice([0..batch, 0..channels, 1..height, 0..width]);
        let above = y_hat
            .clone()
            .slice([0..batch, 0..channels, 0..height - 1, 0..width]);
        (below - above).abs().mean()
    } else {
        Tensor::<B, 1>::zeros([1], &device)
    };

    let horizontal = if width > 1 {
        let right = y_hat
            .clone()
            .slice([0..batch, 0..channels, 0..height, 1..width]);
        let left = y_hat.slice([0..batch, 0..channels, 0..height, 0..width - 1]);
        (right - left).abs().mean()
    } else {
        Tensor::<B, 1>::zeros([1], &device)
    };

    (vertical + horizontal).mul_scalar(0.5)
}

/// The total loss of one iteration, along with its weighted components.
#[derive(Clone, Debug)]
pub struct LossBreakdown<B: Backend> {
    pub content: Tensor<B, 1>,
    pub style: Tensor<B, 1>,
    pub tv: Tensor<B, 1>,
    pub total: Tensor<B, 1>,
}

/// Host side copy of a [`LossBreakdown`]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LossValues {
    pub content: f32,
    pub style: f32,
    pub tv: f32,
    pub total: f32,
}

impl LossValues {
    pub fn is_finite(&self) -> bool {
        self.content.is_finite()
            && self.style.is_finite()
            && self.tv.is_finite()
            && self.total.is_finite()
    }
}

impl<B: Backend> LossBreakdown<B> {
    /// Reads the loss values back, which synchronizes with the device.
    pub fn values(&self) -> LossValues {
        fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f32 {
            t.clone().into_scalar().elem::<f32>()
        }

        LossValues {
            content: scalar(&self.content),
            style: scalar(&self.style),
            tv: scalar(&self.tv),
            total: scalar(&self.total),
        }
    }
}

fn check_pairing(kind: &'static str, activations: usize, targets: usize) -> Result<(), Error> {
    if activations != targets {
        return Err(Error::LayerCountMismatch {
            kind,
            activations,
            targets,
        });
    }

    Ok(())
}

fn check_shape(what: &'static str, actual: &[usize], expected: &[usize]) -> Result<(), Error> {
    if actual != expected {
        return Err(ShapeError::Mismatch {
            what,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
        .into());
    }

    Ok(())
}

/// Combines the content, style and total variation losses of the
/// synthesized image `x`.
///
/// Activations are paired with targets by position, the lists must have the
/// same length and every pair the same shape.
pub fn compute_total_loss<B: Backend>(
    x: Tensor<B, 4>,
    contents_hat: &[Tensor<B, 4>],
    styles_hat: &[Tensor<B, 4>],
    content_targets: &[Tensor<B, 4>],
    style_gram_targets: &[Tensor<B, 2>],
    weights: &LossWeights,
) -> Result<LossBreakdown<B>, Error> {
    check_pairing("content", contents_hat.len(), content_targets.len())?;
    check_pairing("style", styles_hat.len(), style_gram_targets.len())?;

    let device = x.device();

    let mut content = Tensor::<B, 1>::zeros([1], &device);
    for (y_hat, y) in contents_hat.iter().zip(content_targets) {
        check_shape("content activation", &y_hat.dims(), &y.dims())?;
        content = content + content_loss(y_hat.clone(), y.clone()).mul_scalar(weights.content);
    }

    let mut style = Tensor::<B, 1>::zeros([1], &device);
    for (y_hat, gram_y) in styles_hat.iter().zip(style_gram_targets) {
        let channels = y_hat.dims()[1];
        check_shape("style gram target", &gram_y.dims(), &[channels, channels])?;
        style = style
            + style_loss(y_hat.clone(), gram_y.clone())
                .mul_scalar(weights.style)
                .mul_scalar(STYLE_SCALE);
    }

    let tv = tv_loss(x).mul_scalar(weights.tv);
    let total = content.clone() + style.clone() + tv.clone();

    Ok(LossBreakdown {
        content,
        style,
        tv,
        total,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use burn::{backend::NdArray, tensor::Distribution};

    type B = NdArray<f32>;

    fn random(shape: [usize; 4]) -> Tensor<B, 4> {
        B::seed(31);
        Tensor::random(shape, Distribution::Normal(0.0, 1.0), &Default::default())
    }

    fn to_vec<const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn scalar(t: Tensor<B, 1>) -> f32 {
        t.into_scalar()
    }

    #[test]
    fn gram_is_symmetric() {
        let g = gram(random([1, 6, 5, 7]));
        assert_eq!(g.dims(), [6, 6]);

        let direct = to_vec(g.clone());
        let transposed = to_vec(g.transpose());
        for (a, b) in direct.iter().zip(&transposed) {
            assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
        }
    }

    #[test]
    fn gram_normalization() {
        // a single channel of ones correlates with itself by exactly 1
        let g = gram(Tensor::<B, 4>::ones([1, 1, 3, 4], &Default::default()));
        assert_eq!(to_vec(g), vec![1.0]);
    }

    #[test]
    fn identical_inputs_have_no_loss() {
        let y = random([1, 4, 6, 6]);

        assert_eq!(scalar(content_loss(y.clone(), y.clone())), 0.0);
        assert_eq!(scalar(style_loss(y.clone(), gram(y))), 0.0);
    }

    #[test]
    fn content_loss_is_mse() {
        let device = Default::default();
        let a = Tensor::<B, 4>::zeros([1, 1, 2, 2], &device);
        let b = Tensor::<B, 4>::ones([1, 1, 2, 2], &device).mul_scalar(2.0);

        assert_eq!(scalar(content_loss(a, b)), 4.0);
    }

    #[test]
    fn flat_image_has_no_variation() {
        let x = Tensor::<B, 4>::ones([1, 3, 5, 8], &Default::default()).mul_scalar(0.37);
        assert_eq!(scalar(tv_loss(x)), 0.0);
    }

    #[test]
    fn tv_of_stripes() {
        // alternating columns of 0 and 1: every horizontal step is 1, vertical 0
        let device = Default::default();
        let data: Vec<f32> = (0..12).map(|i| (i % 2) as f32).collect();
        let x = Tensor::<B, 1>::from_floats(data.as_slice(), &device).reshape([1, 1, 3, 4]);

        assert_eq!(scalar(tv_loss(x)), 0.5);
    }

    #[test]
    fn tv_of_single_row() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([0.0, 2.0, 0.0], &device).reshape([1, 1, 1, 3]);

        assert_eq!(scalar(tv_loss(x)), 1.0);
    }

    #[test]
    fn weighted_sum() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_floats([0.0, 2.0, 0.0], &device).reshape([1, 1, 1, 3]);
        let zeros = Tensor::<B, 4>::zeros([1, 1, 2, 2], &device);
        let ones = Tensor::<B, 4>::ones([1, 1, 2, 2], &device);

        let weights = LossWeights {
            content: 2.0,
            style: 3.0,
            tv: 5.0,
        };

        let losses = compute_total_loss(
            x,
            &[ones.clone()],
            &[ones],
            &[zeros.clone()],
            &[gram(zeros)],
            &weights,
        )
        .unwrap()
        .values();

        assert_eq!(losses.content, 2.0);
        // gram of ones is [[1]], so the style term is 1 * 3 * 10
        assert_eq!(losses.style, 30.0);
        assert_eq!(losses.tv, 5.0);
        assert_eq!(losses.total, 37.0);
        assert!(losses.is_finite());
    }

    #[test]
    fn rejects_mismatched_pairs() {
        let device = Default::default();
        let x = Tensor::<B, 4>::zeros([1, 3, 4, 4], &device);
        let y = Tensor::<B, 4>::zeros([1, 2, 4, 4], &device);

        let err = compute_total_loss(
            x.clone(),
            &[y.clone(), y.clone()],
            &[],
            &[y.clone()],
            &[],
            &LossWeights::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::LayerCountMismatch {
                kind: "content",
                activations: 2,
                targets: 1,
            }
        ));

        let smaller = Tensor::<B, 4>::zeros([1, 2, 2, 2], &device);
        let err = compute_total_loss(
            x,
            &[y],
            &[],
            &[smaller],
            &[],
            &LossWeights::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Shape(ShapeError::Mismatch { .. })));
    }

    #[test]
    fn rejects_mismatched_style_targets() {
        let device = Default::default();
        let x = Tensor::<B, 4>::zeros([1, 3, 4, 4], &device);
        let y = Tensor::<B, 4>::zeros([1, 2, 4, 4], &device);

        let err = compute_total_loss(
            x.clone(),
            &[],
            &[y.clone()],
            &[],
            &[],
            &LossWeights::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::LayerCountMismatch {
                kind: "style",
                activations: 1,
                targets: 0,
            }
        ));

        // two channels, but the target was computed from three
        let wrong_gram = Tensor::<B, 2>::zeros([3, 3], &device);
        let err = compute_total_loss(
            x,
            &[],
            &[y],
            &[],
            &[wrong_gram],
            &LossWeights::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Shape(ShapeError::Mismatch { .. })));
    }
}
