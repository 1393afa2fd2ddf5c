//! The frozen VGG feature network and the extractor tapping its activations.
//!
//! Layers are numbered the way classifier "features" stacks are, every
//! convolution, ReLU and max pool is its own index. For VGG-19 that means
//! `0` is the first convolution, `4` the first pool, and `36` the last pool.

use crate::Error;
use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{activation::relu, backend::Backend, Tensor},
};
use std::path::Path;

/// A single entry in the feature stack
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayerKind {
    /// 3x3 convolution, the value is the index into the convolution weights
    Conv(usize),
    Relu,
    /// 2x2 max pool with a stride of 2
    MaxPool,
}

/// Describes a VGG-style network as a list of `(convolutions, channels)`
/// blocks separated by max pooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VggConfig {
    pub blocks: Vec<(usize, usize)>,
}

impl VggConfig {
    pub fn new(convs_per_block: &[usize], widths: &[usize]) -> Self {
        Self {
            blocks: convs_per_block
                .iter()
                .copied()
                .zip(widths.iter().copied())
                .collect(),
        }
    }

    /// The 19 layer configuration ("E") from Simonyan & Zisserman.
    pub fn vgg19() -> Self {
        Self::new(&[2, 2, 4, 4, 4], &[64, 128, 256, 512, 512])
    }

    /// The layer sequence of the feature stack.
    pub fn layers(&self) -> Vec<LayerKind> {
        let mut layers = Vec::new();
        let mut conv = 0;

        for &(count, _) in &self.blocks {
            for _ in 0..count {
                layers.push(LayerKind::Conv(conv));
                layers.push(LayerKind::Relu);
                conv += 1;
            }
            layers.push(LayerKind::MaxPool);
        }

        layers
    }

    /// Creates a network with freshly initialized weights, see
    /// [`Vgg::load_weights`] to turn it into a pretrained one.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg<B> {
        let mut convs = Vec::new();
        let mut channels = 3;

        for &(count, width) in &self.blocks {
            for _ in 0..count {
                convs.push(
                    Conv2dConfig::new([channels, width], [3, 3])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .init(device),
                );
                channels = width;
            }
        }

        Vgg {
            features: VggFeatures { convs },
            layers: self.layers(),
        }
    }
}

impl Default for VggConfig {
    fn default() -> Self {
        Self::vgg19()
    }
}

/// The trainable part of the network, which is also what gets recorded.
#[derive(Module, Debug)]
pub struct VggFeatures<B: Backend> {
    convs: Vec<Conv2d<B>>,
}

/// A VGG feature stack, without the classification head.
#[derive(Clone, Debug)]
pub struct Vgg<B: Backend> {
    features: VggFeatures<B>,
    layers: Vec<LayerKind>,
}

impl<B: Backend> Vgg<B> {
    /// Loads pretrained weights recorded with burn's named message pack
    /// recorder in full precision.
    pub fn load_weights<P: AsRef<Path>>(self, path: P, device: &B::Device) -> Result<Self, Error> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let features = self
            .features
            .load_file(path.as_ref().to_path_buf(), &recorder, device)
            .map_err(|err| Error::Weights(format!("{:?}", err)))?;

        Ok(Self {
            features,
            layers: self.layers,
        })
    }

    /// Moves the weights to `device`.
    pub fn fork(self, device: &B::Device) -> Self {
        Self {
            features: self.features.fork(device),
            layers: self.layers,
        }
    }

    /// The number of layers in the feature stack.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[LayerKind] {
        &self.layers
    }
}

/// Which layers of the network are used as content and style features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerConfig {
    pub content_layers: Vec<usize>,
    pub style_layers: Vec<usize>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            content_layers: vec![25],
            style_layers: vec![0, 5, 10, 19, 28],
        }
    }
}

impl LayerConfig {
    fn max_layer(&self) -> Option<usize> {
        self.content_layers
            .iter()
            .chain(self.style_layers.iter())
            .copied()
            .max()
    }
}

/// Activations tapped from the network, each list in ascending layer order.
#[derive(Clone, Debug)]
pub struct Features<B: Backend> {
    pub content: Vec<Tensor<B, 4>>,
    pub style: Vec<Tensor<B, 4>>,
}

impl<B: Backend> Features<B> {
    /// Cuts the activations off of the autodiff graph so they can be used as
    /// fixed targets.
    pub fn detach(self) -> Self {
        Self {
            content: self.content.into_iter().map(Tensor::detach).collect(),
            style: self.style.into_iter().map(Tensor::detach).collect(),
        }
    }
}

/// Runs the prefix of a frozen network needed to reach the deepest
/// configured layer.
#[derive(Clone, Debug)]
pub struct FeatureExtractor<B: Backend> {
    features: VggFeatures<B>,
    layers: Vec<LayerKind>,
    pool: MaxPool2d,
    config: LayerConfig,
}

impl<B: Backend> FeatureExtractor<B> {
    pub fn new(network: Vgg<B>, config: &LayerConfig) -> Result<Self, Error> {
        if config.content_layers.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one content layer is required".to_owned(),
            ));
        }

        if config.style_layers.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one style layer is required".to_owned(),
            ));
        }

        let len = network.len();
        if let Some(&bad) = config
            .content_layers
            .iter()
            .chain(config.style_layers.iter())
            .find(|&&i| i >= len)
        {
            return Err(Error::InvalidConfiguration(format!(
                "layer {} is out of range for a network with {} layers",
                bad, len
            )));
        }

        let max_layer = config.max_layer().unwrap_or_default();

        let Vgg {
            features,
            mut layers,
        } = network;
        layers.truncate(max_layer + 1);

        let conv_count = layers
            .iter()
            .filter(|l| matches!(l, LayerKind::Conv(_)))
            .count();
        let VggFeatures { mut convs } = features;
        convs.truncate(conv_count);

        log::debug!(
            "feature extractor keeps {} of {} layers ({} convolutions)",
            layers.len(),
            len,
            conv_count
        );

        let mut config = config.clone();
        for set in [&mut config.content_layers, &mut config.style_layers] {
            set.sort_unstable();
            set.dedup();
        }

        Ok(Self {
            features: VggFeatures { convs }.no_grad(),
            layers,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            config,
        })
    }

    /// The number of layers that are actually evaluated.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Moves the network to `device`.
    pub fn fork(self, device: &B::Device) -> Self {
        Self {
            features: self.features.fork(device),
            ..self
        }
    }

    /// Extracts the configured content and style activations.
    pub fn extract(&self, x: Tensor<B, 4>) -> Features<B> {
        self.extract_layers(x, &self.config.content_layers, &self.config.style_layers)
    }

    /// Runs `x` through the retained layers, collecting the activation after
    /// every layer listed in `content_layers` or `style_layers`. A layer
    /// in both sets is collected into both lists.
    pub fn extract_layers(
        &self,
        mut x: Tensor<B, 4>,
        content_layers: &[usize],
        style_layers: &[usize],
    ) -> Features<B> {
        let mut content = Vec::with_capacity(content_layers.len());
        let mut style = Vec::with_capacity(style_layers.len());

        for (i, layer) in self.layers.iter().enumerate() {
            x = match *layer {
                LayerKind::Conv(c) => self.features.convs[c].forward(x),
                LayerKind::Relu => relu(x),
                LayerKind::MaxPool => self.pool.forward(x),
            };

            if style_layers.contains(&i) {
                style.push(x.clone());
            }
            if content_layers.contains(&i) {
                content.push(x.clone());
            }
        }

        Features { content, style }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type B = NdArray<f32>;
    type AB = Autodiff<NdArray<f32>>;

    fn narrow() -> VggConfig {
        VggConfig::new(&[2, 2, 4, 4, 4], &[4, 4, 8, 8, 8])
    }

    #[test]
    fn vgg19_numbering() {
        let layers = VggConfig::vgg19().layers();

        assert_eq!(layers.len(), 37);
        assert_eq!(layers[0], LayerKind::Conv(0));
        assert_eq!(layers[1], LayerKind::Relu);
        assert_eq!(layers[4], LayerKind::MaxPool);
        assert_eq!(layers[5], LayerKind::Conv(2));
        assert_eq!(layers[10], LayerKind::Conv(4));
        assert_eq!(layers[19], LayerKind::Conv(8));
        assert_eq!(layers[25], LayerKind::Conv(11));
        assert_eq!(layers[28], LayerKind::Conv(12));
        assert_eq!(layers[36], LayerKind::MaxPool);
    }

    #[test]
    fn truncates_to_deepest_layer() {
        let device = Default::default();
        let extractor =
            FeatureExtractor::new(narrow().init::<B>(&device), &LayerConfig::default()).unwrap();

        assert_eq!(extractor.depth(), 29);
        assert_eq!(extractor.features.convs.len(), 13);
    }

    #[test]
    fn rejects_out_of_range_layers() {
        let device = Default::default();
        let config = LayerConfig {
            content_layers: vec![25],
            style_layers: vec![0, 37],
        };

        let err = FeatureExtractor::new(narrow().init::<B>(&device), &config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_empty_layer_sets() {
        let device = Default::default();
        let config = LayerConfig {
            content_layers: vec![],
            style_layers: vec![0],
        };

        let err = FeatureExtractor::new(narrow().init::<B>(&device), &config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn collects_in_layer_order() {
        B::seed(7);
        let device = Default::default();
        let config = LayerConfig {
            content_layers: vec![4],
            style_layers: vec![5, 0, 4],
        };
        let extractor = FeatureExtractor::new(narrow().init::<B>(&device), &config).unwrap();

        let x = Tensor::<B, 4>::ones([1, 3, 16, 24], &device);
        let features = extractor.extract(x);

        assert_eq!(features.content.len(), 1);
        assert_eq!(features.style.len(), 3);

        assert_eq!(features.style[0].dims(), [1, 4, 16, 24]);
        // layer 4 is the first pool
        assert_eq!(features.style[1].dims(), [1, 4, 8, 12]);
        assert_eq!(features.style[2].dims(), [1, 4, 8, 12]);

        // A layer in both sets yields the same activation in both lists
        let shared = features.style[1].clone().into_data().to_vec::<f32>().unwrap();
        let content = features.content[0].clone().into_data().to_vec::<f32>().unwrap();
        assert_eq!(shared, content);
    }

    #[test]
    fn gradients_stop_at_the_network() {
        AB::seed(3);
        let device = Default::default();
        let extractor =
            FeatureExtractor::new(narrow().init::<AB>(&device), &LayerConfig::default()).unwrap();

        let x = Tensor::<AB, 4>::ones([1, 3, 16, 16], &device).require_grad();
        let features = extractor.extract(x.clone());

        let loss = features
            .content
            .into_iter()
            .chain(features.style)
            .map(|y| y.powf_scalar(2.0).mean())
            .reduce(|a, b| a + b)
            .unwrap();
        let grads = loss.backward();

        assert!(x.grad(&grads).is_some());
        assert_eq!(extractor.features.convs.len(), 13);
        for (i, conv) in extractor.features.convs.iter().enumerate() {
            assert!(conv.weight.val().grad(&grads).is_none(), "conv {} has a weight gradient", i);
            if let Some(bias) = &conv.bias {
                assert!(bias.val().grad(&grads).is_none(), "conv {} has a bias gradient", i);
            }
        }
    }

    #[test]
    fn missing_weights_file() {
        let device = Default::default();
        let err = narrow()
            .init::<B>(&device)
            .load_weights("this/path/does/not/exist.mpk", &device)
            .unwrap_err();

        assert!(matches!(err, Error::Weights(_)));
    }
}
