use crate::*;

/// Style transfer session.
///
/// Building the session loads and preprocesses both images and computes the
/// fixed content and style features. Calling `run()` then optimizes the
/// synthesized image and returns it, consuming the session in the process.
/// You can provide a `TrainingProgress` implementation to get an update
/// after every iteration.
///
/// # Example
/// ```no_run
/// use neural_style::burn::backend::{Autodiff, NdArray};
///
/// type Backend = Autodiff<NdArray>;
///
/// let device = Default::default();
/// let network = neural_style::VggConfig::vgg19()
///     .init::<Backend>(&device)
///     .load_weights("vgg19.mpk", &device)
///     .expect("failed to load weights");
///
/// let session = neural_style::Session::<Backend>::builder()
///     .content(&"imgs/rainier.jpg")
///     .style(&"imgs/autumn-oak.jpg")
///     .network(network)
///     .build().expect("failed to build session");
///
/// let stylized = session.run(None).expect("failed to transfer style");
/// stylized.save("out/result.png").expect("failed to save image");
/// ```
pub struct Session<B: AutodiffBackend> {
    extractor: FeatureExtractor<B>,
    content_x: Tensor<B, 4>,
    targets: Targets<B>,
    style_activations: Vec<Tensor<B, 4>>,
    params: Parameters,
}

impl<B: AutodiffBackend> Session<B> {
    /// Creates a new session builder with default parameters.
    pub fn builder<'a>() -> SessionBuilder<'a, B> {
        SessionBuilder::default()
    }

    /// The preprocessed content image, which is also where the synthesized
    /// image starts out.
    pub fn content(&self) -> &Tensor<B, 4> {
        &self.content_x
    }

    pub fn output_size(&self) -> Dims {
        self.params.output_size
    }

    pub fn layers(&self) -> &LayerConfig {
        &self.params.layers
    }

    /// Runs the optimization, returning the raw synthesized tensor.
    pub fn train(
        self,
        progress: Option<Box<dyn TrainingProgress + '_>>,
    ) -> Result<TrainOutcome<B>, Error> {
        let synthesis = init_synthesis(
            self.content_x,
            self.style_activations,
            self.params.learning_rate,
        );

        train::train(
            &self.extractor,
            synthesis,
            &self.targets,
            &self.params.to_train_params(),
            progress,
        )
    }

    /// Runs the optimization and converts the result back into an image.
    pub fn run(
        self,
        progress: Option<Box<dyn TrainingProgress + '_>>,
    ) -> Result<StylizedImage, Error> {
        let norm = self.params.normalization;
        let outcome = self.train(progress)?;

        Ok(StylizedImage {
            image: postprocess(outcome.image, &norm)?,
            learning_rate: outcome.learning_rate,
            epochs: outcome.epochs,
            last_loss: outcome.last_loss,
        })
    }
}

/// Builds a session by setting parameters and adding the input images and
/// network, calling `build` will check all of the provided inputs before
/// any work is done.
pub struct SessionBuilder<'a, B: AutodiffBackend> {
    content: Option<ImageSource<'a>>,
    style: Option<ImageSource<'a>>,
    network: Option<Vgg<B>>,
    device: B::Device,
    params: Parameters,
}

impl<'a, B: AutodiffBackend> Default for SessionBuilder<'a, B> {
    fn default() -> Self {
        Self {
            content: None,
            style: None,
            network: None,
            device: Default::default(),
            params: Parameters::default(),
        }
    }
}

impl<'a, B: AutodiffBackend> SessionBuilder<'a, B> {
    /// Creates a new `SessionBuilder`, can also be created via
    /// `Session::builder()`
    pub fn new() -> Self {
        Self::default()
    }

    /// The image whose structure is kept.
    pub fn content<I: Into<ImageSource<'a>>>(mut self, img: I) -> Self {
        self.content = Some(img.into());
        self
    }

    /// The image whose texture and colors are transferred onto the content.
    pub fn style<I: Into<ImageSource<'a>>>(mut self, img: I) -> Self {
        self.style = Some(img.into());
        self
    }

    /// The pretrained network the features are extracted from.
    pub fn network(mut self, network: Vgg<B>) -> Self {
        self.network = Some(network);
        self
    }

    /// The device all of the tensors, and the network, are placed on.
    ///
    /// Default: the backend's default device
    pub fn device(mut self, device: B::Device) -> Self {
        self.device = device;
        self
    }

    /// Both inputs are resized to this size, which is also the size of the
    /// output.
    ///
    /// Default: 450x300
    pub fn output_size(mut self, dims: Dims) -> Self {
        self.params.output_size = dims;
        self
    }

    /// Which network layers serve as content and style features.
    ///
    /// Default: content `[25]`, style `[0, 5, 10, 19, 28]`
    pub fn layers(mut self, layers: LayerConfig) -> Self {
        self.params.layers = layers;
        self
    }

    /// Default: 1.0
    pub fn content_weight(mut self, value: f32) -> Self {
        self.params.weights.content = value;
        self
    }

    /// Default: 1000.0
    pub fn style_weight(mut self, value: f32) -> Self {
        self.params.weights.style = value;
        self
    }

    /// Weight of the total variation term, larger values produce smoother
    /// output.
    ///
    /// Default: 10.0
    pub fn tv_weight(mut self, value: f32) -> Self {
        self.params.weights.tv = value;
        self
    }

    /// The initial learning rate.
    ///
    /// Default: 0.9
    pub fn learning_rate(mut self, value: f64) -> Self {
        self.params.learning_rate = value;
        self
    }

    /// The number of optimization steps, there is no early stopping.
    ///
    /// Default: 500
    pub fn epochs(mut self, count: u32) -> Self {
        self.params.num_epochs = count;
        self
    }

    /// The learning rate is multiplied by 0.8 every `count` epochs.
    ///
    /// Default: 50
    pub fn lr_decay_epoch(mut self, count: u32) -> Self {
        self.params.lr_decay_epoch = count;
        self
    }

    /// The per-channel statistics the network expects its input in.
    ///
    /// Default: ImageNet
    pub fn normalization(mut self, norm: Normalization) -> Self {
        self.params.normalization = norm;
        self
    }

    /// Creates a `Session`, or returns an error if invalid parameters or
    /// inputs were specified.
    pub fn build(self) -> Result<Session<B>, Error> {
        self.check_parameters_validity()?;

        let content = self.content.ok_or(Error::MissingInput("content image"))?;
        let style = self.style.ok_or(Error::MissingInput("style image"))?;
        let network = self.network.ok_or(Error::MissingInput("feature network"))?;

        let params = self.params;
        let device = self.device;

        let extractor = FeatureExtractor::new(network, &params.layers)?.fork(&device);

        let size = params.output_size;
        let norm = params.normalization;
        let content_x = preprocess::<B>(&load_image(content)?, size, &norm, &device)?;
        let style_x = preprocess::<B>(&load_image(style)?, size, &norm, &device)?;

        let contents = extractor.extract(content_x.clone()).detach().content;
        let style_activations = extractor.extract(style_x).detach().style;

        log::debug!(
            "session ready: {}x{}, {} content and {} style target(s)",
            size.width,
            size.height,
            contents.len(),
            style_activations.len()
        );

        Ok(Session {
            extractor,
            content_x,
            targets: Targets { contents },
            style_activations,
            params,
        })
    }

    fn check_parameters_validity(&self) -> Result<(), Error> {
        let params = &self.params;

        if params.output_size.width == 0 || params.output_size.height == 0 {
            return Err(errors::ShapeError::Empty {
                what: "output size",
                shape: vec![
                    params.output_size.width as usize,
                    params.output_size.height as usize,
                ],
            }
            .into());
        }

        if !(params.learning_rate > 0.0 && params.learning_rate.is_finite()) {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 0.0,
                max: f64::INFINITY,
                value: params.learning_rate,
                name: "learning-rate",
            }));
        }

        if params.lr_decay_epoch == 0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 1.0,
                max: f64::from(u32::MAX),
                value: 0.0,
                name: "lr-decay-epoch",
            }));
        }

        for (name, value) in [
            ("content-weight", params.weights.content),
            ("style-weight", params.weights.style),
            ("tv-weight", params.weights.tv),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(Error::InvalidRange(errors::InvalidRange {
                    min: 0.0,
                    max: f64::INFINITY,
                    value: f64::from(value),
                    name,
                }));
            }
        }

        Ok(())
    }
}
