use crate::{
    features::FeatureExtractor,
    loss::{compute_total_loss, LossValues, LossWeights},
    synthesis::{Synthesis, SynthesizedImage},
    Error,
};
use burn::{
    optim::Optimizer,
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

/// Factor the learning rate is multiplied with at every decay.
pub const LR_DECAY: f64 = 0.8;

/// Parameters of the optimization loop
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrainParams {
    pub weights: LossWeights,
    pub num_epochs: u32,
    /// The learning rate decays after every `lr_decay_epoch` iterations
    pub lr_decay_epoch: u32,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            weights: LossWeights::default(),
            num_epochs: 500,
            lr_decay_epoch: 50,
        }
    }
}

/// The fixed features the synthesized image is compared against.
pub struct Targets<B: Backend> {
    pub contents: Vec<Tensor<B, 4>>,
}

/// The state of the optimization after an iteration
pub struct ProgressUpdate<'a> {
    /// The 1-based index of the iteration that just finished
    pub epoch: u32,
    /// The total number of iterations
    pub total: u32,
    /// The learning rate the next iteration will use
    pub learning_rate: f64,
    /// The losses of the iteration that just finished
    pub losses: &'a LossValues,
}

/// Allows the training loop to update external callers with its progress
pub trait TrainingProgress {
    fn update(&mut self, info: ProgressUpdate<'_>);
}

impl<G> TrainingProgress for G
where
    G: FnMut(ProgressUpdate<'_>) + Send,
{
    fn update(&mut self, info: ProgressUpdate<'_>) {
        self(info)
    }
}

/// The result of a completed run
pub struct TrainOutcome<B: AutodiffBackend> {
    /// The final synthesized image
    pub image: Tensor<B::InnerBackend, 4>,
    /// The learning rate after the last decay
    pub learning_rate: f64,
    /// The number of iterations that ran, always the requested number
    pub epochs: u32,
    /// The losses of the last iteration, if there was one
    pub last_loss: Option<LossValues>,
}

/// Whether the learning rate decays once the iteration with the 1-based
/// index `epoch` finished.
pub fn decays_after(epoch: u32, lr_decay_epoch: u32) -> bool {
    lr_decay_epoch != 0 && epoch % lr_decay_epoch == 0
}

/// Optimizes the synthesized image for exactly `params.num_epochs`
/// iterations.
///
/// Every iteration extracts the features of the current image, computes the
/// loss against the fixed targets and applies one optimizer step to the
/// image. The network itself is never updated.
pub fn train<B, O>(
    extractor: &FeatureExtractor<B>,
    mut synthesis: Synthesis<B, O>,
    targets: &Targets<B>,
    params: &TrainParams,
    mut progress: Option<Box<dyn TrainingProgress + '_>>,
) -> Result<TrainOutcome<B>, Error>
where
    B: AutodiffBackend,
    O: Optimizer<SynthesizedImage<B>, B>,
{
    log::info!(
        "optimizing a {:?} image for {} epochs, learning rate {}",
        synthesis.image().dims(),
        params.num_epochs,
        synthesis.learning_rate()
    );

    let mut last_loss = None;

    for epoch in 0..params.num_epochs {
        let x = synthesis.image().forward();
        let features = extractor.extract(x.clone());

        let losses = compute_total_loss(
            x,
            &features.content,
            &features.style,
            &targets.contents,
            synthesis.style_grams(),
            &params.weights,
        )?;

        let epoch = epoch + 1;

        // Reading the values back stalls the device, so only do it when
        // someone is listening, or for the final report
        let values = if progress.is_some() || epoch == params.num_epochs {
            Some(losses.values())
        } else {
            None
        };

        synthesis.step(losses.total);

        if decays_after(epoch, params.lr_decay_epoch) {
            let lr = synthesis.learning_rate() * LR_DECAY;
            log::debug!("epoch {}: learning rate decayed to {}", epoch, lr);
            synthesis.set_learning_rate(lr);
        }

        if let (Some(progress), Some(values)) = (progress.as_mut(), values.as_ref()) {
            progress.update(ProgressUpdate {
                epoch,
                total: params.num_epochs,
                learning_rate: synthesis.learning_rate(),
                losses: values,
            });
        }

        if values.is_some() {
            last_loss = values;
        }
    }

    let learning_rate = synthesis.learning_rate();
    log::info!(
        "finished {} epochs, final learning rate {}",
        params.num_epochs,
        learning_rate
    );

    Ok(TrainOutcome {
        image: synthesis.into_image(),
        learning_rate,
        epochs: params.num_epochs,
        last_loss,
    })
}
