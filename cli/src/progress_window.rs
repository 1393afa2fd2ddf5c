use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use neural_style::{ProgressUpdate, TrainingProgress};

/// Terminal progress for a run: one bar for the epochs, and a line below it
/// with the most recent losses.
pub struct ProgressWindow {
    epoch_pb: ProgressBar,
    loss_pb: ProgressBar,

    total_len: u32,
}

impl ProgressWindow {
    pub fn new(epochs: u32) -> Self {
        let multi_pb = MultiProgress::new();
        let sty = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} epochs")
            .progress_chars("##-");

        let epoch_pb = multi_pb.add(ProgressBar::new(u64::from(epochs)));
        epoch_pb.set_style(sty);

        let sty = ProgressStyle::default_spinner().template(" {msg}");
        let loss_pb = multi_pb.add(ProgressBar::new_spinner());
        loss_pb.set_style(sty);

        std::thread::spawn(move || {
            let _ = multi_pb.join();
        });

        Self {
            epoch_pb,
            loss_pb,
            total_len: epochs,
        }
    }
}

impl Drop for ProgressWindow {
    fn drop(&mut self) {
        self.epoch_pb.finish();
        self.loss_pb.finish();
    }
}

impl TrainingProgress for ProgressWindow {
    fn update(&mut self, update: ProgressUpdate<'_>) {
        if update.total != self.total_len {
            self.total_len = update.total;
            self.epoch_pb.set_length(u64::from(self.total_len));
        }

        self.epoch_pb.set_position(u64::from(update.epoch));
        self.loss_pb.set_message(&format!(
            "loss {:.4} (content {:.4}, style {:.4}, tv {:.4}) lr {:.5}",
            update.losses.total,
            update.losses.content,
            update.losses.style,
            update.losses.tv,
            update.learning_rate
        ));
    }
}
