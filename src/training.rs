use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::TrainingConfig;
use crate::dataset::WindowedDataset;
use crate::error::PipelineError;
use crate::model::StackedLstm;
use crate::optimizer::{Adam, clip_global_norm};

/// Loss curve and stopping information of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingHistory {
    /// Mean squared error of every completed epoch, in order.
    pub losses: Vec<f64>,
    /// Zero-based epoch whose weights the model ended with.
    pub best_epoch: usize,
    pub best_loss: f64,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn epochs_run(&self) -> usize {
        self.losses.len()
    }
}

/// Watches the training loss and remembers the best weights seen so far.
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: usize,
    wait: usize,
    best_weights: Option<StackedLstm>,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: 0,
            wait: 0,
            best_weights: None,
        }
    }

    /// Records the loss of `epoch`; returns `true` once training should stop.
    pub fn update(&mut self, epoch: usize, loss: f64, model: &StackedLstm) -> bool {
        if loss < self.best {
            self.best = loss;
            self.best_epoch = epoch;
            self.wait = 0;
            self.best_weights = Some(model.clone());
            return false;
        }
        self.wait += 1;
        self.wait >= self.patience
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn best_loss(&self) -> f64 {
        self.best
    }

    /// Hands back the best snapshot, if any epoch finished.
    pub fn take_best(&mut self) -> Option<StackedLstm> {
        self.best_weights.take()
    }
}

fn mean_squared_error(predictions: &Array1<f64>, targets: &Array1<f64>) -> f64 {
    let diff = predictions - targets;
    diff.mapv(|d| d * d).mean().unwrap_or(0.0)
}

/// Mini-batch trainer for `StackedLstm` with Adam and early stopping.
pub struct Trainer {
    config: TrainingConfig,
    rng: StdRng,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Fits `model` on `data` and leaves it holding the weights of its best epoch.
    ///
    /// Examples are reshuffled every epoch. The reported epoch loss is the mean
    /// of the batch losses weighted by batch size.
    ///
    /// # Errors
    /// * `PipelineError::InsufficientData` if `data` holds no examples.
    /// * `PipelineError::NumericIntegrity` if a batch loss is not finite.
    /// * Progress bar template errors.
    pub fn train(&mut self, model: &mut StackedLstm, data: &WindowedDataset) -> anyhow::Result<TrainingHistory> {
        if data.is_empty() {
            return Err(PipelineError::InsufficientData {
                available: 0,
                required: 1,
            }
            .into());
        }

        let examples = data.len();
        let batch_size = self.config.batch_size.max(1);
        let mut optimizer = Adam::new(self.config.learning_rate);
        let mut stopper = EarlyStopping::new(self.config.patience);
        let mut losses = Vec::with_capacity(self.config.epochs);
        let mut stopped_early = false;
        let mut order: Vec<usize> = (0..examples).collect();

        let pb = if self.config.show_progress {
            ProgressBar::new(self.config.epochs as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} epochs, loss: {msg}")?
                .progress_chars("#>-"),
        );

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut self.rng);
            let mut weighted_loss = 0.0;

            for batch in order.chunks(batch_size) {
                let inputs = data.inputs.select(Axis(0), batch);
                let targets = data.targets.select(Axis(0), batch);

                let (predictions, cache) = model.forward_train(&inputs, &mut self.rng);
                let loss = mean_squared_error(&predictions, &targets);
                if !loss.is_finite() {
                    pb.abandon();
                    return Err(PipelineError::numeric("training").into());
                }
                weighted_loss += loss * batch.len() as f64;

                let d_predictions = (&predictions - &targets) * (2.0 / batch.len() as f64);
                let mut grads = model.backward(&cache, &d_predictions);
                if let Some(max_norm) = self.config.gradient_clip {
                    clip_global_norm(&mut grads, max_norm);
                }
                optimizer.step(model.parameters_mut(), &grads);
            }

            let epoch_loss = weighted_loss / examples as f64;
            losses.push(epoch_loss);
            log::debug!("epoch {}/{}: loss {:.6}", epoch + 1, self.config.epochs, epoch_loss);
            pb.set_message(format!("{:.6}", epoch_loss));
            pb.inc(1);

            if stopper.update(epoch, epoch_loss, model) {
                stopped_early = epoch + 1 < self.config.epochs;
                if stopped_early {
                    log::info!(
                        "early stopping after epoch {}: no improvement for {} epochs",
                        epoch + 1,
                        self.config.patience
                    );
                }
                break;
            }
        }
        pb.finish_with_message(format!("{:.6}", stopper.best_loss()));

        if let Some(best) = stopper.take_best() {
            *model = best;
        }

        anyhow::Ok(TrainingHistory {
            losses,
            best_epoch: stopper.best_epoch(),
            best_loss: stopper.best_loss(),
            stopped_early,
        })
    }
}
