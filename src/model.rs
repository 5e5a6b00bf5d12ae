use ndarray::{Array1, Array2, Array3, Axis, s};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::layers::{Dense, LstmCache, LstmLayer};

/// Row of the model summary printed before training.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub name: String,
    pub output_shape: String,
    pub parameters: usize,
}

/// Stacked LSTM regressor: every recurrent layer but the last returns its full
/// sequence, each is followed by dropout, and a dense head maps the last hidden
/// state to one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedLstm {
    config: ModelConfig,
    layers: Vec<LstmLayer>,
    head: Dense,
}

/// Intermediate values of a training forward pass.
#[derive(Debug)]
pub struct ForwardCache {
    layer_caches: Vec<LstmCache>,
    /// Inverted-dropout masks applied after each layer; `None` when the rate is zero.
    sequence_masks: Vec<Option<Array3<f64>>>,
    head_mask: Option<Array2<f64>>,
    head_input: Array2<f64>,
    steps: usize,
}

fn dropout_mask<R: Rng>(shape: (usize, usize), rate: f64, rng: &mut R) -> Option<Array2<f64>> {
    if rate <= 0.0 {
        return None;
    }
    let keep = 1.0 - rate;
    Some(Array2::from_shape_fn(shape, |_| if rng.gen_bool(keep) { 1.0 / keep } else { 0.0 }))
}

fn sequence_dropout_mask<R: Rng>(shape: (usize, usize, usize), rate: f64, rng: &mut R) -> Option<Array3<f64>> {
    if rate <= 0.0 {
        return None;
    }
    let keep = 1.0 - rate;
    Some(Array3::from_shape_fn(shape, |_| if rng.gen_bool(keep) { 1.0 / keep } else { 0.0 }))
}

impl StackedLstm {
    pub fn new<R: Rng>(config: ModelConfig, rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(config.layers.len());
        let mut input_size = config.input_size;
        for spec in &config.layers {
            layers.push(LstmLayer::new(input_size, spec.units, rng));
            input_size = spec.units;
        }
        let head = Dense::new(input_size, config.output_size, rng);
        Self { config, layers, head }
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(LstmLayer::parameter_count).sum::<usize>() + self.head.parameter_count()
    }

    /// Layer table for a sequence length of `steps`.
    pub fn summary(&self, steps: usize) -> Vec<LayerSummary> {
        let mut rows = Vec::new();
        let last = self.layers.len() - 1;
        for (idx, (layer, spec)) in self.layers.iter().zip(&self.config.layers).enumerate() {
            let shape = if idx == last {
                format!("(None, {})", layer.units)
            } else {
                format!("(None, {}, {})", steps, layer.units)
            };
            rows.push(LayerSummary {
                name: format!("lstm_{}", idx + 1),
                output_shape: shape.clone(),
                parameters: layer.parameter_count(),
            });
            rows.push(LayerSummary {
                name: format!("dropout_{} ({})", idx + 1, spec.dropout),
                output_shape: shape,
                parameters: 0,
            });
        }
        rows.push(LayerSummary {
            name: "dense".to_string(),
            output_shape: format!("(None, {})", self.head.outputs()),
            parameters: self.head.parameter_count(),
        });
        rows
    }

    /// Training-mode forward pass with dropout; returns one prediction per example.
    pub fn forward_train<R: Rng>(&self, inputs: &Array3<f64>, rng: &mut R) -> (Array1<f64>, ForwardCache) {
        let (batch, steps, _) = inputs.dim();
        let last = self.layers.len() - 1;
        let mut layer_caches = Vec::with_capacity(self.layers.len());
        let mut sequence_masks = Vec::with_capacity(last);
        let mut x = inputs.to_owned();
        let mut head_input = Array2::<f64>::zeros((batch, 0));
        let mut head_mask = None;

        for (idx, (layer, spec)) in self.layers.iter().zip(&self.config.layers).enumerate() {
            let (outputs, cache) = layer.forward(&x);
            layer_caches.push(cache);
            if idx < last {
                let mask = sequence_dropout_mask(outputs.dim(), spec.dropout, rng);
                x = match &mask {
                    Some(mask) => outputs * mask,
                    None => outputs,
                };
                sequence_masks.push(mask);
            } else {
                let hidden = outputs.slice(s![.., steps - 1, ..]).to_owned();
                let mask = dropout_mask(hidden.dim(), spec.dropout, rng);
                head_input = match &mask {
                    Some(mask) => hidden * mask,
                    None => hidden,
                };
                head_mask = mask;
            }
        }

        let predictions = self.head.forward(&head_input).column(0).to_owned();
        let cache = ForwardCache {
            layer_caches,
            sequence_masks,
            head_mask,
            head_input,
            steps,
        };
        (predictions, cache)
    }

    /// Gradients of the loss for every parameter, in `parameters_mut` order.
    ///
    /// `d_predictions` is the loss gradient for each prediction of the batch.
    pub fn backward(&self, cache: &ForwardCache, d_predictions: &Array1<f64>) -> Vec<Array2<f64>> {
        let batch = d_predictions.len();
        let d_out = d_predictions.to_owned().insert_axis(Axis(1));
        let (d_hidden, head_grads) = self.head.backward(&cache.head_input, &d_out);

        let d_hidden = match &cache.head_mask {
            Some(mask) => d_hidden * mask,
            None => d_hidden,
        };

        let last = self.layers.len() - 1;
        let mut layer_grads: Vec<[Array2<f64>; 3]> = Vec::with_capacity(self.layers.len());
        let mut d_seq = Array3::<f64>::zeros((batch, cache.steps, self.layers[last].units));
        d_seq.slice_mut(s![.., cache.steps - 1, ..]).assign(&d_hidden);

        for idx in (0..self.layers.len()).rev() {
            if idx < last {
                if let Some(mask) = &cache.sequence_masks[idx] {
                    d_seq = d_seq * mask;
                }
            }
            let (d_inputs, grads) = self.layers[idx].backward(&cache.layer_caches[idx], &d_seq);
            layer_grads.push(grads);
            d_seq = d_inputs;
        }

        layer_grads
            .into_iter()
            .rev()
            .flatten()
            .chain(head_grads)
            .collect()
    }

    /// Inference without dropout.
    pub fn predict(&self, inputs: &Array3<f64>) -> Array1<f64> {
        let steps = inputs.dim().1;
        let mut x = inputs.to_owned();
        for layer in &self.layers {
            x = layer.infer(&x);
        }
        let hidden = x.slice(s![.., steps - 1, ..]).to_owned();
        self.head.forward(&hidden).column(0).to_owned()
    }

    /// `predict` over chunks of `chunk_size` examples spread across the rayon pool.
    pub fn predict_batched(&self, inputs: &Array3<f64>, chunk_size: usize) -> Array1<f64> {
        let examples = inputs.dim().0;
        if examples == 0 {
            return Array1::zeros(0);
        }
        let chunk_size = chunk_size.max(1);
        let starts: Vec<usize> = (0..examples).step_by(chunk_size).collect();
        let chunks: Vec<Array1<f64>> = starts
            .par_iter()
            .map(|&start| {
                let end = (start + chunk_size).min(examples);
                self.predict(&inputs.slice(s![start..end, .., ..]).to_owned())
            })
            .collect();
        chunks.iter().flat_map(|chunk| chunk.iter().copied()).collect()
    }

    #[cfg(test)]
    pub(crate) fn parameters(&self) -> Vec<&Array2<f64>> {
        let mut params: Vec<&Array2<f64>> = self.layers.iter().flat_map(|l| l.parameters()).collect();
        params.extend(self.head.parameters());
        params
    }

    pub(crate) fn parameters_mut(&mut self) -> Vec<&mut Array2<f64>> {
        let mut params: Vec<&mut Array2<f64>> = self.layers.iter_mut().flat_map(|l| l.parameters_mut()).collect();
        params.extend(self.head.parameters_mut());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small_model(dropout: f64, seed: u64) -> StackedLstm {
        let mut rng = StdRng::seed_from_u64(seed);
        StackedLstm::new(ModelConfig::with_layers(&[(4, dropout), (3, dropout)]), &mut rng)
    }

    fn inputs(batch: usize, steps: usize) -> Array3<f64> {
        Array3::from_shape_fn((batch, steps, 1), |(b, t, _)| 0.1 + 0.05 * (b + t) as f64)
    }

    #[test]
    fn default_stack_has_178761_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = StackedLstm::new(ModelConfig::default(), &mut rng);
        let summary = model.summary(100);

        let counts: Vec<usize> = summary.iter().map(|row| row.parameters).collect();
        assert_eq!(counts, vec![10400, 0, 26640, 0, 45120, 0, 96480, 0, 121]);
        assert_eq!(model.parameter_count(), 178_761);
        assert_eq!(summary[0].output_shape, "(None, 100, 50)");
        assert_eq!(summary[6].output_shape, "(None, 120)");
    }

    #[test]
    fn predictions_have_one_value_per_example() {
        let model = small_model(0.2, 1);
        assert_eq!(model.predict(&inputs(5, 6)).len(), 5);
        let mut rng = StdRng::seed_from_u64(9);
        let (train_out, _) = model.forward_train(&inputs(5, 6), &mut rng);
        assert_eq!(train_out.len(), 5);
    }

    #[test]
    fn without_dropout_training_and_inference_agree() {
        let model = small_model(0.0, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let x = inputs(3, 5);
        let (train_out, _) = model.forward_train(&x, &mut rng);
        assert_eq!(train_out, model.predict(&x));
    }

    #[test]
    fn batched_prediction_matches_single_pass() {
        let model = small_model(0.3, 4);
        let x = inputs(11, 4);
        let whole = model.predict(&x);
        let batched = model.predict_batched(&x, 3);
        for (a, b) in whole.iter().zip(batched.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(model.predict_batched(&Array3::zeros((0, 4, 1)), 3).len(), 0);
    }

    #[test]
    fn stacked_gradients_match_finite_differences() {
        let mut model = small_model(0.0, 5);
        let x = inputs(2, 4);
        let targets = Array1::from(vec![0.3, 0.7]);
        let loss = |m: &StackedLstm| {
            let diff = m.predict(&x) - &targets;
            0.5 * diff.mapv(|d| d * d).sum()
        };

        let mut rng = StdRng::seed_from_u64(0);
        let (pred, cache) = model.forward_train(&x, &mut rng);
        let grads = model.backward(&cache, &(pred - &targets));
        assert_eq!(grads.len(), model.parameters().len());

        let eps = 1e-6;
        for (p, grad) in grads.iter().enumerate() {
            // Spot-check the first entry of every parameter tensor.
            let original = model.parameters()[p][[0, 0]];
            model.parameters_mut()[p][[0, 0]] = original + eps;
            let plus = loss(&model);
            model.parameters_mut()[p][[0, 0]] = original - eps;
            let minus = loss(&model);
            model.parameters_mut()[p][[0, 0]] = original;

            let numeric = (plus - minus) / (2.0 * eps);
            assert!(
                (numeric - grad[[0, 0]]).abs() < 1e-5,
                "param {}: numeric {} vs analytic {}",
                p,
                numeric,
                grad[[0, 0]]
            );
        }
    }

    #[test]
    fn dropout_zeroes_part_of_the_head_input() {
        let model = small_model(0.5, 6);
        let mut rng = StdRng::seed_from_u64(11);
        let (_, cache) = model.forward_train(&inputs(64, 3), &mut rng);
        let mask = cache.head_mask.as_ref().unwrap();
        let dropped = mask.iter().filter(|&&m| m == 0.0).count();
        assert!(dropped > 0 && dropped < mask.len());
        assert!(mask.iter().all(|&m| m == 0.0 || (m - 2.0).abs() < 1e-12));
    }
}
