//! Recurrent and dense layers with hand-written backward passes.
//!
//! Every trainable tensor is an `Array2<f64>` (biases are single-row matrices) so the
//! optimizer can treat all parameters alike.

use ndarray::{Array2, Array3, Axis, s};
use rand::Rng;
use serde::{Deserialize, Serialize};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn relu_grad(x: f64) -> f64 {
    if x > 0.0 { 1.0 } else { 0.0 }
}

/// Glorot/Xavier uniform initialisation.
fn glorot_uniform<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
}

/// LSTM layer over a whole batch of sequences.
///
/// Gates are sigmoid; the candidate and the cell output use ReLU. Gate blocks in
/// the fused matrices are ordered input, forget, candidate, output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    pub input_size: usize,
    pub units: usize,
    /// (input_size, 4 * units)
    pub(crate) kernel: Array2<f64>,
    /// (units, 4 * units)
    pub(crate) recurrent: Array2<f64>,
    /// (1, 4 * units)
    pub(crate) bias: Array2<f64>,
}

/// Activations of one time step kept for the backward pass.
#[derive(Debug, Clone)]
struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    c: Array2<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct LstmCache {
    steps: Vec<StepCache>,
}

impl LstmLayer {
    pub fn new<R: Rng>(input_size: usize, units: usize, rng: &mut R) -> Self {
        let mut bias = Array2::zeros((1, 4 * units));
        // Forget gate starts open.
        bias.slice_mut(s![.., units..2 * units]).fill(1.0);
        Self {
            input_size,
            units,
            kernel: glorot_uniform(input_size, 4 * units, rng),
            recurrent: glorot_uniform(units, 4 * units, rng),
            bias,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.kernel.len() + self.recurrent.len() + self.bias.len()
    }

    /// Runs the layer over `inputs` (batch, time, input_size) and returns every hidden
    /// state (batch, time, units) together with the cache `backward` needs.
    pub fn forward(&self, inputs: &Array3<f64>) -> (Array3<f64>, LstmCache) {
        let mut cache = LstmCache::default();
        let outputs = self.run(inputs, Some(&mut cache));
        (outputs, cache)
    }

    /// Forward pass without keeping activations.
    pub fn infer(&self, inputs: &Array3<f64>) -> Array3<f64> {
        self.run(inputs, None)
    }

    fn run(&self, inputs: &Array3<f64>, mut cache: Option<&mut LstmCache>) -> Array3<f64> {
        let (batch, steps, _) = inputs.dim();
        let n = self.units;
        let mut h = Array2::<f64>::zeros((batch, n));
        let mut c = Array2::<f64>::zeros((batch, n));
        let mut outputs = Array3::zeros((batch, steps, n));

        for t in 0..steps {
            let x = inputs.slice(s![.., t, ..]).to_owned();
            let z = x.dot(&self.kernel) + h.dot(&self.recurrent) + &self.bias;

            let i = z.slice(s![.., 0..n]).mapv(sigmoid);
            let f = z.slice(s![.., n..2 * n]).mapv(sigmoid);
            let g = z.slice(s![.., 2 * n..3 * n]).mapv(relu);
            let o = z.slice(s![.., 3 * n..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let h_next = &o * &c_next.mapv(relu);
            outputs.slice_mut(s![.., t, ..]).assign(&h_next);

            if let Some(cache) = cache.as_deref_mut() {
                cache.steps.push(StepCache {
                    x,
                    h_prev: h,
                    c_prev: c,
                    i,
                    f,
                    g,
                    o,
                    c: c_next.clone(),
                });
            }
            h = h_next;
            c = c_next;
        }
        outputs
    }

    /// Backpropagation through time.
    ///
    /// `d_outputs` is the loss gradient for every hidden state (zeros where a step's
    /// output is unused). Returns the gradient for the layer inputs and the parameter
    /// gradients as `[kernel, recurrent, bias]`.
    pub fn backward(&self, cache: &LstmCache, d_outputs: &Array3<f64>) -> (Array3<f64>, [Array2<f64>; 3]) {
        let (batch, steps, _) = d_outputs.dim();
        let n = self.units;
        let mut d_inputs = Array3::<f64>::zeros((batch, steps, self.input_size));
        let mut d_kernel = Array2::<f64>::zeros(self.kernel.raw_dim());
        let mut d_recurrent = Array2::<f64>::zeros(self.recurrent.raw_dim());
        let mut d_bias = Array2::<f64>::zeros(self.bias.raw_dim());

        let mut dh_next = Array2::<f64>::zeros((batch, n));
        let mut dc_next = Array2::<f64>::zeros((batch, n));
        let mut dz = Array2::<f64>::zeros((batch, 4 * n));

        for t in (0..steps).rev() {
            let step = &cache.steps[t];
            let dh = &d_outputs.slice(s![.., t, ..]) + &dh_next;

            let dc = &dh * &step.o * &step.c.mapv(relu_grad) + &dc_next;
            let d_o = &dh * &step.c.mapv(relu) * &step.o.mapv(|v| v * (1.0 - v));
            let d_i = &dc * &step.g * &step.i.mapv(|v| v * (1.0 - v));
            let d_f = &dc * &step.c_prev * &step.f.mapv(|v| v * (1.0 - v));
            let d_g = &dc * &step.i * &step.g.mapv(relu_grad);

            dz.slice_mut(s![.., 0..n]).assign(&d_i);
            dz.slice_mut(s![.., n..2 * n]).assign(&d_f);
            dz.slice_mut(s![.., 2 * n..3 * n]).assign(&d_g);
            dz.slice_mut(s![.., 3 * n..]).assign(&d_o);

            d_kernel += &step.x.t().dot(&dz);
            d_recurrent += &step.h_prev.t().dot(&dz);
            d_bias += &dz.sum_axis(Axis(0)).insert_axis(Axis(0));

            d_inputs.slice_mut(s![.., t, ..]).assign(&dz.dot(&self.kernel.t()));
            dh_next = dz.dot(&self.recurrent.t());
            dc_next = &dc * &step.f;
        }

        (d_inputs, [d_kernel, d_recurrent, d_bias])
    }

    #[cfg(test)]
    pub(crate) fn parameters(&self) -> [&Array2<f64>; 3] {
        [&self.kernel, &self.recurrent, &self.bias]
    }

    pub(crate) fn parameters_mut(&mut self) -> [&mut Array2<f64>; 3] {
        [&mut self.kernel, &mut self.recurrent, &mut self.bias]
    }
}

/// Fully connected linear layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    /// (inputs, outputs)
    pub(crate) weights: Array2<f64>,
    /// (1, outputs)
    pub(crate) bias: Array2<f64>,
}

impl Dense {
    pub fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        Self {
            weights: glorot_uniform(inputs, outputs, rng),
            bias: Array2::zeros((1, outputs)),
        }
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weights) + &self.bias
    }

    /// Returns the input gradient and `[weights, bias]` gradients.
    pub fn backward(&self, x: &Array2<f64>, d_out: &Array2<f64>) -> (Array2<f64>, [Array2<f64>; 2]) {
        let d_weights = x.t().dot(d_out);
        let d_bias = d_out.sum_axis(Axis(0)).insert_axis(Axis(0));
        (d_out.dot(&self.weights.t()), [d_weights, d_bias])
    }

    #[cfg(test)]
    pub(crate) fn parameters(&self) -> [&Array2<f64>; 2] {
        [&self.weights, &self.bias]
    }

    pub(crate) fn parameters_mut(&mut self) -> [&mut Array2<f64>; 2] {
        [&mut self.weights, &mut self.bias]
    }
}
