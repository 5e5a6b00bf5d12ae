use ndarray::{Array2, Zip};

/// Adam with bias correction folded into the step size.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    iterations: i32,
    first_moments: Vec<Array2<f64>>,
    second_moments: Vec<Array2<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            iterations: 0,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
        }
    }

    pub fn iterations(&self) -> i32 {
        self.iterations
    }

    /// Applies one update. `grads[k]` must have the shape of `params[k]`; the
    /// moment buffers are sized on the first call.
    pub fn step(&mut self, params: Vec<&mut Array2<f64>>, grads: &[Array2<f64>]) {
        debug_assert_eq!(params.len(), grads.len());
        if self.first_moments.len() != grads.len() {
            self.first_moments = grads.iter().map(|g| Array2::zeros(g.raw_dim())).collect();
            self.second_moments = grads.iter().map(|g| Array2::zeros(g.raw_dim())).collect();
        }

        self.iterations += 1;
        let t = self.iterations;
        let step_size =
            self.learning_rate * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);

        for ((param, grad), (m, v)) in params
            .into_iter()
            .zip(grads)
            .zip(self.first_moments.iter_mut().zip(self.second_moments.iter_mut()))
        {
            Zip::from(param).and(grad).and(m).and(v).for_each(|p, &g, m, v| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                *p -= step_size * *m / (v.sqrt() + epsilon);
            });
        }
    }
}

/// Rescales `grads` in place so their joint L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping.
pub fn clip_global_norm(grads: &mut [Array2<f64>], max_norm: f64) -> f64 {
    let norm = grads
        .iter()
        .map(|g| g.iter().map(|x| x * x).sum::<f64>())
        .sum::<f64>()
        .sqrt();
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        for g in grads.iter_mut() {
            g.mapv_inplace(|x| x * scale);
        }
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_step_moves_each_weight_by_the_learning_rate() {
        let mut adam = Adam::new(0.01);
        let mut w = Array2::from_elem((2, 2), 1.0);
        let grads = vec![Array2::from_shape_vec((2, 2), vec![0.5, -2.0, 10.0, -0.1]).unwrap()];
        adam.step(vec![&mut w], &grads);

        // With bias correction the first update is lr * sign(g).
        assert_relative_eq!(w[[0, 0]], 0.99, epsilon = 1e-6);
        assert_relative_eq!(w[[0, 1]], 1.01, epsilon = 1e-6);
        assert_relative_eq!(w[[1, 0]], 0.99, epsilon = 1e-6);
        assert_relative_eq!(w[[1, 1]], 1.01, epsilon = 1e-5);
        assert_eq!(adam.iterations(), 1);
    }

    #[test]
    fn minimises_a_quadratic() {
        let mut adam = Adam::new(0.1);
        let mut w = Array2::from_elem((1, 1), 5.0);
        for _ in 0..500 {
            let grad = vec![w.mapv(|x| 2.0 * (x - 3.0))];
            adam.step(vec![&mut w], &grad);
        }
        assert_relative_eq!(w[[0, 0]], 3.0, epsilon = 1e-2);
    }

    #[test]
    fn clipping_bounds_the_joint_norm() {
        let mut grads = vec![Array2::from_elem((1, 1), 3.0), Array2::from_elem((1, 1), 4.0)];
        let norm = clip_global_norm(&mut grads, 1.0);
        assert_relative_eq!(norm, 5.0);
        assert_relative_eq!(grads[0][[0, 0]], 0.6);
        assert_relative_eq!(grads[1][[0, 0]], 0.8);

        let mut small = vec![Array2::from_elem((1, 1), 0.1)];
        clip_global_norm(&mut small, 1.0);
        assert_eq!(small[0][[0, 0]], 0.1);
    }
}
