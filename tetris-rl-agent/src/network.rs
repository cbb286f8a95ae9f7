//! Q-network function approximator
//!
//! A small fully-connected network mapping a flattened observation
//! tensor to one value estimate per action, trained by minimizing the
//! mean squared error against supplied target vectors with an Adam
//! optimizer. Two independent instances back the DQN agent: the online
//! network (updated on every `fit`) and the target network (updated
//! only by explicit synchronization).

use async_trait::async_trait;
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use tetris_rl_core::{
    ActionValueFunction, BoardObservation, Observation, RLError, Result, ACTION_COUNT,
};

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPSILON: f32 = 1e-8;

/// Q-network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QNetworkConfig {
    /// Input dimension (flattened observation length)
    pub input_dim: usize,
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Output dimension (one value per action)
    pub output_dim: usize,
    /// Learning rate
    pub learning_rate: f32,
    /// Seed for weight initialization
    pub seed: Option<u64>,
}

impl Default for QNetworkConfig {
    fn default() -> Self {
        Self {
            input_dim: BoardObservation::FLAT_DIM,
            hidden_dims: vec![64, 64],
            output_dim: ACTION_COUNT,
            learning_rate: 1e-3,
            seed: None,
        }
    }
}

/// Feed-forward action-value estimator
///
/// Hidden layers use ReLU, the output layer is linear. Weights are
/// initialized with Glorot-uniform draws from an owned, optionally
/// seeded random source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QNetwork {
    config: QNetworkConfig,
    /// Weights for each layer, shaped (in, out)
    weights: Vec<Array2<f32>>,
    /// Biases for each layer
    biases: Vec<Array1<f32>>,
    /// Adam first-moment estimates
    m_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    /// Adam second-moment estimates
    v_weights: Vec<Array2<f32>>,
    v_biases: Vec<Array1<f32>>,
    /// Adam step counter
    steps: i32,
}

impl QNetwork {
    /// Create a new network with freshly initialized weights
    #[must_use]
    pub fn new(config: QNetworkConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut weights = Vec::new();
        let mut biases = Vec::new();

        let mut prev_dim = config.input_dim;
        for &hidden_dim in &config.hidden_dims {
            weights.push(Self::glorot_init(prev_dim, hidden_dim, &mut rng));
            biases.push(Array1::zeros(hidden_dim));
            prev_dim = hidden_dim;
        }

        // Output layer
        weights.push(Self::glorot_init(prev_dim, config.output_dim, &mut rng));
        biases.push(Array1::zeros(config.output_dim));

        let m_weights = weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let v_weights = weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let m_biases = biases.iter().map(|b| Array1::zeros(b.raw_dim())).collect();
        let v_biases = biases.iter().map(|b| Array1::zeros(b.raw_dim())).collect();

        Self {
            config,
            weights,
            biases,
            m_weights,
            m_biases,
            v_weights,
            v_biases,
            steps: 0,
        }
    }

    /// Glorot (fan-in/fan-out aware) uniform initialization
    fn glorot_init(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Array2<f32> {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let dist = Uniform::new(-limit, limit);
        Array2::from_shape_fn((in_dim, out_dim), |_| rng.sample(dist))
    }

    /// The network configuration
    #[must_use]
    pub fn config(&self) -> &QNetworkConfig {
        &self.config
    }

    fn check_input(&self, input: &ArrayView1<f32>) -> Result<()> {
        if input.len() != self.config.input_dim {
            return Err(RLError::DimensionMismatch {
                expected: self.config.input_dim,
                actual: input.len(),
            });
        }
        Ok(())
    }

    /// Estimate one value per action for an input tensor
    ///
    /// Fails fast on an input of the wrong length.
    pub fn predict(&self, input: &ArrayView1<f32>) -> Result<Array1<f32>> {
        self.check_input(input)?;

        let mut hidden = input.to_owned();
        for i in 0..self.config.hidden_dims.len() {
            hidden = hidden.dot(&self.weights[i]) + &self.biases[i];
            hidden.mapv_inplace(|v| v.max(0.0));
        }

        // Output layer is linear: these are value estimates, not probabilities
        let last = self.weights.len() - 1;
        Ok(hidden.dot(&self.weights[last]) + &self.biases[last])
    }

    /// Run one gradient step toward a target value vector
    ///
    /// Performs exactly one Adam update minimizing the mean squared
    /// error between the prediction for `input` and `target`, mutating
    /// only this instance's parameters. Returns the pre-update loss.
    /// A non-finite loss aborts the step before any parameter changes.
    pub fn fit(&mut self, input: &ArrayView1<f32>, target: &ArrayView1<f32>) -> Result<f32> {
        self.check_input(input)?;
        if target.len() != self.config.output_dim {
            return Err(RLError::DimensionMismatch {
                expected: self.config.output_dim,
                actual: target.len(),
            });
        }

        let layer_count = self.weights.len();

        // Forward pass, caching pre-activations for the backward pass
        let mut activations: Vec<Array1<f32>> = Vec::with_capacity(layer_count);
        let mut pre_activations: Vec<Array1<f32>> = Vec::with_capacity(layer_count - 1);

        activations.push(input.to_owned());
        for i in 0..layer_count - 1 {
            let z = activations[i].dot(&self.weights[i]) + &self.biases[i];
            let a = z.mapv(|v| v.max(0.0));
            pre_activations.push(z);
            activations.push(a);
        }
        let prediction =
            activations[layer_count - 1].dot(&self.weights[layer_count - 1])
                + &self.biases[layer_count - 1];

        let residual = &prediction - target;
        let loss = residual.mapv(|r| r * r).mean().unwrap_or(f32::NAN);
        if !loss.is_finite() {
            return Err(RLError::NonFinite(format!(
                "training loss diverged at step {}",
                self.steps + 1
            )));
        }

        // Backward pass: d(MSE)/d(output) for the linear output layer,
        // then ReLU-masked propagation through the hidden layers
        let out_dim = self.config.output_dim as f32;
        let mut delta = residual.mapv(|r| 2.0 * r / out_dim);

        self.steps += 1;
        for layer in (0..layer_count).rev() {
            let grad_w = activations[layer]
                .view()
                .insert_axis(Axis(1))
                .dot(&delta.view().insert_axis(Axis(0)));
            let grad_b = delta.clone();

            let next_delta = if layer > 0 {
                let mut d = self.weights[layer].dot(&delta);
                Zip::from(&mut d)
                    .and(&pre_activations[layer - 1])
                    .for_each(|d, &z| {
                        if z <= 0.0 {
                            *d = 0.0;
                        }
                    });
                Some(d)
            } else {
                None
            };

            let lr = self.config.learning_rate;
            let t = self.steps;
            adam_update(
                &mut self.weights[layer],
                &grad_w,
                &mut self.m_weights[layer],
                &mut self.v_weights[layer],
                lr,
                t,
            );
            adam_update(
                &mut self.biases[layer],
                &grad_b,
                &mut self.m_biases[layer],
                &mut self.v_biases[layer],
                lr,
                t,
            );

            if let Some(d) = next_delta {
                delta = d;
            }
        }

        Ok(loss)
    }

    /// Overwrite this network's parameters with a full copy of another's
    ///
    /// The copy is deep; the two instances share nothing afterwards.
    pub fn sync_from(&mut self, source: &QNetwork) {
        self.weights = source.weights.clone();
        self.biases = source.biases.clone();
    }
}

/// One Adam step for a single parameter tensor
fn adam_update<D: ndarray::Dimension>(
    param: &mut ndarray::Array<f32, D>,
    grad: &ndarray::Array<f32, D>,
    m: &mut ndarray::Array<f32, D>,
    v: &mut ndarray::Array<f32, D>,
    learning_rate: f32,
    step: i32,
) {
    let bias_correction1 = 1.0 - ADAM_BETA1.powi(step);
    let bias_correction2 = 1.0 - ADAM_BETA2.powi(step);

    Zip::from(param).and(grad).and(m).and(v).for_each(|p, &g, m, v| {
        *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
        *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
        let m_hat = *m / bias_correction1;
        let v_hat = *v / bias_correction2;
        *p -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
    });
}

#[async_trait]
impl<O: Observation> ActionValueFunction<O> for QNetwork {
    fn num_actions(&self) -> usize {
        self.config.output_dim
    }

    async fn q_values(&self, observation: &O) -> Result<Array1<f32>> {
        self.predict(&observation.to_tensor().view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn small_config(seed: u64) -> QNetworkConfig {
        QNetworkConfig {
            input_dim: 4,
            hidden_dims: vec![8, 8],
            output_dim: 3,
            learning_rate: 1e-2,
            seed: Some(seed),
        }
    }

    #[test]
    fn seeded_initialization_is_reproducible() {
        let a = QNetwork::new(small_config(42));
        let b = QNetwork::new(small_config(42));
        let input = arr1(&[0.1, -0.2, 0.3, 0.4]);

        let pa = a.predict(&input.view()).unwrap();
        let pb = b.predict(&input.view()).unwrap();
        for (x, y) in pa.iter().zip(pb.iter()) {
            assert_abs_diff_eq!(*x, *y);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let a = QNetwork::new(small_config(1));
        let b = QNetwork::new(small_config(2));
        let input = arr1(&[0.5, 0.5, 0.5, 0.5]);

        let pa = a.predict(&input.view()).unwrap();
        let pb = b.predict(&input.view()).unwrap();
        assert!(pa.iter().zip(pb.iter()).any(|(x, y)| (x - y).abs() > 1e-6));
    }

    #[test]
    fn predict_rejects_wrong_input_shape() {
        let net = QNetwork::new(small_config(0));
        let result = net.predict(&arr1(&[1.0, 2.0]).view());
        assert!(matches!(
            result,
            Err(RLError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn fit_moves_predictions_toward_the_target() {
        let mut net = QNetwork::new(small_config(7));
        let input = arr1(&[0.2, -0.4, 0.6, -0.8]);
        let target = arr1(&[1.0, -1.0, 0.5]);

        let first_loss = net.fit(&input.view(), &target.view()).unwrap();
        let mut last_loss = first_loss;
        for _ in 0..200 {
            last_loss = net.fit(&input.view(), &target.view()).unwrap();
        }
        assert!(last_loss < first_loss);
    }

    #[test]
    fn fit_surfaces_non_finite_targets() {
        let mut net = QNetwork::new(small_config(3));
        let input = arr1(&[0.0, 0.0, 0.0, 0.0]);
        let target = arr1(&[f32::NAN, 0.0, 0.0]);

        let before = net.predict(&input.view()).unwrap();
        let result = net.fit(&input.view(), &target.view());
        assert!(matches!(result, Err(RLError::NonFinite(_))));

        // the aborted step must not have touched the parameters
        let after = net.predict(&input.view()).unwrap();
        for (x, y) in before.iter().zip(after.iter()) {
            assert_abs_diff_eq!(*x, *y);
        }
    }

    #[test]
    fn sync_from_makes_networks_agree() {
        let online = QNetwork::new(small_config(11));
        let mut target = QNetwork::new(small_config(99));
        let input = arr1(&[0.3, 0.1, -0.2, 0.9]);

        target.sync_from(&online);
        let po = online.predict(&input.view()).unwrap();
        let pt = target.predict(&input.view()).unwrap();
        for (x, y) in po.iter().zip(pt.iter()) {
            assert_abs_diff_eq!(*x, *y);
        }
    }

    #[test]
    fn synced_networks_diverge_after_further_fits() {
        let mut online = QNetwork::new(small_config(5));
        let mut target = QNetwork::new(small_config(5));
        target.sync_from(&online);

        let input = arr1(&[0.1, 0.2, 0.3, 0.4]);
        let fit_target = arr1(&[2.0, 2.0, 2.0]);
        for _ in 0..20 {
            online.fit(&input.view(), &fit_target.view()).unwrap();
        }

        let po = online.predict(&input.view()).unwrap();
        let pt = target.predict(&input.view()).unwrap();
        assert!(po.iter().zip(pt.iter()).any(|(x, y)| (x - y).abs() > 1e-6));
    }
}
