//! Shared-trunk neural regressor
//!
//! A small multi-layer perceptron reads the metafeatures; each pipeline
//! owns a linear output head on top of the shared trunk. Training batches
//! are grouped by pipeline so every step updates the trunk and exactly one
//! head. Unknown pipelines are scored with the mean of all heads.
//!
//! ```text
//! metafeatures ─▶ Dense ─▶ act ─▶ … ─▶ Dense ─▶ act ─┬─▶ head[pipeline_0] ─▶ score
//!                                                    ├─▶ head[pipeline_1] ─▶ score
//!                                                    └─▶ …
//! ```

#![allow(clippy::cast_precision_loss)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_width, empty_corpus, examples, not_fit, Predictor};
use crate::record::Corpus;
use crate::space::Configuration;
use crate::{Error, Result};

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Rectified Linear Unit
    Relu,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic sigmoid
    Sigmoid,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Self::Relu => z.max(0.0),
            Self::Tanh => z.tanh(),
            Self::Sigmoid => 1.0 / (1.0 + (-z).exp()),
        }
    }

    /// Derivative expressed through the pre-activation `z`.
    fn derivative(self, z: f64) -> f64 {
        match self {
            Self::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Tanh => 1.0 - z.tanh().powi(2),
            Self::Sigmoid => {
                let s = self.apply(z);
                s * (1.0 - s)
            }
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Relu => "relu",
            Self::Tanh => "tanh",
            Self::Sigmoid => "sigmoid",
        })
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "relu" => Ok(Self::Relu),
            "tanh" => Ok(Self::Tanh),
            "sigmoid" => Ok(Self::Sigmoid),
            other => Err(Error::config(
                "activation_name",
                format!("unknown activation `{other}` (expected relu, tanh or sigmoid)"),
            )),
        }
    }
}

/// Fully connected layer, weights stored row-major `[n_out][n_in]`.
#[derive(Debug, Clone)]
struct Dense {
    n_in: usize,
    n_out: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl Dense {
    /// Xavier/Glorot uniform initialization
    fn new<R: Rng>(n_in: usize, n_out: usize, rng: &mut R) -> Self {
        let scale = (6.0 / (n_in + n_out).max(1) as f64).sqrt();
        let weights = (0..n_in * n_out)
            .map(|_| rng.gen_range(-scale..=scale))
            .collect();
        Self {
            n_in,
            n_out,
            weights,
            bias: vec![0.0; n_out],
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            n_in: self.n_in,
            n_out: self.n_out,
            weights: vec![0.0; self.weights.len()],
            bias: vec![0.0; self.bias.len()],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        if self.n_in == 0 {
            return self.bias.clone();
        }
        self.weights
            .chunks(self.n_in)
            .zip(&self.bias)
            .map(|(row, b)| b + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>())
            .collect()
    }

    /// Accumulate gradients for `delta` (dL/dz) and return dL/dinput.
    fn backward(&self, input: &[f64], delta: &[f64], grad: &mut Self) -> Vec<f64> {
        let mut upstream = vec![0.0; self.n_in];
        for (o, d) in delta.iter().enumerate() {
            let row = o * self.n_in;
            for (i, x) in input.iter().enumerate() {
                grad.weights[row + i] += d * x;
                upstream[i] += d * self.weights[row + i];
            }
            grad.bias[o] += d;
        }
        upstream
    }

    fn step(&mut self, grad: &Self, scale: f64, learning_rate: f64, l2_penalty: f64) {
        for (w, g) in self.weights.iter_mut().zip(&grad.weights) {
            *w -= learning_rate * (g * scale + l2_penalty * *w);
        }
        for (b, g) in self.bias.iter_mut().zip(&grad.bias) {
            *b -= learning_rate * g * scale;
        }
    }

    fn is_finite(&self) -> bool {
        self.weights.iter().chain(&self.bias).all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone)]
struct Network {
    n_features: usize,
    activation: Activation,
    trunk: Vec<Dense>,
    heads: Vec<Dense>,
    pipelines: BTreeMap<String, usize>,
}

/// Intermediate values of one forward pass.
struct Trace {
    /// Inputs to each trunk layer, then the trunk output
    inputs: Vec<Vec<f64>>,
    /// Pre-activations of each trunk layer
    pre_activations: Vec<Vec<f64>>,
}

impl Network {
    fn trunk_forward(&self, features: &[f64]) -> Trace {
        let mut inputs = vec![features.to_vec()];
        let mut pre_activations = Vec::with_capacity(self.trunk.len());
        for layer in &self.trunk {
            let z = layer.forward(inputs.last().map_or(&[][..], Vec::as_slice));
            inputs.push(z.iter().map(|v| self.activation.apply(*v)).collect());
            pre_activations.push(z);
        }
        Trace {
            inputs,
            pre_activations,
        }
    }

    fn head_output(&self, head: usize, hidden: &[f64]) -> f64 {
        self.heads[head].forward(hidden)[0]
    }

    fn is_finite(&self) -> bool {
        self.trunk.iter().chain(&self.heads).all(Dense::is_finite)
    }
}

/// Shared-trunk MLP regressor.
///
/// Hyperparameters: `n_hidden_layers` (1), `hidden_layer_size` (16),
/// `activation_name` (`relu`), `learning_rate` (0.01), `n_epochs` (50),
/// `batch_size` (32), `l2_penalty` (0.0).
#[derive(Debug, Clone)]
pub struct DnaRegression {
    n_hidden_layers: usize,
    hidden_layer_size: usize,
    activation: Activation,
    learning_rate: f64,
    n_epochs: usize,
    batch_size: usize,
    l2_penalty: f64,
    seed: u64,
    network: Option<Network>,
}

impl DnaRegression {
    /// Read hyperparameters from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown activation or an
    /// out-of-range numeric hyperparameter.
    pub fn from_config(config: &Configuration, seed: u64) -> Result<Self> {
        let n_hidden_layers = config.usize_or("n_hidden_layers", 1)?;
        let hidden_layer_size = config.usize_or("hidden_layer_size", 16)?;
        let activation: Activation = config.str_or("activation_name", "relu")?.parse()?;
        let learning_rate = config.float_or("learning_rate", 0.01)?;
        let n_epochs = config.usize_or("n_epochs", 50)?;
        let batch_size = config.usize_or("batch_size", 32)?;
        let l2_penalty = config.float_or("l2_penalty", 0.0)?;

        if n_hidden_layers > 0 && hidden_layer_size == 0 {
            return Err(Error::config("hidden_layer_size", "must be at least 1"));
        }
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(Error::config("learning_rate", format!("must be positive, got {learning_rate}")));
        }
        if n_epochs == 0 {
            return Err(Error::config("n_epochs", "must be at least 1"));
        }
        if batch_size == 0 {
            return Err(Error::config("batch_size", "must be at least 1"));
        }
        if !(l2_penalty >= 0.0 && l2_penalty.is_finite()) {
            return Err(Error::config("l2_penalty", format!("must be non-negative, got {l2_penalty}")));
        }

        Ok(Self {
            n_hidden_layers,
            hidden_layer_size,
            activation,
            learning_rate,
            n_epochs,
            batch_size,
            l2_penalty,
            seed,
            network: None,
        })
    }

    fn initialize(&self, n_features: usize, pipelines: BTreeMap<String, usize>) -> Network {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(1));
        let mut trunk = Vec::with_capacity(self.n_hidden_layers);
        let mut width = n_features;
        for _ in 0..self.n_hidden_layers {
            trunk.push(Dense::new(width, self.hidden_layer_size, &mut rng));
            width = self.hidden_layer_size;
        }
        let heads = (0..pipelines.len())
            .map(|_| Dense::new(width, 1, &mut rng))
            .collect();
        Network {
            n_features,
            activation: self.activation,
            trunk,
            heads,
            pipelines,
        }
    }
}

impl Predictor for DnaRegression {
    fn name(&self) -> &'static str {
        "dna_regression"
    }

    fn fit(&mut self, train: &Corpus) -> Result<()> {
        let data = examples(train);
        let Some(first) = data.first() else {
            return Err(empty_corpus(self.name()));
        };
        let n_features = first.features.len();
        let pipelines: BTreeMap<String, usize> = data
            .iter()
            .map(|e| e.pipeline_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), i))
            .collect();

        let mut by_pipeline: Vec<Vec<usize>> = vec![Vec::new(); pipelines.len()];
        for (i, example) in data.iter().enumerate() {
            check_width(self.name(), n_features, example.features.len())?;
            by_pipeline[pipelines[example.pipeline_id]].push(i);
        }

        let mut net = self.initialize(n_features, pipelines);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(2));

        for epoch in 0..self.n_epochs {
            let mut batches: Vec<(usize, Vec<usize>)> = Vec::new();
            for (head, rows) in by_pipeline.iter_mut().enumerate() {
                rows.shuffle(&mut rng);
                batches.extend(rows.chunks(self.batch_size).map(|c| (head, c.to_vec())));
            }
            batches.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for (head, rows) in &batches {
                let mut trunk_grads: Vec<Dense> = net.trunk.iter().map(Dense::zeros_like).collect();
                let mut head_grad = net.heads[*head].zeros_like();

                for &i in rows {
                    let trace = net.trunk_forward(&data[i].features);
                    let hidden = trace.inputs.last().map_or(&[][..], Vec::as_slice);
                    let residual = net.head_output(*head, hidden) - data[i].score;
                    epoch_loss += residual * residual;

                    let mut delta = net.heads[*head].backward(hidden, &[residual], &mut head_grad);
                    for l in (0..net.trunk.len()).rev() {
                        let dz: Vec<f64> = delta
                            .iter()
                            .zip(&trace.pre_activations[l])
                            .map(|(d, z)| d * net.activation.derivative(*z))
                            .collect();
                        delta = net.trunk[l].backward(&trace.inputs[l], &dz, &mut trunk_grads[l]);
                    }
                }

                let scale = 1.0 / rows.len() as f64;
                net.heads[*head].step(&head_grad, scale, self.learning_rate, self.l2_penalty);
                for (layer, grad) in net.trunk.iter_mut().zip(&trunk_grads) {
                    layer.step(grad, scale, self.learning_rate, self.l2_penalty);
                }
            }

            if !net.is_finite() || !epoch_loss.is_finite() {
                return Err(Error::Training(format!(
                    "dna_regression diverged at epoch {epoch} (learning_rate={})",
                    self.learning_rate
                )));
            }
            debug!(epoch, loss = epoch_loss / data.len() as f64, "dna_regression epoch");
        }

        self.network = Some(net);
        Ok(())
    }

    fn predict(&self, features: &[f64], pipeline_id: &str) -> Result<f64> {
        let net = self.network.as_ref().ok_or_else(|| not_fit(self.name()))?;
        check_width(self.name(), net.n_features, features.len())?;
        let trace = net.trunk_forward(features);
        let hidden = trace.inputs.last().map_or(&[][..], Vec::as_slice);

        Ok(match net.pipelines.get(pipeline_id) {
            Some(&head) => net.head_output(head, hidden),
            None => {
                let total: f64 = (0..net.heads.len()).map(|h| net.head_output(h, hidden)).sum();
                total / net.heads.len() as f64
            }
        })
    }
}
