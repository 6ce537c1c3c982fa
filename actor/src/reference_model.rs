//! Seeded fixed-weight model used when no trained network is plugged in.
//!
//! Every head is a single dense layer with weights drawn from a seeded
//! ChaCha20 stream, so two models built from the same settings are
//! identical. The output shapes match what a trained network would give,
//! which lets the player, reanalyser and batch consumer run end to end.
//!
//! Weights round-trip through JSON so that an external trainer can hand a
//! new model to a running actor (see `model_watcher`).

use anyhow::{anyhow, Result};
use mcts::{Action, ActionSpace, Dynamics, Model, ModelError, Prediction, ValueOutput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Shape and seed of a [`LinearModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub observation_size: usize,
    pub latent_size: usize,
    /// Width of the recurrent carry in value-prefix mode.
    pub hidden_size: usize,
    /// Half width of the value and reward supports.
    pub support_width: usize,
    pub value_prefix: bool,
    pub categorical_value: bool,
    pub seed: u64,
}

/// Fully connected layer `y = W x + b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dense {
    inputs: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Dense {
    // Same fan-in scaling as the usual default initialisation of a linear layer.
    fn new(inputs: usize, outputs: usize, rng: &mut ChaCha20Rng) -> Self {
        let bound = 1.0 / (inputs.max(1) as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-bound..=bound))
            .collect();
        let bias = (0..outputs).map(|_| rng.gen_range(-bound..=bound)).collect();
        Self {
            inputs,
            weights,
            bias,
        }
    }

    fn forward(&self, x: &[f32]) -> Vec<f32> {
        debug_assert_eq!(x.len(), self.inputs);
        self.weights
            .chunks_exact(self.inputs)
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f32>() + b)
            .collect()
    }

    fn forward_tanh(&self, x: &[f32]) -> Vec<f32> {
        self.forward(x).into_iter().map(f32::tanh).collect()
    }

    fn has_shape(&self, inputs: usize, outputs: usize) -> bool {
        self.inputs == inputs && self.bias.len() == outputs && self.weights.len() == inputs * outputs
    }
}

/// Linear representation, prediction and dynamics heads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    settings: ModelSettings,
    dims: usize,
    values_per_dim: usize,
    representation: Dense,
    policy: Dense,
    value: Dense,
    dynamics: Dense,
    reward: Dense,
    /// Only present in value-prefix mode.
    recurrent: Option<Dense>,
}

impl LinearModel {
    pub fn new(settings: ModelSettings, space: &ActionSpace) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(settings.seed);
        let dims = space.dims();
        let values_per_dim = space.values_per_dim();
        let support = 2 * settings.support_width + 1;
        let latent = settings.latent_size;

        let representation = Dense::new(settings.observation_size, latent, &mut rng);
        let policy = Dense::new(latent, dims * values_per_dim, &mut rng);
        let value_outputs = if settings.categorical_value { support } else { 1 };
        let value = Dense::new(latent, value_outputs, &mut rng);
        let dynamics = Dense::new(latent + dims * values_per_dim, latent, &mut rng);
        let (recurrent, reward_inputs) = if settings.value_prefix {
            let recurrent = Dense::new(latent + settings.hidden_size, settings.hidden_size, &mut rng);
            (Some(recurrent), settings.hidden_size)
        } else {
            (None, latent)
        };
        let reward = Dense::new(reward_inputs, support, &mut rng);

        Self {
            settings,
            dims,
            values_per_dim,
            representation,
            policy,
            value,
            dynamics,
            reward,
            recurrent,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Read a model written by [`LinearModel::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| anyhow!("Failed to read model {}: {}", path.display(), e))?;
        let model = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow!("Failed to parse model {}: {}", path.display(), e))?;
        Ok(model)
    }

    /// Write the model as JSON (atomic write-then-rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec(self)?;
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&json)?;
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Whether every layer has the shape needed for `observation_size`
    /// observations and actions from `space`.
    pub fn fits(&self, observation_size: usize, space: &ActionSpace) -> bool {
        let s = &self.settings;
        let (dims, values_per_dim) = (space.dims(), space.values_per_dim());
        let support = 2 * s.support_width + 1;
        let latent = s.latent_size;
        let value_outputs = if s.categorical_value { support } else { 1 };
        let reward_inputs = if s.value_prefix { s.hidden_size } else { latent };

        let recurrent_ok = match (&self.recurrent, s.value_prefix) {
            (Some(r), true) => r.has_shape(latent + s.hidden_size, s.hidden_size),
            (None, false) => true,
            _ => false,
        };

        s.observation_size == observation_size
            && self.dims == dims
            && self.values_per_dim == values_per_dim
            && self.representation.has_shape(observation_size, latent)
            && self.policy.has_shape(latent, dims * values_per_dim)
            && self.value.has_shape(latent, value_outputs)
            && self.dynamics.has_shape(latent + dims * values_per_dim, latent)
            && self.reward.has_shape(reward_inputs, support)
            && recurrent_ok
    }

    fn encode_action(&self, action: &Action) -> Result<Vec<f32>, ModelError> {
        let components = action.components();
        if components.len() != self.dims {
            return Err(ModelError::InvalidInput(format!(
                "expected {} action components, got {}",
                self.dims,
                components.len()
            )));
        }

        let mut one_hot = vec![0.0; self.dims * self.values_per_dim];
        for (dim, &c) in components.iter().enumerate() {
            if c >= self.values_per_dim {
                return Err(ModelError::InvalidInput(format!(
                    "action component {} out of range 0..{}",
                    c, self.values_per_dim
                )));
            }
            one_hot[dim * self.values_per_dim + c] = 1.0;
        }
        Ok(one_hot)
    }
}

impl Model for LinearModel {
    type Latent = Vec<f32>;
    type Hidden = Vec<f32>;

    fn represent(&self, observation: &[f32]) -> Result<Vec<f32>, ModelError> {
        if observation.len() != self.settings.observation_size {
            return Err(ModelError::InvalidInput(format!(
                "expected observation of size {}, got {}",
                self.settings.observation_size,
                observation.len()
            )));
        }
        Ok(self.representation.forward_tanh(observation))
    }

    fn predict(&self, latent: &Vec<f32>) -> Result<Prediction, ModelError> {
        let policy_logits = self
            .policy
            .forward(latent)
            .chunks(self.values_per_dim.max(1))
            .map(<[f32]>::to_vec)
            .collect();

        let value = if self.settings.categorical_value {
            ValueOutput::Categorical(self.value.forward(latent))
        } else {
            ValueOutput::Scalar(self.value.forward(latent)[0])
        };

        Ok(Prediction {
            policy_logits,
            value,
        })
    }

    fn dynamics(
        &self,
        latent: &Vec<f32>,
        action: &Action,
        hidden: Option<&Vec<f32>>,
    ) -> Result<Dynamics<Vec<f32>, Vec<f32>>, ModelError> {
        let mut input = latent.clone();
        input.extend(self.encode_action(action)?);
        let next = self.dynamics.forward_tanh(&input);

        match &self.recurrent {
            Some(recurrent) => {
                let carry = hidden
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.settings.hidden_size]);
                if carry.len() != self.settings.hidden_size {
                    return Err(ModelError::InvalidInput(format!(
                        "expected recurrent state of size {}, got {}",
                        self.settings.hidden_size,
                        carry.len()
                    )));
                }
                let mut rec_input = next.clone();
                rec_input.extend(carry);
                let carry = recurrent.forward_tanh(&rec_input);
                Ok(Dynamics {
                    reward_logits: self.reward.forward(&carry),
                    latent: next,
                    hidden: Some(carry),
                })
            }
            None => Ok(Dynamics {
                reward_logits: self.reward.forward(&next),
                latent: next,
                hidden: None,
            }),
        }
    }

    fn initial_hidden(&self) -> Option<Vec<f32>> {
        self.settings
            .value_prefix
            .then(|| vec![0.0; self.settings.hidden_size])
    }
}
