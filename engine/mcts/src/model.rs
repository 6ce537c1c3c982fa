//! Model port consumed by the search.
//!
//! The learned model is exposed to the planner only through inference:
//! `represent` maps an observation to a latent state, `predict` gives policy
//! logits and a value for a latent, and `dynamics` advances a latent by one
//! action. Training, optimizers and weight loading live elsewhere.

use thiserror::Error;

use crate::action::Action;
use crate::support::SupportCodec;

/// Errors surfaced by a model implementation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

/// Value head output.
#[derive(Debug, Clone)]
pub enum ValueOutput {
    /// Logits over the categorical support.
    Categorical(Vec<f32>),
    /// A directly regressed scalar.
    Scalar(f32),
}

/// Output of `Model::predict`.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Policy logits, one vector per action dimension.
    pub policy_logits: Vec<Vec<f32>>,
    pub value: ValueOutput,
}

/// Output of `Model::dynamics`.
#[derive(Debug, Clone)]
pub struct Dynamics<L, H> {
    pub latent: L,
    /// Logits over the reward (or value-prefix) support.
    pub reward_logits: Vec<f32>,
    /// Updated recurrent carry, when the model is recurrent.
    pub hidden: Option<H>,
}

/// Inference-only model port.
///
/// Implementations are treated as pure functions of their inputs; they may
/// be called concurrently from several tasks.
pub trait Model: Send + Sync {
    /// Opaque latent state embedding.
    type Latent: Clone + Send;
    /// Recurrent carry threaded through `dynamics` in value-prefix mode.
    type Hidden: Clone + Send;

    fn represent(&self, observation: &[f32]) -> Result<Self::Latent, ModelError>;

    fn predict(&self, latent: &Self::Latent) -> Result<Prediction, ModelError>;

    fn dynamics(
        &self,
        latent: &Self::Latent,
        action: &Action,
        hidden: Option<&Self::Hidden>,
    ) -> Result<Dynamics<Self::Latent, Self::Hidden>, ModelError>;

    /// Recurrent state for the root of a search. `None` for non-recurrent models.
    fn initial_hidden(&self) -> Option<Self::Hidden> {
        None
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Model with uniform policy, constant value and constant reward.
/// Useful for testing the search without a trained network.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    dims: usize,
    values_per_dim: usize,
    value: f32,
    reward: f32,
    codec: SupportCodec,
}

impl ConstantModel {
    pub fn new(dims: usize, values_per_dim: usize, value: f32, reward: f32, codec: SupportCodec) -> Self {
        Self {
            dims,
            values_per_dim,
            value,
            reward,
            codec,
        }
    }

    // Logits whose softmax is exactly the encoded support (ln 0 = -inf).
    fn support_logits(&self, scalar: f32) -> Vec<f32> {
        self.codec
            .encode(scalar)
            .into_iter()
            .map(f32::ln)
            .collect()
    }
}

impl Model for ConstantModel {
    type Latent = u32;
    type Hidden = ();

    fn represent(&self, _observation: &[f32]) -> Result<u32, ModelError> {
        Ok(0)
    }

    fn predict(&self, _latent: &u32) -> Result<Prediction, ModelError> {
        Ok(Prediction {
            policy_logits: vec![vec![0.0; self.values_per_dim]; self.dims],
            value: ValueOutput::Categorical(self.support_logits(self.value)),
        })
    }

    fn dynamics(
        &self,
        latent: &u32,
        _action: &Action,
        _hidden: Option<&()>,
    ) -> Result<Dynamics<u32, ()>, ModelError> {
        Ok(Dynamics {
            latent: latent + 1,
            reward_logits: self.support_logits(self.reward),
            hidden: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_handles_neg_infinity() {
        let probs = softmax(&[f32::NEG_INFINITY, 0.0]);
        assert_eq!(probs[0], 0.0);
        assert!((probs[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_constant_model_outputs_decode() {
        let codec = SupportCodec::with_half_width(10);
        let model = ConstantModel::new(1, 3, 2.0, 1.0, codec);

        let latent = model.represent(&[0.0; 4]).unwrap();
        let pred = model.predict(&latent).unwrap();
        assert_eq!(pred.policy_logits, vec![vec![0.0; 3]]);
        match pred.value {
            ValueOutput::Categorical(logits) => {
                assert!((codec.decode(&softmax(&logits)) - 2.0).abs() < 1e-3);
            }
            ValueOutput::Scalar(_) => panic!("expected categorical value"),
        }

        let step = model.dynamics(&latent, &Action::Discrete(0), None).unwrap();
        assert_eq!(step.latent, 1);
        assert!((codec.decode(&softmax(&step.reward_logits)) - 1.0).abs() < 1e-3);
    }
}
