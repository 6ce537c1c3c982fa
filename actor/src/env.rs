//! Environment port and the built-in test environments.
//!
//! The player drives any [`Environment`]: `reset` yields the first
//! observation and `step` applies an action. Only the deterministic counter
//! game ships with the binary; real environments plug in through the trait.

use anyhow::{anyhow, Result};
use mcts::{Action, ActionSpace};

/// Result of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

impl Step {
    /// Whether the episode is over for either reason.
    pub fn is_over(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A single-agent environment.
pub trait Environment: Send {
    /// Start a new episode and return its first observation.
    fn reset(&mut self) -> Vec<f32>;

    fn step(&mut self, action: &Action) -> Result<Step>;

    fn action_space(&self) -> ActionSpace;

    fn observation_size(&self) -> usize;
}

/// Counter passes this value on the terminating step.
const COUNTER_LIMIT: u32 = 50;

/// Deterministic counting game with two actions that do nothing.
///
/// After step `c` the observation is `[c, c % 7, c % 7, c % 7]` and the
/// reward is `(c - 1) % 7`. The episode terminates once the counter passes 50.
#[derive(Debug, Default)]
pub struct CounterEnv {
    counter: u32,
}

impl CounterEnv {
    pub fn new() -> Self {
        Self::default()
    }

    fn observation(&self) -> Vec<f32> {
        let phase = (self.counter % 7) as f32;
        vec![self.counter as f32, phase, phase, phase]
    }
}

impl Environment for CounterEnv {
    fn reset(&mut self) -> Vec<f32> {
        self.counter = 0;
        self.observation()
    }

    fn step(&mut self, action: &Action) -> Result<Step> {
        match action {
            Action::Discrete(a) if *a < 2 => {}
            other => return Err(anyhow!("invalid action for counter env: {:?}", other)),
        }

        self.counter += 1;
        Ok(Step {
            observation: self.observation(),
            reward: ((self.counter - 1) % 7) as f32,
            terminated: self.counter > COUNTER_LIMIT,
            truncated: false,
        })
    }

    fn action_space(&self) -> ActionSpace {
        ActionSpace::discrete(2)
    }

    fn observation_size(&self) -> usize {
        4
    }
}

/// Create an environment by name.
pub fn make_env(name: &str) -> Result<Box<dyn Environment>> {
    match name {
        "counter" => Ok(Box::new(CounterEnv::new())),
        _ => Err(anyhow!("Unknown environment '{}' (available: counter)", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_reset_observation() {
        let mut env = CounterEnv::new();
        assert_eq!(env.reset(), vec![0.0; 4]);
    }

    #[test]
    fn test_counter_step_observation_and_reward() {
        let mut env = CounterEnv::new();
        env.reset();

        let first = env.step(&Action::Discrete(0)).unwrap();
        assert_eq!(first.observation, vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(first.reward, 0.0);

        for _ in 0..7 {
            env.step(&Action::Discrete(1)).unwrap();
        }
        // counter = 8
        let step = env.step(&Action::Discrete(1)).unwrap();
        assert_eq!(step.observation, vec![9.0, 2.0, 2.0, 2.0]);
        assert_eq!(step.reward, 1.0);
    }

    #[test]
    fn test_counter_terminates_after_limit() {
        let mut env = CounterEnv::new();
        env.reset();

        let mut steps = 0;
        loop {
            steps += 1;
            if env.step(&Action::Discrete(0)).unwrap().is_over() {
                break;
            }
        }
        assert_eq!(steps, COUNTER_LIMIT + 1);

        // reset starts a fresh episode
        env.reset();
        assert!(!env.step(&Action::Discrete(0)).unwrap().terminated);
    }

    #[test]
    fn test_counter_rejects_invalid_action() {
        let mut env = CounterEnv::new();
        env.reset();
        assert!(env.step(&Action::Discrete(2)).is_err());
        assert!(env.step(&Action::Composite(vec![0, 1])).is_err());
    }

    #[test]
    fn test_make_env() {
        let env = make_env("counter").unwrap();
        assert_eq!(env.action_space().len(), 2);
        assert_eq!(env.observation_size(), 4);

        let err = make_env("pong").err().unwrap();
        assert!(err.to_string().contains("Unknown environment"));
    }
}
