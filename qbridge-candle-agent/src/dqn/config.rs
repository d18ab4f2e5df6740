//! Configuration of the Double-DQN learner.
use crate::{opt::OptimizerConfig, Device};
use anyhow::Result;
use qbridge_core::replay_buffer::ReplayBufferConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Target-network refresh policy.
///
/// Exactly one policy is active per learner instance; the target copy never
/// receives gradients under either of them.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum TargetSync {
    /// Exponential blend after every training step.
    Soft {
        /// Blend factor.
        tau: f64,
    },

    /// Exact copy every `every` completed training steps.
    Periodic {
        /// Interval in training steps.
        every: usize,
    },
}

impl Default for TargetSync {
    fn default() -> Self {
        Self::Soft { tau: 0.005 }
    }
}

/// Configuration of [`DqnLearner`](super::DqnLearner).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DqnConfig {
    /// Discount factor.
    pub gamma: f64,

    /// Minibatch size of one training step.
    pub batch_size: usize,

    /// Number of stored transitions before training starts.
    pub warmup: usize,

    /// Ceiling of the global gradient norm.
    pub max_grad_norm: f64,

    /// Divisor turning an action identifier into a bounded input feature.
    pub action_scale: f64,

    /// Hidden layer widths of the approximator.
    pub units: Vec<usize>,

    /// Optimizer settings.
    pub opt_config: OptimizerConfig,

    /// Target refresh policy.
    pub target_sync: TargetSync,

    /// Experience store settings.
    pub replay: ReplayBufferConfig,

    /// Device of the networks.
    pub device: Device,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            batch_size: 64,
            warmup: 500,
            max_grad_norm: 5.0,
            action_scale: 100.0,
            units: vec![256, 128],
            opt_config: OptimizerConfig::default(),
            target_sync: TargetSync::default(),
            replay: ReplayBufferConfig::default(),
            device: Device::Cpu,
        }
    }
}

impl DqnConfig {
    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the minibatch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the warmup threshold.
    pub fn warmup(mut self, v: usize) -> Self {
        self.warmup = v;
        self
    }

    /// Sets the gradient norm ceiling.
    pub fn max_grad_norm(mut self, v: f64) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the target refresh policy.
    pub fn target_sync(mut self, v: TargetSync) -> Self {
        self.target_sync = v;
        self
    }

    /// Sets the experience store configuration.
    pub fn replay(mut self, v: ReplayBufferConfig) -> Self {
        self.replay = v;
        self
    }

    /// Constructs [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
