//! Configuration of the server session.
use anyhow::Result;
use qbridge_candle_agent::dqn::DqnConfig;
use qbridge_core::exploration::EpsilonSchedule;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Where the exploration probability of an action query comes from.
///
/// One configuration axis, not two code paths: the deployed protocol exists
/// in a variant where the peer supplies epsilon and one where the server
/// derives it from the episode schedule.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum EpsilonSource {
    /// Computed from the episode-indexed schedule. A caller-supplied value
    /// is echoed to telemetry but never used for selection.
    Schedule(EpsilonSchedule),

    /// The caller's `epsilon` field is trusted verbatim.
    External {
        /// Value used when the field is absent.
        default: f64,
    },
}

impl Default for EpsilonSource {
    fn default() -> Self {
        Self::Schedule(EpsilonSchedule::default())
    }
}

/// Configuration of a [`Session`](crate::session::Session).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SessionConfig {
    /// Transitions per pseudo-episode.
    pub horizon: usize,

    /// Exploration source for action queries.
    pub epsilon: EpsilonSource,

    /// Learner settings.
    pub agent: DqnConfig,

    /// Environment steps between checkpoints; 0 disables checkpointing.
    pub checkpoint_interval: usize,

    /// Checkpoint directory.
    pub checkpoint_dir: PathBuf,

    /// Seed of the action-selection RNG.
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            horizon: 30,
            epsilon: EpsilonSource::default(),
            agent: DqnConfig::default(),
            checkpoint_interval: 500,
            checkpoint_dir: PathBuf::from("./checkpoints"),
            seed: 42,
        }
    }
}

impl SessionConfig {
    /// Sets the pseudo-episode horizon.
    pub fn horizon(mut self, v: usize) -> Self {
        self.horizon = v;
        self
    }

    /// Sets the exploration source.
    pub fn epsilon(mut self, v: EpsilonSource) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the learner configuration.
    pub fn agent(mut self, v: DqnConfig) -> Self {
        self.agent = v;
        self
    }

    /// Sets the checkpoint cadence in environment steps.
    pub fn checkpoint_interval(mut self, v: usize) -> Self {
        self.checkpoint_interval = v;
        self
    }

    /// Sets the checkpoint directory.
    pub fn checkpoint_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = v.into();
        self
    }

    /// Constructs [`SessionConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`SessionConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
