//! Double-DQN learner.
mod base;
mod config;
pub use base::DqnLearner;
pub use config::{DqnConfig, TargetSync};
