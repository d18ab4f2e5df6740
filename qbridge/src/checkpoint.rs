//! Checkpoint externalization of the learner.
//!
//! A checkpoint is one directory per save: the policy and target parameters
//! as safetensors files plus a YAML manifest carrying the step counter, the
//! state dimensionality and the known-action set.
use anyhow::Result;
use log::info;
use qbridge_candle_agent::dqn::DqnLearner;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Manifest stored next to the parameter files.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CheckpointManifest {
    /// Environment step count at save time.
    pub step: usize,

    /// State dimensionality of the saved model.
    pub state_dim: usize,

    /// Distinct action identifiers observed so far.
    pub known_actions: Vec<i64>,
}

/// Saves the learner into `<dir>/step_{step:07}/` and returns that path.
pub fn save(dir: &Path, learner: &DqnLearner, step: usize) -> Result<PathBuf> {
    let path = dir.join(format!("step_{:07}", step));
    fs::create_dir_all(&path)?;
    learner.save(&path)?;

    let manifest = CheckpointManifest {
        step,
        state_dim: learner.state_dim(),
        known_actions: learner.known_actions().iter().copied().collect(),
    };
    let mut file = fs::File::create(path.join("manifest.yaml"))?;
    file.write_all(serde_yaml::to_string(&manifest)?.as_bytes())?;

    info!("checkpoint saved: {:?}", path);
    Ok(path)
}

/// Restores a learner previously saved with [`save`].
///
/// The learner must have been built with the same configuration and state
/// dimensionality as the saved one.
pub fn load(path: &Path, learner: &mut DqnLearner) -> Result<CheckpointManifest> {
    let file = fs::File::open(path.join("manifest.yaml"))?;
    let manifest: CheckpointManifest = serde_yaml::from_reader(BufReader::new(file))?;
    learner.load(path)?;
    learner.restore_known_actions(manifest.known_actions.iter().copied());
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbridge_candle_agent::dqn::DqnConfig;
    use qbridge_core::replay_buffer::Transition;
    use tempdir::TempDir;

    #[test]
    fn save_then_load_restores_predictions() -> Result<()> {
        let config = DqnConfig::default().warmup(1).batch_size(4);
        let mut learner = DqnLearner::build(config.clone(), 2)?;
        for k in 0..3 {
            learner.observe(Transition {
                state: vec![0.1 * k as f32, 0.2],
                action: k,
                reward: 1.0,
                next_state: vec![0.1, 0.1],
                is_terminal: false,
            })?;
        }

        let dir = TempDir::new("qbridge-checkpoint")?;
        let path = save(dir.path(), &learner, 3)?;
        assert!(path.ends_with("step_0000003"));

        let mut restored = DqnLearner::build(config, 2)?;
        let manifest = load(&path, &mut restored)?;
        assert_eq!(manifest.step, 3);
        assert_eq!(manifest.state_dim, 2);
        assert_eq!(restored.known_actions(), learner.known_actions());

        let state = vec![0.3, -0.4];
        let q = learner.predict_q(&state, 1)?;
        let q_restored = restored.predict_q(&state, 1)?;
        assert!((q - q_restored).abs() < 1e-6);
        Ok(())
    }
}
