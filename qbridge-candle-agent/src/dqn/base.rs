//! Double-DQN learner over an incrementally discovered action space.
use super::{DqnConfig, TargetSync};
use crate::{mlp::MlpConfig, qnet::QModel, util::track};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::loss::mse;
use log::info;
use qbridge_core::{
    replay_buffer::{ReplayBuffer, Transition, TransitionBatch},
    QbridgeError,
};
use std::{collections::BTreeSet, fs, path::Path};

/// Learns Q(state, action) online from a stream of transitions.
///
/// The learner owns the experience store and the set of action identifiers
/// observed so far. Actions are discovered incrementally: the bootstrapped
/// target of a training step enumerates the set as it stands at that step,
/// so newly seen actions appear in subsequent targets while earlier
/// gradients stay untouched.
pub struct DqnLearner {
    config: DqnConfig,
    state_dim: usize,
    qnet: QModel,
    qnet_tgt: QModel,
    replay: ReplayBuffer,
    known_actions: BTreeSet<i64>,
    n_train_steps: usize,
    sync_counter: usize,
    last_loss: Option<f32>,
    device: Device,
}

impl DqnLearner {
    /// Builds a learner for the given state dimensionality.
    ///
    /// The target network starts as an exact copy of the policy network.
    pub fn build(config: DqnConfig, state_dim: usize) -> Result<Self> {
        let device = config.device.build()?;
        let mlp_config = MlpConfig::new(state_dim + 1, config.units.clone(), 1);
        let qnet = QModel::build(&mlp_config, &config.opt_config, device.clone())?;
        let qnet_tgt = QModel::build(&mlp_config, &config.opt_config, device.clone())?;
        track(qnet_tgt.varmap(), qnet.varmap(), 1.0)?;
        let replay = ReplayBuffer::build(&config.replay);

        info!(
            "DqnLearner initialized: state_dim={}, device={:?}",
            state_dim, device
        );

        Ok(Self {
            config,
            state_dim,
            qnet,
            qnet_tgt,
            replay,
            known_actions: BTreeSet::new(),
            n_train_steps: 0,
            sync_counter: 0,
            last_loss: None,
            device,
        })
    }

    /// State dimensionality fixed at construction.
    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Number of transitions in the experience store.
    pub fn buffer_len(&self) -> usize {
        self.replay.len()
    }

    /// Number of completed training steps.
    pub fn n_train_steps(&self) -> usize {
        self.n_train_steps
    }

    /// Loss of the most recent training step.
    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }

    /// Distinct action identifiers observed so far, in sorted order.
    pub fn known_actions(&self) -> &BTreeSet<i64> {
        &self.known_actions
    }

    /// Re-registers action identifiers restored from a checkpoint.
    pub fn restore_known_actions(&mut self, actions: impl IntoIterator<Item = i64>) {
        self.known_actions.extend(actions);
    }

    /// Stores a transition and runs one training step once warm.
    ///
    /// Returns `Ok(None)` while the store is below the warmup threshold;
    /// this is the expected idle signal, not an error.
    pub fn observe(&mut self, tr: Transition) -> Result<Option<f32>> {
        if tr.state.len() != self.state_dim {
            return Err(QbridgeError::DimensionMismatch {
                expected: self.state_dim,
                got: tr.state.len(),
            }
            .into());
        }
        if tr.next_state.len() != self.state_dim {
            return Err(QbridgeError::DimensionMismatch {
                expected: self.state_dim,
                got: tr.next_state.len(),
            }
            .into());
        }

        self.known_actions.insert(tr.action);
        self.replay.push(tr);

        if self.replay.len() < self.config.warmup {
            return Ok(None);
        }
        Ok(Some(self.train_step()?))
    }

    /// Action value of one (state, action) pair under the policy network.
    ///
    /// Pure read; the result is detached from the autodiff graph.
    pub fn predict_q(&self, state: &[f32], action: i64) -> Result<f32> {
        if state.len() != self.state_dim {
            return Err(QbridgeError::DimensionMismatch {
                expected: self.state_dim,
                got: state.len(),
            }
            .into());
        }
        let states = Tensor::from_slice(state, (1, self.state_dim), &self.device)?;
        let actions = self.action_feature(&[action])?;
        let q = self.qnet.forward(&states, &actions)?.detach();

        Ok(q.squeeze(D::Minus1)?.squeeze(0)?.to_scalar::<f32>()?)
    }

    /// Externalizes the policy and target parameters into `dir`.
    pub fn save<T: AsRef<Path>>(&self, dir: T) -> Result<()> {
        fs::create_dir_all(&dir)?;
        self.qnet.save(dir.as_ref().join("qnet.safetensors"))?;
        self.qnet_tgt
            .save(dir.as_ref().join("qnet_tgt.safetensors"))?;
        Ok(())
    }

    /// Restores parameters saved with [`save`](Self::save).
    pub fn load<T: AsRef<Path>>(&mut self, dir: T) -> Result<()> {
        self.qnet.load(dir.as_ref().join("qnet.safetensors"))?;
        self.qnet_tgt
            .load(dir.as_ref().join("qnet_tgt.safetensors"))?;
        Ok(())
    }

    /// Normalized action-feature column, `(len, 1)`.
    fn action_feature(&self, actions: &[i64]) -> Result<Tensor> {
        let scale = self.config.action_scale as f32;
        let scaled = actions.iter().map(|a| *a as f32 / scale).collect::<Vec<_>>();

        Ok(Tensor::from_slice(&scaled[..], (scaled.len(), 1), &self.device)?)
    }

    fn train_step(&mut self) -> Result<f32> {
        let batch = self.replay.sample(self.config.batch_size)?;
        let tgt = self.compute_targets(&batch)?;

        let b = batch.len();
        let states = Tensor::from_slice(&batch.states[..], (b, self.state_dim), &self.device)?;
        let actions = self.action_feature(&batch.actions)?;
        let pred = self.qnet.forward(&states, &actions)?.squeeze(D::Minus1)?;

        let loss = mse(&pred, &tgt)?;
        self.qnet
            .backward_step(&loss, self.config.max_grad_norm)?;

        self.n_train_steps += 1;
        self.refresh_target()?;

        let loss = loss.to_scalar::<f32>()?;
        self.last_loss = Some(loss);

        Ok(loss)
    }

    /// Training label `r + gamma * (1 - done) * max_next_q` per batch row.
    fn compute_targets(&self, batch: &TransitionBatch) -> Result<Tensor> {
        let b = batch.len();
        let rewards = Tensor::from_slice(&batch.rewards[..], (b,), &self.device)?;
        let not_done = {
            let not_done = batch
                .is_terminal
                .iter()
                .map(|v| (1 - v) as f32)
                .collect::<Vec<_>>();
            Tensor::from_slice(&not_done[..], (b,), &self.device)?
        };
        let next_states =
            Tensor::from_slice(&batch.next_states[..], (b, self.state_dim), &self.device)?;

        let max_next_q = self.bootstrapped_next_values(&next_states)?;
        let bootstrap = ((not_done * self.config.gamma)? * &max_next_q)?;

        Ok((rewards + bootstrap)?.detach())
    }

    /// Bootstrapped value of each next state.
    ///
    /// Action selection uses the policy network, evaluation the target
    /// network, over the sorted known-action set as a batched B x A cross
    /// product. With no actions observed yet the bootstrap is zero.
    fn bootstrapped_next_values(&self, next_states: &Tensor) -> Result<Tensor> {
        let b = next_states.dims()[0];
        if self.known_actions.is_empty() {
            return Ok(Tensor::zeros((b,), DType::F32, &self.device)?);
        }

        let actions = self.known_actions.iter().copied().collect::<Vec<_>>();
        let a = actions.len();
        let scale = self.config.action_scale as f32;

        // (B, D) -> (B*A, D)
        let states_rep = next_states
            .unsqueeze(1)?
            .repeat((1, a, 1))?
            .reshape((b * a, self.state_dim))?;
        // (A,) -> (B*A, 1)
        let actions_rep = {
            let scaled = actions.iter().map(|x| *x as f32 / scale).collect::<Vec<_>>();
            Tensor::from_slice(&scaled[..], (1, a), &self.device)?
                .repeat((b, 1))?
                .reshape((b * a, 1))?
        };

        let q_policy = self
            .qnet
            .forward(&states_rep, &actions_rep)?
            .reshape((b, a))?;
        let best = q_policy.argmax(D::Minus1)?.unsqueeze(D::Minus1)?;
        let q_target = self
            .qnet_tgt
            .forward(&states_rep, &actions_rep)?
            .reshape((b, a))?;

        Ok(q_target
            .gather(&best, D::Minus1)?
            .squeeze(D::Minus1)?
            .detach())
    }

    fn refresh_target(&mut self) -> Result<()> {
        match self.config.target_sync {
            TargetSync::Soft { tau } => track(self.qnet_tgt.varmap(), self.qnet.varmap(), tau),
            TargetSync::Periodic { every } => {
                self.sync_counter += 1;
                if self.sync_counter >= every {
                    self.sync_counter = 0;
                    track(self.qnet_tgt.varmap(), self.qnet.varmap(), 1.0)?;
                }
                Ok(())
            }
        }
    }
}
