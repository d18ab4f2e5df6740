//! Single-connection message loop of the decision service.
use crate::{
    checkpoint,
    config::{EpsilonSource, SessionConfig},
    protocol::{self, ActionRequest, Inbound, Outbound, TransitionMsg},
};
use anyhow::Result;
use log::{info, warn};
use qbridge_candle_agent::dqn::DqnLearner;
use qbridge_core::{
    episode::EpisodeTracker,
    record::{Record, RecordValue, Recorder},
    replay_buffer::Transition,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
    io::{BufRead, BufReader, Write},
    net::TcpStream,
};

/// Learner lifecycle.
///
/// The state dimensionality is fixed by the first message carrying a state
/// vector; until then every learner-dependent operation is rejected.
enum LearnerState {
    Uninitialized,
    Ready(DqnLearner),
}

/// Owns all per-connection state and processes messages strictly in order.
///
/// One inbound line is fully handled, including the synchronous training
/// step it may trigger, before the next line is read. Every failure mode
/// below the transport is handled as skip-and-continue so a long-running
/// learning session survives bad input.
pub struct Session {
    config: SessionConfig,
    learner: LearnerState,
    tracker: EpisodeTracker,
    step_count: usize,
    rng: SmallRng,
    step_recorder: Box<dyn Recorder>,
    episode_recorder: Box<dyn Recorder>,
    last_epsilon_external: Option<f64>,
    last_epsilon_used: Option<f64>,
}

impl Session {
    /// Creates a session.
    ///
    /// `step_recorder` receives records keyed by `env_step`,
    /// `episode_recorder` records keyed by `episode`.
    pub fn new(
        config: SessionConfig,
        step_recorder: Box<dyn Recorder>,
        episode_recorder: Box<dyn Recorder>,
    ) -> Self {
        let tracker = EpisodeTracker::new(config.horizon);
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            config,
            learner: LearnerState::Uninitialized,
            tracker,
            step_count: 0,
            rng,
            step_recorder,
            episode_recorder,
            last_epsilon_external: None,
            last_epsilon_used: None,
        }
    }

    /// Reads lines off the stream until EOF, handling each fully before the
    /// next read.
    pub fn run(&mut self, stream: TcpStream) -> Result<()> {
        let peer = stream.peer_addr()?;
        info!("connected: {}", peer);

        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                info!("connection closed by peer");
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            self.handle_line(&line, &mut writer);
        }

        self.step_recorder.flush();
        self.episode_recorder.flush();
        Ok(())
    }

    fn handle_line(&mut self, line: &str, writer: &mut impl Write) {
        match protocol::parse_line(line) {
            Ok(Inbound::ActionRequest(req)) => self.handle_action_request(req, writer),
            Ok(Inbound::Transition(msg)) => self.handle_transition(msg, writer),
            Ok(Inbound::Unknown(msg_type)) => warn!("unknown message type: {:?}", msg_type),
            Err(e) => warn!("dropped malformed line: {}", e),
        }
    }

    /// Builds the learner on first contact with a state vector.
    fn ensure_learner(&mut self, state_dim: usize) -> Result<&mut DqnLearner> {
        if matches!(self.learner, LearnerState::Uninitialized) {
            let learner = DqnLearner::build(self.config.agent.clone(), state_dim)?;
            info!("first state received, state_dim={}", state_dim);
            self.learner = LearnerState::Ready(learner);
        }
        match &mut self.learner {
            LearnerState::Ready(learner) => Ok(learner),
            LearnerState::Uninitialized => Err(anyhow::anyhow!("learner not initialized")),
        }
    }

    fn ready_learner(&mut self) -> Option<&mut DqnLearner> {
        match &mut self.learner {
            LearnerState::Ready(learner) => Some(learner),
            LearnerState::Uninitialized => None,
        }
    }

    fn handle_action_request(&mut self, req: ActionRequest, writer: &mut impl Write) {
        self.last_epsilon_external = req.epsilon;

        if req.state.is_empty() || req.candidate_node_ids.is_empty() {
            warn!("action_request with empty state or candidate set dropped");
            return;
        }

        // Q(s, a) across the candidate set; a failing candidate scores a
        // neutral 0.0 instead of aborting the reply.
        let q_values = {
            let learner = match self.ensure_learner(req.state.len()) {
                Ok(learner) => learner,
                Err(e) => {
                    warn!("learner init failed: {}", e);
                    return;
                }
            };
            if req.state.len() != learner.state_dim() {
                warn!(
                    "action_request rejected: state dimension mismatch (expected {}, got {})",
                    learner.state_dim(),
                    req.state.len()
                );
                return;
            }
            req.candidate_node_ids
                .iter()
                .map(|&node_id| match learner.predict_q(&req.state, node_id) {
                    Ok(q) => q as f64,
                    Err(e) => {
                        warn!("predict_q failed for node_id={}: {}", node_id, e);
                        0.0
                    }
                })
                .collect::<Vec<_>>()
        };

        let epsilon = match &self.config.epsilon {
            EpsilonSource::Schedule(schedule) => schedule.value(self.tracker.episode_idx()),
            EpsilonSource::External { default } => req.epsilon.unwrap_or(*default),
        };
        self.last_epsilon_used = Some(epsilon);

        let (chosen_idx, is_random) = if self.rng.gen::<f64>() < epsilon {
            (self.rng.gen_range(0..req.candidate_node_ids.len()), true)
        } else {
            (argmax(&q_values), false)
        };
        if is_random {
            self.tracker.record_random();
        }
        let chosen_node_id = req.candidate_node_ids[chosen_idx];

        if self.tracker.step() == 0 {
            info!(
                "=== episode {} start === (epsilon={:.3})",
                self.tracker.episode_idx(),
                epsilon
            );
        }

        let reply = Outbound::ActionReply {
            chosen_node_id,
            candidate_node_ids: req.candidate_node_ids,
            q_values,
            epsilon,
            is_random,
        };
        if let Err(e) = protocol::write_line(writer, &reply) {
            warn!("action_reply send failed: {}", e);
        }

        let mut record = Record::from_slice(&[
            ("env_step", RecordValue::Scalar(self.step_count as f32)),
            ("train/epsilon_used", RecordValue::Scalar(epsilon as f32)),
        ]);
        if let Some(eps) = self.last_epsilon_external {
            record.insert("train/epsilon_external", RecordValue::Scalar(eps as f32));
        }
        self.step_recorder.write(record);
    }

    fn handle_transition(&mut self, msg: TransitionMsg, writer: &mut impl Write) {
        if msg.state_t.is_empty() {
            warn!("transition with empty state_t dropped");
            return;
        }

        {
            let learner = match self.ensure_learner(msg.state_t.len()) {
                Ok(learner) => learner,
                Err(e) => {
                    warn!("learner init failed: {}", e);
                    return;
                }
            };
            let expected = learner.state_dim();
            if msg.state_t.len() != expected || msg.state_tp1.len() != expected {
                warn!(
                    "transition rejected: state dimension mismatch (expected {}, got {}/{})",
                    expected,
                    msg.state_t.len(),
                    msg.state_tp1.len()
                );
                return;
            }
        }

        self.step_count += 1;

        // The environment never terminates on its own; the pseudo-episode
        // horizon supplies the terminal flag.
        let done = self.tracker.next_step_closes();

        let (loss, q_est, buffer_len) = {
            let learner = match self.ready_learner() {
                Some(learner) => learner,
                None => return,
            };
            let transition = Transition {
                state: msg.state_t.clone(),
                action: msg.node_id,
                reward: msg.reward,
                next_state: msg.state_tp1.clone(),
                is_terminal: done,
            };
            let loss = match learner.observe(transition) {
                Ok(loss) => loss,
                Err(e) => {
                    warn!("observe failed: {}", e);
                    None
                }
            };
            let q_est = match learner.predict_q(&msg.state_t, msg.node_id) {
                Ok(q) => q,
                Err(e) => {
                    warn!("predict_q failed for node_id={}: {}", msg.node_id, e);
                    msg.reward
                }
            };
            (loss, q_est, learner.buffer_len())
        };

        let reply = Outbound::QUpdate {
            node_ids: vec![msg.node_id],
            q_values: vec![q_est as f64],
        };
        if let Err(e) = protocol::write_line(writer, &reply) {
            warn!("q_update send failed: {}", e);
        }

        info!(
            "step={} | episode={} step={}/{}: action_id={}, node_id={}, reward={:+.3}",
            self.step_count,
            self.tracker.episode_idx(),
            self.tracker.step() + 1,
            self.tracker.horizon(),
            msg.action_id,
            msg.node_id,
            msg.reward
        );

        let mut record = Record::from_slice(&[
            ("env_step", RecordValue::Scalar(self.step_count as f32)),
            ("train/reward", RecordValue::Scalar(msg.reward)),
            ("train/q_est", RecordValue::Scalar(q_est)),
            ("train/loss", RecordValue::Scalar(loss.unwrap_or(0.0))),
            (
                "train/done_flag",
                RecordValue::Scalar(if done { 1.0 } else { 0.0 }),
            ),
            ("buffer/size", RecordValue::Scalar(buffer_len as f32)),
        ]);
        if let Some(eps) = self.last_epsilon_used {
            record.insert("train/epsilon_used", RecordValue::Scalar(eps as f32));
        }
        if let Some(eps) = self.last_epsilon_external {
            record.insert("train/epsilon_external", RecordValue::Scalar(eps as f32));
        }
        self.step_recorder.write(record);

        if let Some(summary) = self.tracker.advance(msg.reward, q_est, loss) {
            info!(
                "=== episode {} done === (len={}, return={:+.3}, avg_reward={:+.3}, avg_q={:+.3}, avg_loss={:.6}, random_rate={:.2})",
                summary.episode,
                summary.length,
                summary.ret,
                summary.avg_reward,
                summary.avg_q,
                summary.avg_loss,
                summary.random_rate
            );
            let mut record = summary.to_record();
            record.insert("buffer/size", RecordValue::Scalar(buffer_len as f32));
            if let Some(eps) = self.last_epsilon_used {
                record.insert("episodic/epsilon_used", RecordValue::Scalar(eps as f32));
            }
            self.episode_recorder.write(record);
        }

        if self.config.checkpoint_interval > 0
            && self.step_count % self.config.checkpoint_interval == 0
        {
            if let LearnerState::Ready(learner) = &self.learner {
                if let Err(e) = checkpoint::save(&self.config.checkpoint_dir, learner, self.step_count)
                {
                    warn!("checkpoint save failed: {}", e);
                }
            }
        }
    }
}

/// Index of the largest value; ties resolve to the first occurrence.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::argmax;

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.0, 2.0, 2.0, 1.0]), 1);
        assert_eq!(argmax(&[-1.0]), 0);
    }
}
