//! Fixed-horizon pseudo-episode tracking.
//!
//! The upstream environment never signals termination on its own; the
//! tracker manufactures episode boundaries every `horizon` transitions so
//! the exploration schedule and the per-episode statistics have a stable
//! period.
use crate::record::{Record, RecordValue};

/// Aggregates of one completed pseudo-episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Index of the completed episode, starting at 1.
    pub episode: usize,

    /// Number of transitions in the episode.
    pub length: usize,

    /// Sum of rewards.
    pub ret: f32,

    /// Mean reward per step.
    pub avg_reward: f32,

    /// Mean of the Q estimates reported during the episode.
    pub avg_q: f32,

    /// Mean training loss over the steps that trained.
    pub avg_loss: f32,

    /// Fraction of action choices that were random.
    pub random_rate: f32,
}

impl EpisodeSummary {
    /// Converts the summary into a telemetry record keyed by episode index.
    pub fn to_record(&self) -> Record {
        Record::from_slice(&[
            ("episode", RecordValue::Scalar(self.episode as f32)),
            ("episodic/return", RecordValue::Scalar(self.ret)),
            ("episodic/avg_reward", RecordValue::Scalar(self.avg_reward)),
            ("episodic/length", RecordValue::Scalar(self.length as f32)),
            ("episodic/avg_q_est", RecordValue::Scalar(self.avg_q)),
            ("episodic/avg_loss", RecordValue::Scalar(self.avg_loss)),
            ("episodic/random_rate", RecordValue::Scalar(self.random_rate)),
        ])
    }
}

/// Segments the transition stream into fixed-length pseudo-episodes.
///
/// Each transition advances the step counter and the accumulators; once the
/// horizon is reached the tracker emits an [`EpisodeSummary`], increments the
/// episode counter and resets for the next episode.
pub struct EpisodeTracker {
    horizon: usize,
    episode_idx: usize,
    step: usize,
    ret: f32,
    q_sum: f32,
    q_count: usize,
    loss_sum: f32,
    loss_count: usize,
    random_count: usize,
}

impl EpisodeTracker {
    /// Creates a tracker emitting a summary every `horizon` transitions.
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon: horizon.max(1),
            episode_idx: 1,
            step: 0,
            ret: 0.0,
            q_sum: 0.0,
            q_count: 0,
            loss_sum: 0.0,
            loss_count: 0,
            random_count: 0,
        }
    }

    /// Index of the running episode, starting at 1.
    pub fn episode_idx(&self) -> usize {
        self.episode_idx
    }

    /// Step position inside the running episode.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of transitions per pseudo-episode.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Returns `true` when the next transition will close the episode.
    pub fn next_step_closes(&self) -> bool {
        self.step + 1 >= self.horizon
    }

    /// Counts one random action choice towards the running episode.
    pub fn record_random(&mut self) {
        self.random_count += 1;
    }

    /// Advances the tracker by one transition.
    ///
    /// `loss` is absent for steps that did not train (warmup). Returns the
    /// aggregated summary when the horizon is reached.
    pub fn advance(&mut self, reward: f32, q_est: f32, loss: Option<f32>) -> Option<EpisodeSummary> {
        self.step += 1;
        self.ret += reward;
        self.q_sum += q_est;
        self.q_count += 1;
        if let Some(loss) = loss {
            self.loss_sum += loss;
            self.loss_count += 1;
        }
        if self.step < self.horizon {
            return None;
        }

        let summary = EpisodeSummary {
            episode: self.episode_idx,
            length: self.step,
            ret: self.ret,
            avg_reward: self.ret / self.step.max(1) as f32,
            avg_q: self.q_sum / self.q_count.max(1) as f32,
            avg_loss: if self.loss_count > 0 {
                self.loss_sum / self.loss_count as f32
            } else {
                0.0
            },
            random_rate: self.random_count as f32 / self.horizon as f32,
        };

        self.episode_idx += 1;
        self.step = 0;
        self.ret = 0.0;
        self.q_sum = 0.0;
        self.q_count = 0;
        self.loss_sum = 0.0;
        self.loss_count = 0;
        self.random_count = 0;

        Some(summary)
    }
}
