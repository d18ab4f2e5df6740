use super::{ReplayBufferConfig, TransitionBatch};
use crate::QbridgeError;
use anyhow::Result;
use rand::{rngs::StdRng, RngCore, SeedableRng};

/// One observed `(state, action, reward, next_state, terminal)` tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State vector at time `t`.
    pub state: Vec<f32>,

    /// Identifier of the action taken at time `t`.
    pub action: i64,

    /// Reward observed after taking the action.
    pub reward: f32,

    /// State vector at time `t + 1`.
    pub next_state: Vec<f32>,

    /// Whether this transition closes a pseudo-episode.
    pub is_terminal: bool,
}

/// Fixed-capacity ring of transitions with uniform sampling.
///
/// `push` always succeeds in O(1) and overwrites the oldest slot once the
/// capacity is reached. `sample` draws with replacement from the first
/// `len()` slots, never from uninitialized ones.
pub struct ReplayBuffer {
    /// Maximum number of transitions that can be stored.
    capacity: usize,

    /// Current insertion index.
    i: usize,

    /// Current number of stored transitions.
    size: usize,

    /// Storage for transitions.
    data: Vec<Transition>,

    /// Random number generator for sampling.
    rng: StdRng,
}

impl ReplayBuffer {
    /// Creates an empty store with the given configuration.
    pub fn build(config: &ReplayBufferConfig) -> Self {
        Self {
            capacity: config.capacity,
            i: 0,
            size: 0,
            data: Vec::with_capacity(config.capacity),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Returns the current number of stored transitions.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` until the first push.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Maximum number of transitions the store can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds a transition, overwriting the oldest slot once full.
    pub fn push(&mut self, tr: Transition) {
        if self.size < self.capacity {
            self.data.push(tr);
        } else {
            self.data[self.i] = tr;
        }
        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
    }

    /// Draws `n` transitions uniformly with replacement.
    ///
    /// Fails with [`QbridgeError::InsufficientData`] while the store is
    /// empty. Duplicates within one batch are expected while `len() < n`.
    pub fn sample(&mut self, n: usize) -> Result<TransitionBatch> {
        if self.size == 0 {
            return Err(QbridgeError::InsufficientData.into());
        }
        let ixs = (0..n)
            .map(|_| (self.rng.next_u32() as usize) % self.size)
            .collect::<Vec<_>>();
        Ok(TransitionBatch::from_indices(&self.data, &ixs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(tag: f32) -> Transition {
        Transition {
            state: vec![tag, tag],
            action: tag as i64,
            reward: tag,
            next_state: vec![tag + 1.0, tag + 1.0],
            is_terminal: false,
        }
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let config = ReplayBufferConfig::default().capacity(4);
        let mut buffer = ReplayBuffer::build(&config);
        for k in 0..6 {
            buffer.push(transition(k as f32));
        }
        assert_eq!(buffer.len(), 4);

        // Slots 0 and 1 were reused for transitions 4 and 5.
        let tags = buffer.data.iter().map(|tr| tr.action).collect::<Vec<_>>();
        assert_eq!(tags, vec![4, 5, 2, 3]);
    }

    #[test]
    fn sample_is_bounded_by_size() {
        let config = ReplayBufferConfig::default().capacity(8);
        let mut buffer = ReplayBuffer::build(&config);
        buffer.push(transition(0.0));
        buffer.push(transition(1.0));

        let batch = buffer.sample(64).unwrap();
        assert_eq!(batch.len(), 64);
        assert_eq!(batch.state_dim, 2);
        for a in batch.actions {
            assert!(a == 0 || a == 1);
        }
    }

    #[test]
    fn sample_on_empty_store_fails() {
        let mut buffer = ReplayBuffer::build(&ReplayBufferConfig::default());
        let err = buffer.sample(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QbridgeError>(),
            Some(QbridgeError::InsufficientData)
        ));
    }
}
