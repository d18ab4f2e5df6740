use super::Transition;

/// A sampled minibatch in struct-of-vectors layout.
///
/// State vectors are stored flattened in row-major order, `(len, state_dim)`,
/// ready for tensor construction without further copying.
#[derive(Debug, Clone, Default)]
pub struct TransitionBatch {
    /// Flattened state vectors.
    pub states: Vec<f32>,

    /// Action identifiers.
    pub actions: Vec<i64>,

    /// Rewards.
    pub rewards: Vec<f32>,

    /// Flattened next-state vectors.
    pub next_states: Vec<f32>,

    /// Terminal flags, 1 for terminal, 0 otherwise.
    pub is_terminal: Vec<i8>,

    /// State dimensionality of every row.
    pub state_dim: usize,
}

impl TransitionBatch {
    pub(super) fn from_indices(data: &[Transition], ixs: &[usize]) -> Self {
        let state_dim = ixs.first().map(|&ix| data[ix].state.len()).unwrap_or(0);
        let mut batch = Self {
            states: Vec::with_capacity(ixs.len() * state_dim),
            actions: Vec::with_capacity(ixs.len()),
            rewards: Vec::with_capacity(ixs.len()),
            next_states: Vec::with_capacity(ixs.len() * state_dim),
            is_terminal: Vec::with_capacity(ixs.len()),
            state_dim,
        };
        for &ix in ixs {
            let tr = &data[ix];
            batch.states.extend_from_slice(&tr.state);
            batch.actions.push(tr.action);
            batch.rewards.push(tr.reward);
            batch.next_states.extend_from_slice(&tr.next_state);
            batch.is_terminal.push(tr.is_terminal as i8);
        }
        batch
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` for a batch without rows.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
