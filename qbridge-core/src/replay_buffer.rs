//! Fixed-capacity experience store with uniform sampling.
//!
//! The store is a ring of [`Transition`]s: once the capacity is reached, the
//! write cursor wraps around and the oldest entries are overwritten. Sampling
//! draws indices uniformly with replacement from the initialized slots only,
//! so duplicates within one minibatch are expected while the store is still
//! smaller than the requested batch.
mod base;
mod batch;
mod config;

pub use base::{ReplayBuffer, Transition};
pub use batch::TransitionBatch;
pub use config::ReplayBufferConfig;
