//! Line-protocol server wiring the Double-DQN learner to a simulation peer.
//!
//! One accepted stream connection, UTF-8 JSON objects one per line. The
//! session is strictly sequential: a message is fully handled, including the
//! synchronous training step it may trigger, before the next line is read.
pub mod checkpoint;
pub mod config;
pub mod protocol;
pub mod session;
