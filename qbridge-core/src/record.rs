//! Types and traits for recording scalar observations.
//!
//! The learning session exposes its scalar observations (rewards, losses, Q
//! estimates, exploration rates, buffer occupancy, per-episode aggregates) as
//! [`Record`]s. A telemetry backend implements [`Recorder`] to consume them;
//! the session never depends on the backend succeeding.
//!
//! * [`Record`] - A container for key-value pairs
//! * [`RecordValue`] - The kinds of values a record can hold
//! * [`Recorder`] - The interface telemetry backends implement
//! * [`BufferedRecorder`] - Keeps records in memory, used in tests
//! * [`NullRecorder`] - Discards all records
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
