use super::Record;

/// Writes records to an output destination.
pub trait Recorder {
    /// Writes a record to the [`Recorder`].
    fn write(&mut self, record: Record);

    /// Flushes any buffered output to the destination.
    fn flush(&mut self);
}
