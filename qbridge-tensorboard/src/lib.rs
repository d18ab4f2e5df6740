use qbridge_core::record::{Record, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Each record must carry its own step under the configured step key; the
/// session uses one recorder per step axis (environment steps and episode
/// indices).
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`] stepped by `step_key`.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P, step_key: impl Into<String>) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: step_key.into(),
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// This method handles [`RecordValue::Scalar`] entries; other variants
    /// are discarded. A record without an entry under the step key is
    /// dropped entirely, telemetry being best-effort.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => return,
        };

        for (k, v) in record.iter() {
            if k != &self.step_key {
                match v {
                    RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                    RecordValue::DateTime(_) => {} // discard value
                    RecordValue::String(_) => {}   // discard value
                }
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn writes_scalars_under_step_key() {
        let dir = TempDir::new("qbridge-tb").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path(), "env_step");

        let mut record = Record::from_scalar("env_step", 3.0);
        record.insert("train/reward", RecordValue::Scalar(1.5));
        recorder.write(record);

        // A record without the step key is dropped, not a panic.
        recorder.write(Record::from_scalar("train/reward", 1.0));
        recorder.flush();

        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(written > 0);
    }
}
