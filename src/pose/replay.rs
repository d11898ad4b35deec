//! JSON-lines pose frame source.
//!
//! Each non-empty line is one serialized [`PoseFrame`]. Lines are parsed on a
//! background thread and handed over a bounded channel, so a slow consumer
//! applies back-pressure to the reader instead of growing memory.

use crate::pose::types::PoseFrame;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Frames buffered between the reader thread and the consumer.
pub const CHANNEL_CAPACITY: usize = 256;

/// Where replayed frames come from.
#[derive(Debug, Clone)]
pub enum ReplayInput {
    File(PathBuf),
    Stdin,
}

impl ReplayInput {
    /// `-` selects stdin, anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            ReplayInput::Stdin
        } else {
            ReplayInput::File(PathBuf::from(arg))
        }
    }
}

/// Errors that can occur while replaying frames.
#[derive(Debug)]
pub enum SourceError {
    Io(String),
    AlreadyRunning,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "Source IO error: {e}"),
            SourceError::AlreadyRunning => write!(f, "Source is already running"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Replays serialized pose frames into the engine.
pub struct ReplaySource {
    input: ReplayInput,
    sender: Option<Sender<PoseFrame>>,
    receiver: Receiver<PoseFrame>,
    running: Arc<AtomicBool>,
    skipped_lines: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl ReplaySource {
    /// Create a new replay source. Nothing is read until [`start`](Self::start).
    pub fn new(input: ReplayInput) -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            input,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            skipped_lines: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    /// Start reading frames on a background thread.
    ///
    /// The channel disconnects once the input is exhausted.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) || self.sender.is_none() {
            return Err(SourceError::AlreadyRunning);
        }

        let reader: Box<dyn Read + Send> = match &self.input {
            ReplayInput::File(path) => Box::new(
                std::fs::File::open(path)
                    .map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))?,
            ),
            ReplayInput::Stdin => Box::new(std::io::stdin()),
        };

        // The worker owns the only sender from here on, so the receiver sees a
        // disconnect when the input runs out.
        let Some(sender) = self.sender.take() else {
            return Err(SourceError::AlreadyRunning);
        };
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let skipped = self.skipped_lines.clone();

        let spawned = thread::Builder::new()
            .name("formcheck-replay".to_string())
            .spawn(move || read_frames(BufReader::new(reader), sender, running, skipped));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(SourceError::Io(e.to_string()))
            }
        }
    }

    /// Stop reading. Frames already queued stay available on the receiver.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the reader is still producing frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for pose frames.
    pub fn receiver(&self) -> &Receiver<PoseFrame> {
        &self.receiver
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&self) -> Option<PoseFrame> {
        self.receiver.try_recv().ok()
    }

    /// Number of lines that could not be parsed as a frame.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines.load(Ordering::Relaxed)
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
        // A reader blocked on stdin cannot be interrupted; leave it detached.
        if matches!(self.input, ReplayInput::File(_)) {
            // Unblock a worker waiting on a full channel before joining it.
            while self.receiver.try_recv().is_ok() {}
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
        }
    }
}

fn read_frames<R: BufRead>(
    reader: R,
    sender: Sender<PoseFrame>,
    running: Arc<AtomicBool>,
    skipped: Arc<AtomicU64>,
) {
    for (line_no, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Stopping replay after read error on line {}: {}", line_no + 1, e);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<PoseFrame>(trimmed) {
            Ok(frame) => {
                if sender.send(frame).is_err() {
                    break;
                }
            }
            Err(e) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Skipping malformed frame on line {}: {}", line_no + 1, e);
            }
        }
    }

    running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::types::Joint;
    use std::io::Write;

    fn temp_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("formcheck-replay-{}.jsonl", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_replay_reads_frames_and_skips_garbage() {
        let path = temp_file(
            "{\"timestamp_ms\": 0.0, \"landmarks\": {\"right_elbow\": [0.5, 0.5, 0.0]}, \"visibility\": {\"right_elbow\": 0.9}}\n\
             not json\n\
             \n\
             {\"timestamp_ms\": 33.0}\n",
        );

        let mut source = ReplaySource::new(ReplayInput::File(path.clone()));
        source.start().unwrap();
        assert!(matches!(source.start(), Err(SourceError::AlreadyRunning)));

        let frames: Vec<PoseFrame> = source.receiver().iter().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].confidence(Joint::RightElbow), 0.9);
        assert_eq!(frames[1].timestamp_ms, 33.0);
        assert_eq!(source.skipped_lines(), 1);
        assert!(!source.is_running());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut source = ReplaySource::new(ReplayInput::File(PathBuf::from(
            "/definitely/not/here.jsonl",
        )));
        assert!(matches!(source.start(), Err(SourceError::Io(_))));
        assert!(!source.is_running());
    }

    #[test]
    fn test_input_from_arg() {
        assert!(matches!(ReplayInput::from_arg("-"), ReplayInput::Stdin));
        assert!(matches!(ReplayInput::from_arg("shots.jsonl"), ReplayInput::File(_)));
    }
}
