//! SPDX-License-Identifier: GPL-3.0-or-later

//! Structured telemetry, adapted from the teacher's crossbeam-backed
//! writer thread: events are batched off the hot path and flushed to a
//! JSON-lines sink periodically rather than on every call.

use crossbeam_channel::{bounded, Sender};
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};

const BATCH_MAX: usize = 256;
const FLUSH_EVERY: Duration = Duration::from_millis(500);

/// One telemetry event (spec §7 "log lines at INFO for pattern matches
/// and at WARN for retries", §4.1 "size() gauge exported for lag
/// measurement").
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum TelemetryEvent {
    PatternMatched { pattern_id: String, ts: f64 },
    PatternPartialMatch { pattern_id: String, ts: f64 },
    QueueDepth { queue: String, depth: usize },
    SkipAheadSpeedup { state: String, skipped: u64, total: u64 },
    FrameDropped { reason: String, ts: f64 },
}

enum Job {
    Event(TelemetryEvent),
    Flush,
    Stop,
}

/// Owns the background writer thread. Dropping it flushes and joins.
pub struct TelemetryRun {
    tx: Sender<Job>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TelemetryRun {
    pub fn start<W: Write + Send + 'static>(mut sink: W) -> Self {
        let (tx, rx) = bounded::<Job>(4096);
        let handle = std::thread::spawn(move || {
            let mut batch = Vec::with_capacity(BATCH_MAX);
            let mut last_flush = Instant::now();
            loop {
                let timeout = FLUSH_EVERY.saturating_sub(last_flush.elapsed());
                match rx.recv_timeout(timeout) {
                    Ok(Job::Event(ev)) => {
                        batch.push(ev);
                        if batch.len() >= BATCH_MAX {
                            flush(&mut sink, &mut batch);
                            last_flush = Instant::now();
                        }
                    }
                    Ok(Job::Flush) => {
                        flush(&mut sink, &mut batch);
                        last_flush = Instant::now();
                    }
                    Ok(Job::Stop) => {
                        flush(&mut sink, &mut batch);
                        break;
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        flush(&mut sink, &mut batch);
                        last_flush = Instant::now();
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            flush(&mut sink, &mut batch);
        });

        Self {
            tx,
            handle: Some(handle),
        }
    }

    pub fn write(&self, event: TelemetryEvent) {
        let _ = self.tx.send(Job::Event(event));
    }

    pub fn flush(&self) {
        let _ = self.tx.send(Job::Flush);
    }
}

fn flush<W: Write>(sink: &mut W, batch: &mut Vec<TelemetryEvent>) {
    for ev in batch.drain(..) {
        if let Ok(line) = serde_json::to_string(&ev) {
            let _ = writeln!(sink, "{line}");
        }
    }
    let _ = sink.flush();
}

impl Drop for TelemetryRun {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_flushed_to_sink_on_drop() {
        let buf = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let writer = VecSink(buf.clone());
        {
            let run = TelemetryRun::start(writer);
            run.write(TelemetryEvent::PatternMatched {
                pattern_id: "p1".into(),
                ts: 1.0,
            });
        }
        let contents = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(contents.contains("PatternMatched"));
        assert!(contents.contains("p1"));
    }

    #[test]
    fn explicit_flush_drains_batch_without_waiting_for_interval() {
        let buf = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let run = TelemetryRun::start(VecSink(buf.clone()));
        run.write(TelemetryEvent::QueueDepth {
            queue: "broker".into(),
            depth: 4,
        });
        run.flush();
        std::thread::sleep(Duration::from_millis(50));
        let contents = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(contents.contains("QueueDepth"));
    }

    struct VecSink(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
    impl Write for VecSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
