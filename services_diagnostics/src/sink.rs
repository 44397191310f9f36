//! Destinations for the diagnostic stream

use crate::DiagnosticEvent;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Receives diagnostic events in the order they happen
pub trait DiagnosticSink: Send {
    /// Records one event
    fn record(&mut self, event: &DiagnosticEvent);

    /// Flushes buffered output
    fn flush(&mut self) {}
}

/// Forwards events to the `log` facade
#[derive(Debug, Clone)]
pub struct LogSink {
    target: &'static str,
}

impl LogSink {
    /// Creates a sink logging under `target`
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("pagesim::mmu")
    }
}

impl DiagnosticSink for LogSink {
    fn record(&mut self, event: &DiagnosticEvent) {
        log::log!(target: self.target, event.level(), "{}", event);
    }
}

/// Records events in memory
///
/// Clones share the same buffer, so the runtime can keep one handle while the
/// memory manager thread owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl MemorySink {
    /// Creates an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event recorded so far
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Checks if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&mut self, event: &DiagnosticEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    write_errors: usize,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Creates (or truncates) a trace file at `path`
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wraps an arbitrary writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            write_errors: 0,
        }
    }

    /// Number of events that could not be written
    pub fn write_errors(&self) -> usize {
        self.write_errors
    }

    /// Returns the writer, flushing it first
    pub fn into_inner(mut self) -> W {
        if let Err(e) = self.writer.flush() {
            log::warn!("trace flush failed: {}", e);
        }
        self.writer
    }

    fn write_line(&mut self, event: &DiagnosticEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write + Send> DiagnosticSink for JsonLinesSink<W> {
    fn record(&mut self, event: &DiagnosticEvent) {
        if let Err(e) = self.write_line(event) {
            // Only the first failure is worth a log line.
            if self.write_errors == 0 {
                log::warn!("trace write failed: {}", e);
            }
            self.write_errors += 1;
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("trace flush failed: {}", e);
        }
    }
}

/// Duplicates every event into several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn DiagnosticSink>>,
}

impl FanoutSink {
    /// Creates a fan-out with no destinations
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a destination
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of destinations
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Checks if there are no destinations
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DiagnosticSink for FanoutSink {
    fn record(&mut self, event: &DiagnosticEvent) {
        for sink in &mut self.sinks {
            sink.record(event);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}
