//! Log capture for tests.
//!
//! [`capture_logs`] installs a thread-local subscriber for the duration of a
//! closure, so parallel tests never see each other's events.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing::field::{Field, Visit};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;

/// A captured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Bounded buffer of captured entries; the oldest entry is dropped first.
pub struct LogStorage {
    entries: Vec<LogEntry>,
    max_entries: usize,
}

impl LogStorage {
    #[must_use]
    pub const fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.max_entries {
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

/// Layer that copies every event into a shared [`LogStorage`].
pub struct TestLogLayer {
    storage: Arc<Mutex<LogStorage>>,
}

impl TestLogLayer {
    #[must_use]
    pub const fn new(storage: Arc<Mutex<LogStorage>>) -> Self {
        Self { storage }
    }
}

struct EntryVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut Vec<(String, String)>,
}

impl Visit for EntryVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            *self.message = value;
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for TestLogLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut EntryVisitor {
            message: &mut message,
            fields: &mut fields,
        });

        self.storage.lock().push(LogEntry {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message,
            fields,
        });
    }
}

/// Run `f` with events at or above `level` captured, returning its result
/// alongside the captured entries.
pub fn capture_logs<T>(level: &str, f: impl FnOnce() -> T) -> (T, Vec<LogEntry>) {
    let storage = Arc::new(Mutex::new(LogStorage::new(1000)));
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(TestLogLayer::new(Arc::clone(&storage)));

    let result = tracing::subscriber::with_default(subscriber, f);
    let entries = storage.lock().entries().to_vec();
    (result, entries)
}

/// Render entries for an assertion message.
#[must_use]
pub fn format_logs_for_display(logs: &[LogEntry]) -> String {
    if logs.is_empty() {
        return String::from("No logs captured");
    }
    let mut output = format!("Captured {} log entries:\n", logs.len());
    for entry in logs {
        output.push_str(&format!("[{}] {}: {}\n", entry.level, entry.target, entry.message));
        for (key, value) in &entry.fields {
            output.push_str(&format!("    {key} = {value}\n"));
        }
    }
    output
}

/// Assert that `logs` holds an entry with the given level and message fragment.
#[macro_export]
macro_rules! assert_log_contains {
    ($logs:expr, $level:expr, $message:expr) => {{
        let logs: &[$crate::test_utils::logging::LogEntry] = &$logs;
        let found = logs
            .iter()
            .any(|e| e.level == $level && e.message.contains($message));
        assert!(
            found,
            "Expected log with level {} containing '{}'\n{}",
            $level,
            $message,
            $crate::test_utils::logging::format_logs_for_display(logs)
        );
    }};
}
