//! Bridges the `log` facade to the single opaque log sink the host provides.
//!
//! Before a host sink is attached (early init, or in tests) records are
//! buffered rather than dropped, and flushed in order once a sink arrives.

use log::{Level, Log, Metadata, Record};
use std::sync::Mutex;

pub trait HostLogSink: Send {
    fn log_line(&mut self, level: Level, line: &str);
}

struct EprintlnSink;

impl HostLogSink for EprintlnSink {
    fn log_line(&mut self, level: Level, line: &str) {
        eprintln!("[{level}] {line}");
    }
}

struct SafeInner {
    sink: Option<Box<dyn HostLogSink>>,
    buffered: Vec<(Level, String)>,
}

static SAFE_BRIDGE: Mutex<Option<SafeInner>> = Mutex::new(None);

struct LogBridge;

impl Log for LogBridge {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = format!("{}", record.args());
        let mut guard = SAFE_BRIDGE.lock().unwrap();
        let inner = guard.get_or_insert_with(|| SafeInner {
            sink: None,
            buffered: Vec::new(),
        });
        match inner.sink.as_mut() {
            Some(sink) => sink.log_line(record.level(), &line),
            None => inner.buffered.push((record.level(), line)),
        }
    }

    fn flush(&self) {}
}

static LOGGER: LogBridge = LogBridge;

/// Install the `log` facade globally. Safe to call more than once; only the
/// first call takes effect.
pub fn init() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);
}

/// Attach the host-provided sink, flushing anything buffered before it existed.
pub fn attach(sink: Box<dyn HostLogSink>) {
    let mut guard = SAFE_BRIDGE.lock().unwrap();
    let inner = guard.get_or_insert_with(|| SafeInner {
        sink: None,
        buffered: Vec::new(),
    });
    let mut sink = sink;
    for (level, line) in inner.buffered.drain(..) {
        sink.log_line(level, &line);
    }
    inner.sink = Some(sink);
}

/// Default sink used until the host negotiates a real one.
pub fn fallback_sink() -> Box<dyn HostLogSink> {
    Box::new(EprintlnSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    struct CaptureSink(Arc<StdMutex<Vec<String>>>);

    impl HostLogSink for CaptureSink {
        fn log_line(&mut self, _level: Level, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[test]
    fn buffers_before_attach_and_flushes_in_order() {
        // Reset global state for a deterministic test.
        *SAFE_BRIDGE.lock().unwrap() = None;
        LogBridge.log(
            &Record::builder()
                .args(format_args!("first"))
                .level(Level::Info)
                .build(),
        );
        LogBridge.log(
            &Record::builder()
                .args(format_args!("second"))
                .level(Level::Info)
                .build(),
        );
        let captured = Arc::new(StdMutex::new(Vec::new()));
        attach(Box::new(CaptureSink(captured.clone())));
        let lines = captured.lock().unwrap().clone();
        assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
    }
}
