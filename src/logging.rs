//! Kernel Log Backend
//!
//! Routes the `log` facade to a console sink. The board installs the sink
//! once with [`init`]; before that every log macro is a no-op.
//!
//! Output format: `[LEVEL] message`, one line per record.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Function that writes raw log text to the console.
pub type LogSink = fn(&str);

/// Installed sink, `None` until [`init`] runs.
static SINK: Mutex<Option<LogSink>> = Mutex::new(None);

static LOGGER: KernelLogger = KernelLogger;

struct KernelLogger;

/// Adapter so `write!` can format straight into the sink.
struct SinkWriter(LogSink);

impl Write for SinkWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        (self.0)(s);
        Ok(())
    }
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Holding the lock keeps lines from interleaving.
        let sink = SINK.lock();
        if let Some(sink) = *sink {
            let _ = writeln!(SinkWriter(sink), "[{:>5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install `sink` as the log destination and set the maximum level.
///
/// Calling it again replaces the sink and level.
pub fn init(level: LevelFilter, sink: LogSink) {
    *SINK.lock() = Some(sink);
    // Only the first call registers the logger; later ones just re-point it.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
