// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Logging set-up, and the capture of warnings raised while a stage runs so
//! that they can be attached to the stage's results.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use chrono::{DateTime, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    /// Running captures, by ID.
    static ref CAPTURES: Mutex<Vec<(u64, Vec<LogRecord>)>> = Mutex::new(vec![]);
}

static NEXT_CAPTURE_ID: AtomicU64 = AtomicU64::new(0);

/// A captured log message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: String,
    pub target: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    fn from_record(record: &Record) -> LogRecord {
        LogRecord {
            level: record.level().to_string(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// `env_logger`, plus copying WARN and above into any running capture.
struct CapturingLogger {
    inner: env_logger::Logger,
}

impl Log for CapturingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn || self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if record.level() <= Level::Warn {
            if let Ok(mut captures) = CAPTURES.lock() {
                if !captures.is_empty() {
                    let captured = LogRecord::from_record(record);
                    for (_, records) in captures.iter_mut() {
                        records.push(captured.clone());
                    }
                }
            }
        }
        if self.inner.matches(record) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
pub fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(LevelFilter::Info),
        1 => builder.filter_level(LevelFilter::Debug),
        2 => builder.filter_level(LevelFilter::Trace),
        _ => {
            builder.filter_level(LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };

    let inner = builder.build();
    let max_level = inner.filter().max(LevelFilter::Warn);
    log::set_boxed_logger(Box::new(CapturingLogger { inner }))?;
    log::set_max_level(max_level);

    Ok(())
}

/// Collects WARN and above log records until finished (or dropped). Every
/// running capture sees every record.
pub struct LogCapture {
    id: u64,
}

impl LogCapture {
    pub fn start() -> LogCapture {
        let id = NEXT_CAPTURE_ID.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut captures) = CAPTURES.lock() {
            captures.push((id, vec![]));
        }
        LogCapture { id }
    }

    pub fn finish(self) -> Vec<LogRecord> {
        self.take().unwrap_or_default()
    }

    fn take(&self) -> Option<Vec<LogRecord>> {
        let mut captures = CAPTURES.lock().ok()?;
        let i = captures.iter().position(|(id, _)| *id == self.id)?;
        Some(captures.remove(i).1)
    }
}

impl Drop for LogCapture {
    fn drop(&mut self) {
        self.take();
    }
}
