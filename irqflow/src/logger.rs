// SPDX-License-Identifier: MPL-2.0

//! Logging support.
//!
//! The crate logs through the [`log`] facade. A platform without a logger of
//! its own can install this one, which formats every record and hands it to
//! a sink supplied by the platform, typically a serial console writer.
//!
//! This module guarantees _atomicity_ under concurrency: messages are always
//! passed to the sink in their entirety without being mixed with messages
//! generated concurrently on other cores.
//!
//! IRQs are disabled while a message is passed to the sink. So do not log
//! long messages.

use core::fmt;

use log::{Metadata, Record};
use spin::Once;

use crate::{config::IrqConfig, cpu::CpuId, prelude::*, sync::SpinLock};

/// The function that writes one formatted log line.
pub type LogSink = fn(fmt::Arguments);

static SINK: Once<LogSink> = Once::new();

static LOGGER: Logger = Logger {};

struct Logger {}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = SINK.get() else {
            return;
        };

        // Use a global lock to prevent interleaving of log messages.
        static RECORD_LOCK: SpinLock<()> = SpinLock::new(());
        let _lock = RECORD_LOCK.lock_irq_disabled();

        sink(format_args!(
            "[cpu{}] {:<5}: {}",
            u32::from(CpuId::current_racy()),
            record.level(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Installs the logger with the level given in `config`.
///
/// # Errors
///
/// Returns [`Error::Busy`] if another logger was installed before.
pub fn init(config: &IrqConfig, sink: LogSink) -> Result<()> {
    SINK.call_once(|| sink);
    log::set_logger(&LOGGER).map_err(|_| Error::Busy)?;
    log::set_max_level(config.log_level);
    Ok(())
}
