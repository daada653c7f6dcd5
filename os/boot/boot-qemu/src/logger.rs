use crate::port::DebugPort;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// A [`Log`] writing one line per record to a [`DebugPort`].
#[derive(Debug)]
pub struct DebugconLogger {
    port: DebugPort,
}

static LOGGER: DebugconLogger = DebugconLogger::new(DebugPort::QEMU);

impl DebugconLogger {
    #[must_use]
    pub const fn new(port: DebugPort) -> Self {
        Self { port }
    }
}

/// Install the debug console logger. Call once, early.
///
/// # Errors
/// If a logger was already installed.
pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}

/// Format `record` as `"[LEVEL] target: message\n"`.
///
/// # Errors
/// Whatever `out` reports.
pub fn write_record<W>(out: &mut W, record: &Record<'_>) -> fmt::Result
where
    W: fmt::Write + ?Sized,
{
    writeln!(
        out,
        "[{}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for DebugconLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut port = self.port;
        let _ = write_record(&mut port, record);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn records_are_single_lines() {
        let mut out = String::new();
        write_record(
            &mut out,
            &Record::builder()
                .args(format_args!("loaded {} segments", 2))
                .level(Level::Info)
                .target("boot_elf")
                .build(),
        )
        .unwrap();
        assert_eq!(out, "[INFO] boot_elf: loaded 2 segments\n");
    }
}
