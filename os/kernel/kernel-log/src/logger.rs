use core::fmt::{self, Write};
use kernel_sync::SpinLock;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// A `log::Log` that writes every record to a console.
pub struct ConsoleLogger<W> {
    max_level: LevelFilter,
    console: SpinLock<W>,
}

impl<W: Write + Send> ConsoleLogger<W> {
    #[must_use]
    pub const fn new(max_level: LevelFilter, console: W) -> Self {
        Self {
            max_level,
            console: SpinLock::new(console),
        }
    }

    /// Install as the global logger. Call once during early init.
    ///
    /// # Errors
    /// If a logger was installed before.
    pub fn init(&'static self) -> Result<(), SetLoggerError>
    where
        W: 'static,
    {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    /// Run `f` on the console, e.g. to read back a buffer.
    pub fn with_console<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        self.console.with_lock(f)
    }

    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }
}

impl<W: Write + Send> Log for ConsoleLogger<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !cfg!(feature = "enabled") || !self.enabled(record.metadata()) {
            return;
        }

        // A console that cannot keep up drops the record.
        let _ = self.console.with_lock(|console| {
            writeln!(
                console,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        });
    }

    fn flush(&self) {}
}

impl<W> fmt::Debug for ConsoleLogger<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleLogger")
            .field("max_level", &self.max_level)
            .finish_non_exhaustive()
    }
}
