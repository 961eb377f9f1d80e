//! # Kernel Console Logging
//!
//! Routes records of the `log` facade to a console without allocating.
//!
//! ```text
//! info!/warn!/trace! ─► log facade ─► ConsoleLogger ─► SpinLock<W: fmt::Write>
//!                                                        │
//!                                     serial port, or a LogBuffer in memory
//! ```
//!
//! Every record is written as `[LEVEL] target: message` on a line of its own.
//! The logger lives in a `static` and is installed once with
//! [`ConsoleLogger::init`]:
//!
//! ```
//! use kernel_log::{ConsoleLogger, LogBuffer};
//! use log::LevelFilter;
//!
//! static LOGGER: ConsoleLogger<LogBuffer<256>> =
//!     ConsoleLogger::new(LevelFilter::Info, LogBuffer::new());
//!
//! LOGGER.init().unwrap();
//! log::info!(target: "vm", "ready");
//! LOGGER.with_console(|buf| assert_eq!(buf.as_str(), "[INFO] vm: ready\n"));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod buffer;
mod logger;

pub use buffer::LogBuffer;
pub use logger::ConsoleLogger;
