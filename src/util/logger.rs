use backtrace::Backtrace;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;

use super::permit_alloc;

/// The environment variable that controls where log output goes.
const LOG_TARGET_ENV_VAR: &str = "PEQ_LOG";

/// Set up the logger so that the `peq_*!()` logging and assertion macros write to a centralized
/// location and panics also get written there. The `PEQ_LOG` environment variable controls where
/// that is:
///
/// - Unset or `stderr`: the log output gets written to STDERR.
/// - A file path: the output gets appended to the end of that file, which will be created if
///   necessary. If the file cannot be opened we fall back to STDERR.
///
/// Calling this more than once is harmless, only the first logger is installed.
pub fn setup_logger() {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };

    // The audio thread and the display thread interleave, so always show where a message came from
    let config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Error)
        .build();

    let mut file_error = None;
    let logger_set = match std::env::var(LOG_TARGET_ENV_VAR) {
        Ok(target) if !target.is_empty() && target != "stderr" => {
            match OpenOptions::new().create(true).append(true).open(&target) {
                Ok(file) => WriteLogger::init(log_level, config, file).is_ok(),
                Err(err) => {
                    file_error = Some((target, err));
                    TermLogger::init(log_level, config, TerminalMode::Stderr, ColorChoice::Auto)
                        .is_ok()
                }
            }
        }
        _ => TermLogger::init(log_level, config, TerminalMode::Stderr, ColorChoice::Auto).is_ok(),
    };

    if logger_set {
        log_panics();

        if let Some((target, err)) = file_error {
            peq_warn!("Could not open '{target}' for logging, logging to STDERR instead: {err}");
        }
    }
}

/// The same as the `log_panics` crate, but wrapped in `permit_alloc()`. Otherwise logging a panic
/// from the audio thread would trip `assert_no_alloc` since formatting the message allocates.
fn log_panics() {
    std::panic::set_hook(Box::new(|info| {
        permit_alloc(|| {
            let backtrace = Backtrace::new();

            let thread = std::thread::current();
            let thread = thread.name().unwrap_or("unnamed");

            let msg = match info.payload().downcast_ref::<&'static str>() {
                Some(s) => *s,
                None => match info.payload().downcast_ref::<String>() {
                    Some(s) => &**s,
                    None => "Box<Any>",
                },
            };

            match info.location() {
                Some(location) => {
                    peq_error!(
                        target: "panic", "thread '{}' panicked at '{}': {}:{}\n{:?}",
                        thread,
                        msg,
                        location.file(),
                        location.line(),
                        backtrace
                    );
                }
                None => {
                    peq_error!(
                        target: "panic",
                        "thread '{}' panicked at '{}'\n{:?}",
                        thread,
                        msg,
                        backtrace
                    )
                }
            }
        })
    }));
}
