/// Macro for stage-prefixed status logging.
///
/// Usage:
/// ```ignore
/// log_status!("deploy", "Running {}", command);
/// log_status!("functions", "Subscription {} created", id);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        ::tracing::info!(target: $prefix, "{}", format_args!($($arg)*))
    };
}

pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `deploywire::pipeline` instead of `deploywire::core::pipeline`
pub use core::*;
pub use utils::*;
