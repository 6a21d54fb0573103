// Public modules
pub mod automation;
pub mod config;
pub mod defaults;
pub mod deploy;
pub mod env_store;
pub mod error;
pub mod explorer;
pub mod extract;
pub mod functions;
pub mod logging;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod rpc;
pub mod runner;
pub mod transactor;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use output::{PipelineSummary, StageError, StageOutcome, StageStatus};
