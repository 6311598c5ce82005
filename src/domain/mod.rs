pub mod error;
pub mod model;

pub use error::{ConfigError, FetchError, ValidationError};
pub use model::{
    compute_percent, BatchPhase, BatchSnapshot, DownloadJob, JobFailure, MediaFormat,
    ProgressTick, TickStatus,
};
