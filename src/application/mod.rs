pub mod batch_runner;
pub mod progress_board;

pub use batch_runner::{BatchHandle, BatchRunner};
pub use progress_board::{BatchEvent, ProgressBoard};
