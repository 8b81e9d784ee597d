//! Admission control for fan-out work.
//!
//! This crate provides the two concurrency primitives the provider layer
//! builds on:
//! - [`ResizableSemaphore`]: a FIFO-fair counting gate whose capacity can be
//!   changed while permits are held
//! - [`TaskRunner`]: bounded execution of many independent actions on top of
//!   that gate, with progress reporting and cancellation

pub mod error;
pub mod gate;
pub mod runner;

pub use error::{GateError, TaskError};
pub use gate::{GatePermit, ResizableSemaphore};
pub use runner::{ProgressFn, TaskRunner};

pub use tokio_util::sync::CancellationToken;
