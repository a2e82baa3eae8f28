//! # `calcserve`
//!
//! An in-process compute server. Any number of producer threads submit
//! numeric tasks; a single dedicated worker thread executes them in
//! submission order; each producer blocks until its own result is ready.
//!
//! ## Example
//!
//! ```rust
//! use calcserve::{ComputeServer, Task};
//!
//! let server = ComputeServer::new();
//! server.start().unwrap();
//!
//! let id = server.submit(Task::power(2.0, 10)).unwrap();
//! assert_eq!(server.await_result(id).unwrap(), 1024.0);
//!
//! server.stop().unwrap();
//! ```
//!
//! A negative square root operand is reported as [`Error::Domain`] rather
//! than as NaN.

pub mod client;
pub mod config;
mod error;
pub mod handler;
pub mod queue;
pub mod results;
pub mod server;
pub mod task;
mod worker;

pub use client::Client;
pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{Error, Result};
pub use handler::{Evaluator, FnHandler, TaskHandler};
pub use server::ComputeServer;
pub use task::{Task, TaskId, TaskKind};
