//! # lifesim-error
//!
//! Unified error handling for lifesim.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g., CollaboratorFailed, ParseFailed)
//! - **ErrorStatus**: Know whether trying again could help (Permanent, Temporary)
//! - **Error Context**: Locate the cause with key-value context (step, trajectory, model)
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use lifesim_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ParseFailed, "no balanced delimiter found")
//!         .with_operation("parser::parse_actions")
//!         .with_context("step", "3")
//!         .with_context("trajectory", "program"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, lifesim_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, outer layers only append operation and context
//! - The simulation core never retries; status is informational for callers

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using lifesim Error
pub type Result<T> = std::result::Result<T, Error>;
