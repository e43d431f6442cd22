//! # stacker-error
//!
//! Unified error handling for the stacker workspace.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g. ParseFailed, EncodingFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Key-value pairs that locate the cause, such as the raw
//!   model reply that failed to parse
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use stacker_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ParseFailed, "reply does not match the pick/place pattern")
//!         .with_operation("parse::instruction")
//!         .with_context("raw", "move the red block"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, stacker_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent layers only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the stacker Error
pub type Result<T> = std::result::Result<T, Error>;
