//! # ap-core
//!
//! Core types and traits for astroprof.
//!
//! This crate defines the error taxonomy shared by every other crate, the
//! [`DataSource`] contract that the profile engine reads from, and the
//! [`FieldInfo`] metadata attached to raw and derived fields.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::DataSource;
pub use types::FieldInfo;

/// Version of astroprof
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
