//! # ap-fields
//!
//! Field resolution for astroprof data sources.
//!
//! - [`CompiledExpr`]: arithmetic expressions over field names, used to
//!   define derived fields.
//! - [`FieldRegistry`]: name → raw column, derived expression or alias.
//! - [`ColumnSource`]: an in-memory [`ap_core::DataSource`] backed by raw
//!   columns and a registry.
//! - [`VectorLayout`]: splits interleaved vector columns into components.
//! - [`presets`]: conditional derived-field sets for specific simulation codes.
//!
//! ## Example
//!
//! ```
//! use ap_core::DataSource;
//! use ap_fields::ColumnSource;
//!
//! let mut src = ColumnSource::new();
//! src.insert("density", vec![1.0, 2.0]).unwrap();
//! src.insert("InternalEnergy", vec![3.0, 4.0]).unwrap();
//! src.add_derived("pressure", "(5.0/3.0 - 1.0) * density * InternalEnergy").unwrap();
//! let p = src.field("pressure").unwrap();
//! assert!((p[1] - 16.0 / 3.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod expr;
pub mod presets;
pub mod registry;
pub mod source;
pub mod vector;

pub use expr::CompiledExpr;
pub use presets::{MovingMeshGas, SpeciesSummary};
pub use registry::{FieldEntry, FieldRegistry, Resolved};
pub use source::{ColumnFile, ColumnSource};
pub use vector::VectorLayout;
