//! # ap-profile
//!
//! Profiles: one- and two-dimensional binned aggregates of data-source fields.
//!
//! [`create_profile`] bins every element of a [`ap_core::DataSource`] by one
//! or two fields and, per bin, sums each dependent field or takes its
//! weighted mean. The [`deposit`] module assigns particle quantities to a
//! uniform mesh.
//!
//! ## Example
//!
//! ```
//! use std::collections::HashMap;
//! use ap_profile::{ProfileRequest, create_profile};
//!
//! let mut cols: HashMap<String, Vec<f64>> = HashMap::new();
//! cols.insert("radius".into(), vec![0.1, 0.4, 0.6, 0.9]);
//! cols.insert("mass".into(), vec![1.0, 2.0, 3.0, 4.0]);
//!
//! let req = ProfileRequest::new(["radius"], ["mass"]).n_bins(2).range("radius", 0.0, 1.0);
//! let prof = create_profile(&cols, &req).unwrap();
//! assert_eq!(prof.field("mass").unwrap(), &[3.0, 7.0]);
//! assert_eq!(prof.bin_edges(0), &[0.0, 0.5, 1.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accumulate;
pub mod binning;
pub mod deposit;
pub mod engine;
pub mod profile;
pub mod request;

pub use accumulate::cumulative_sum;
pub use binning::{BinAxis, BinScale, compute_edges, find_bin};
pub use deposit::{DepositGrid, DepositKernel, Domain, deposit};
pub use engine::create_profile;
pub use profile::{FieldValues, Profile};
pub use request::{Accumulation, LogScale, NBins, ProfileRequest};
