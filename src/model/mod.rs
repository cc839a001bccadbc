//! High-level dataset API.
//!
//! This module provides the object model layered on a storage backend:
//! - [`Dataset`] - open/create/close a container
//! - [`Group`] - hierarchical groups with dimensions, variables, attributes
//! - [`Dimension`] - shared, possibly growable axes
//! - [`Variable`] - real or complex variables and their payloads
//! - [`Duplicator`] - subtree copies with optional index selections
//! - [`truncate`] - copy a dataset while shortening one dimension
//!
//! ## Example
//!
//! ```ignore
//! use nctree::{Dataset, DimLength, FormatOptions, ScalarType};
//!
//! let ds = Dataset::create("obs.nct", FormatOptions::default())?;
//! let root = ds.root();
//! root.add_dimension("time", DimLength::Growable)?;
//! let station = root.add_group("station")?;
//! station.add_variable("temperature", ScalarType::Double, &["time"])?;
//! ds.close()?;
//! ```

mod complex;
mod dataset;
mod dimension;
mod dump;
mod duplicate;
mod group;
mod registry;
mod resolve;
mod truncate;
mod variable;

pub use dataset::{provenance, Dataset};
pub use dimension::Dimension;
pub use duplicate::{DuplicateOptions, DuplicateReport, Duplicator, ExistingPolicy};
pub use group::Group;
pub use resolve::Resolvable;
pub use truncate::{truncate, Truncation};
pub use variable::{ComplexVariable, DataState, RealVariable, Variable, VariableData};
