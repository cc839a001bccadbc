//! # nctree
//!
//! Hierarchical, self-describing containers for scientific array data.
//!
//! A dataset is a tree of groups. Each group holds dimensions (named axes,
//! fixed or growable), variables (typed arrays over an ordered list of
//! dimensions, real or complex valued), attributes and child groups.
//! Dimensions defined in a group are visible to all of its descendants.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (scalar types, shapes, attribute values, errors)
//! - [`core`] - Storage backend interface, array payloads, ids and headers
//! - [`backend`] - Storage backend implementations
//! - [`model`] - High-level API (Dataset, Group, Dimension, Variable, copies)
//!
//! ## Example
//!
//! ```ignore
//! use nctree::prelude::*;
//!
//! let ds = Dataset::open("obs.nct", false)?;
//! let temp = ds.root().read("station/temperature")?;
//! println!("{}", ds.root().dump());
//! ```

pub mod util;
pub mod core;
pub mod backend;
pub mod model;

// Re-export commonly used types
pub use util::{AttrValue, EntityKind, Error, Result, ScalarType, Shape};
pub use core::{ArrayData, Attributes, DimLength, IndexSelection, StorageBackend};
pub use backend::{FormatOptions, MemoryBackend};
pub use model::{
    truncate, ComplexVariable, Dataset, Dimension, DuplicateOptions, DuplicateReport, Duplicator,
    ExistingPolicy, Group, RealVariable, Truncation, Variable, VariableData,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{AttrValue, Error, Result, ScalarType};
    pub use crate::core::{ArrayData, DimLength, IndexSelection};
    pub use crate::backend::FormatOptions;
    pub use crate::model::{
        Dataset, Dimension, DuplicateOptions, Group, Variable, VariableData,
    };
}
