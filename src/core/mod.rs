//! Core layer - storage interface and fundamental types.
//!
//! This module provides:
//! - [`StorageBackend`] - the interface every container implementation satisfies
//! - [`ArrayData`] - typed n-dimensional payloads
//! - [`Attributes`] - ordered attribute mappings with reserved markers
//! - Backend ids and headers ([`GroupId`], [`DimensionHeader`], ...)
//! - [`IndexSelection`] - 1-based index lists used when copying

mod array;
mod attributes;
mod header;
mod selection;
mod traits;

pub use array::{ArrayData, NcScalar};
pub use attributes::{is_reserved, Attributes};
pub use header::{
    AttrTarget, DimId, DimLength, DimensionHeader, GroupId, GroupListing, VarId, VariableHeader,
};
pub use selection::IndexSelection;
pub use traits::{StorageBackend, StorageBackendExt};
