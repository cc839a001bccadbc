//! Utility types used throughout the crate.
//!
//! - [`ScalarType`] - element types of variables
//! - [`Shape`] - array shapes
//! - [`AttrValue`] - tagged attribute values
//! - [`Error`] / [`Result`] - error handling

mod error;
mod scalar;
mod shape;
mod value;

pub use error::*;
pub use scalar::*;
pub use shape::*;
pub use value::*;
