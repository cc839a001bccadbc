//! The storage backend interface.
//!
//! The model never encodes or decodes anything itself: every structural change
//! and every array transfer goes through a [`StorageBackend`]. Concrete
//! backends are opened or created through their own constructors.

use std::path::Path;

use super::{
    ArrayData, AttrTarget, DimId, DimLength, GroupId, GroupListing, VarId,
};
use crate::util::{AttrValue, Result, ScalarType};

/// Physical container a [`Dataset`](crate::Dataset) is layered on.
///
/// Dimension ids defined in a group are valid for variables declared in that
/// group and in all of its descendants.
pub trait StorageBackend: Send + Sync {
    /// Location of the container, if it is file backed.
    fn path(&self) -> Option<&Path>;

    fn is_writable(&self) -> bool;

    /// Identifier of the root group.
    fn root(&self) -> GroupId;

    // === Definition ===

    fn define_dimension(&mut self, group: GroupId, name: &str, length: DimLength) -> Result<DimId>;

    fn define_variable(
        &mut self,
        group: GroupId,
        name: &str,
        scalar_type: ScalarType,
        dims: &[DimId],
    ) -> Result<VarId>;

    fn define_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId>;

    /// Commit everything defined so far. Until the first commit the container
    /// is not made readable by [`sync`](Self::sync) or [`close`](Self::close).
    fn end_define(&mut self) -> Result<()>;

    // === Attributes ===

    fn get_attribute(&self, group: GroupId, target: AttrTarget, name: &str)
        -> Result<Option<AttrValue>>;

    fn put_attribute(
        &mut self,
        group: GroupId,
        target: AttrTarget,
        name: &str,
        value: &AttrValue,
    ) -> Result<()>;

    fn attribute_names(&self, group: GroupId, target: AttrTarget) -> Result<Vec<String>>;

    // === Arrays ===

    /// Full array as written so far.
    fn read_array(&self, group: GroupId, var: VarId) -> Result<ArrayData>;

    /// Sub-array at one 0-based `position` along `axis`.
    fn read_array_slice(
        &self,
        group: GroupId,
        var: VarId,
        axis: usize,
        position: usize,
    ) -> Result<ArrayData>;

    /// Write `data` into the hyperslab at `start` with extent `count`.
    fn write_array(
        &mut self,
        group: GroupId,
        var: VarId,
        start: &[usize],
        count: &[usize],
        data: &ArrayData,
    ) -> Result<()>;

    /// Current extent of a dimension.
    fn dimension_length(&self, dim: DimId) -> Result<usize>;

    // === Whole-container ===

    fn inspect(&self, group: GroupId) -> Result<GroupListing>;

    /// Flush committed state to the container.
    fn sync(&mut self) -> Result<()>;

    /// Flush and release the handle. A second call fails with
    /// [`Error::AlreadyClosed`](crate::Error::AlreadyClosed).
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Convenience helpers layered on the required methods.
pub trait StorageBackendExt: StorageBackend {
    /// All attributes of a target, in definition order.
    fn attributes(&self, group: GroupId, target: AttrTarget) -> Result<Vec<(String, AttrValue)>> {
        let mut out = Vec::new();
        for name in self.attribute_names(group, target)? {
            if let Some(value) = self.get_attribute(group, target, &name)? {
                out.push((name, value));
            }
        }
        Ok(out)
    }

    /// Write a whole array starting at the origin.
    fn write_full(&mut self, group: GroupId, var: VarId, data: &ArrayData) -> Result<()> {
        let count = data.shape();
        let start = vec![0; count.rank()];
        self.write_array(group, var, &start, count.sizes(), data)
    }
}

impl<T: StorageBackend + ?Sized> StorageBackendExt for T {}
