//! Per-group registries.
//!
//! Every group keeps one ordered registry per kind (dimensions, real
//! variables, complex variables, child groups). Each registry indexes its
//! entries by name and by backend id, and both indexes always cover exactly
//! the stored entries. Registration checks every name of a batch before
//! anything is inserted, so a failed call leaves the registry untouched.

use std::collections::HashMap;
use std::hash::Hash;

use crate::core::{Attributes, DimId, GroupId, VarId};
use crate::util::{EntityKind, Error, Result};

use super::dimension::Dimension;
use super::group::Group;
use super::variable::{ComplexVariable, RealVariable};

/// Entry that can live in a [`Registry`].
pub(crate) trait Registered {
    type Id: Copy + Eq + Hash;

    fn key_name(&self) -> &str;

    fn key_id(&self) -> Self::Id;
}

impl Registered for Dimension {
    type Id = DimId;

    fn key_name(&self) -> &str {
        self.name()
    }

    fn key_id(&self) -> DimId {
        self.id()
    }
}

impl Registered for RealVariable {
    type Id = VarId;

    fn key_name(&self) -> &str {
        self.name()
    }

    fn key_id(&self) -> VarId {
        self.id()
    }
}

impl Registered for ComplexVariable {
    type Id = VarId;

    fn key_name(&self) -> &str {
        self.name()
    }

    fn key_id(&self) -> VarId {
        self.id()
    }
}

impl Registered for Group {
    type Id = GroupId;

    fn key_name(&self) -> &str {
        self.name()
    }

    fn key_id(&self) -> GroupId {
        self.id()
    }
}

/// Ordered entries with name and id indexes.
pub(crate) struct Registry<T: Registered> {
    items: Vec<T>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<T::Id, usize>,
}

impl<T: Registered> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            by_name: HashMap::new(),
            by_id: HashMap::new(),
        }
    }
}

impl<T: Registered> Registry<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.by_name.get(name).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.by_name.get(name).map(|&i| &mut self.items[i])
    }

    pub fn by_id(&self, id: T::Id) -> Option<&T> {
        self.by_id.get(&id).map(|&i| &self.items[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Caller has checked that neither the name nor the id is taken.
    fn push(&mut self, item: T) {
        let pos = self.items.len();
        self.by_name.insert(item.key_name().to_string(), pos);
        self.by_id.insert(item.key_id(), pos);
        self.items.push(item);
    }

    fn remove_id(&mut self, id: T::Id) -> Option<T> {
        let pos = self.by_id.get(&id).copied()?;
        let item = self.items.remove(pos);
        self.reindex();
        Some(item)
    }

    fn reindex(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
        for (pos, item) in self.items.iter().enumerate() {
            self.by_name.insert(item.key_name().to_string(), pos);
            self.by_id.insert(item.key_id(), pos);
        }
    }
}

/// Mutable state of a group: attributes and registries.
#[derive(Default)]
pub(crate) struct GroupNode {
    pub attributes: Attributes,
    /// Visible dimensions: own ones plus those inherited from ancestors.
    pub dimensions: Registry<Dimension>,
    pub reals: Registry<RealVariable>,
    pub complexes: Registry<ComplexVariable>,
    pub children: Registry<Group>,
}

impl GroupNode {
    /// Register dimensions owned by this group.
    pub fn register_dimensions(&mut self, dims: &[Dimension], group_path: &str) -> Result<()> {
        for (i, dim) in dims.iter().enumerate() {
            let repeated = dims[..i].iter().any(|d| d.name() == dim.name());
            if repeated || self.dimensions.contains(dim.name()) {
                return Err(Error::duplicate(EntityKind::Dimension, dim.name(), group_path));
            }
        }
        for dim in dims {
            self.dimensions.push(dim.clone());
        }
        Ok(())
    }

    /// Make ancestor dimensions visible. Names already present are shadowed
    /// by the group's own definition and skipped. Returns how many were added.
    pub fn inherit_dimensions(&mut self, dims: &[Dimension]) -> usize {
        let mut added = 0;
        for dim in dims {
            if !self.dimensions.contains(dim.name()) {
                self.dimensions.push(dim.clone());
                added += 1;
            }
        }
        added
    }

    /// Register an own dimension in place of an inherited one of the same
    /// name. Returns the entry it replaced.
    pub fn shadow_dimension(&mut self, dim: Dimension, group_path: &str) -> Result<Option<Dimension>> {
        let previous = self.dimensions.get(dim.name()).cloned();
        if let Some(prev) = &previous {
            if prev.group_path() == group_path {
                return Err(Error::duplicate(EntityKind::Dimension, dim.name(), group_path));
            }
            self.dimensions.remove_id(prev.id());
        }
        self.dimensions.push(dim);
        Ok(previous)
    }

    /// Swap the inherited `old` for `new`. False when this group sees some
    /// other dimension under that name.
    pub fn replace_inherited(&mut self, old: &Dimension, new: &Dimension) -> bool {
        if !self.dimensions.get(old.name()).is_some_and(|d| d.same_as(old)) {
            return false;
        }
        self.dimensions.remove_id(old.id());
        self.dimensions.push(new.clone());
        true
    }

    /// True if `name` is taken in the variable namespace.
    pub fn has_variable(&self, name: &str) -> bool {
        self.reals.contains(name) || self.complexes.contains(name)
    }

    pub fn register_real_variable(&mut self, var: RealVariable, group_path: &str) -> Result<()> {
        if self.has_variable(var.name()) {
            return Err(Error::duplicate(EntityKind::Variable, var.name(), group_path));
        }
        self.reals.push(var);
        Ok(())
    }

    /// Register a complex variable and drop its parts from the real listing.
    pub fn register_complex_variable(&mut self, var: ComplexVariable, group_path: &str) -> Result<()> {
        let part_ids = [var.real_part().id(), var.imag_part().id()];
        let clashes_with_real = self
            .reals
            .get(var.name())
            .is_some_and(|r| !part_ids.contains(&r.id()));
        if clashes_with_real || self.complexes.contains(var.name()) {
            return Err(Error::duplicate(EntityKind::Variable, var.name(), group_path));
        }
        for id in part_ids {
            self.reals.remove_id(id);
        }
        self.complexes.push(var);
        Ok(())
    }

    pub fn register_child_group(&mut self, child: Group, group_path: &str) -> Result<()> {
        if self.children.contains(child.name()) {
            return Err(Error::duplicate(EntityKind::Group, child.name(), group_path));
        }
        self.children.push(child);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DimLength;
    use crate::model::complex::part_markers;
    use crate::util::ScalarType;

    fn dim(name: &str, id: u32) -> Dimension {
        Dimension::new(name, DimId(id), DimLength::Fixed(2), 2, "/")
    }

    fn real(x: &Dimension, name: &str, id: u32, attrs: Attributes) -> RealVariable {
        RealVariable::new(name, VarId(id), vec![x.clone()], ScalarType::Float, attrs)
    }

    #[test]
    fn test_register_dimensions_all_or_nothing() {
        let mut node = GroupNode::default();
        node.register_dimensions(&[dim("x", 0)], "/").unwrap();

        let err = node
            .register_dimensions(&[dim("y", 1), dim("x", 2)], "/")
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
        assert!(!node.dimensions.contains("y"));

        let err = node
            .register_dimensions(&[dim("z", 3), dim("z", 4)], "/")
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
        assert_eq!(node.dimensions.len(), 1);
    }

    #[test]
    fn test_indexes_stay_in_lockstep() {
        let mut node = GroupNode::default();
        node.register_dimensions(&[dim("x", 0), dim("y", 5)], "/").unwrap();
        assert_eq!(node.dimensions.by_id(DimId(5)).map(|d| d.name()), Some("y"));
        assert_eq!(node.dimensions.get("x").map(|d| d.id()), Some(DimId(0)));
    }

    #[test]
    fn test_inherit_skips_shadowed() {
        let mut node = GroupNode::default();
        node.register_dimensions(&[dim("x", 7)], "/g").unwrap();
        assert_eq!(node.inherit_dimensions(&[dim("x", 0), dim("t", 1)]), 1);
        assert_eq!(node.dimensions.get("x").map(|d| d.id()), Some(DimId(7)));
    }

    #[test]
    fn test_shadow_replaces_inherited() {
        let mut node = GroupNode::default();
        let outer = dim("x", 0);
        node.inherit_dimensions(std::slice::from_ref(&outer));
        let own = Dimension::new("x", DimId(4), DimLength::Fixed(5), 5, "/g");
        let previous = node.shadow_dimension(own.clone(), "/g").unwrap();
        assert!(previous.is_some_and(|d| d.same_as(&outer)));
        assert!(node.dimensions.get("x").is_some_and(|d| d.same_as(&own)));
        assert!(node.dimensions.by_id(DimId(0)).is_none());

        let again = Dimension::new("x", DimId(5), DimLength::Fixed(1), 1, "/g");
        assert!(matches!(node.shadow_dimension(again, "/g"), Err(Error::DuplicateName { .. })));
        assert!(!node.replace_inherited(&outer, &own));
    }

    #[test]
    fn test_register_variable_twice() {
        let mut node = GroupNode::default();
        let x = dim("x", 0);
        node.register_real_variable(real(&x, "t", 0, Attributes::new()), "/").unwrap();
        let err = node
            .register_real_variable(real(&x, "t", 1, Attributes::new()), "/")
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
        assert_eq!(node.reals.len(), 1);
    }

    #[test]
    fn test_register_complex_removes_parts() {
        let mut node = GroupNode::default();
        let x = dim("x", 0);
        let re = real(&x, "w.real", 1, part_markers("w", true));
        let im = real(&x, "w.imag", 2, part_markers("w", false));
        node.register_real_variable(re.clone(), "/").unwrap();
        node.register_real_variable(im.clone(), "/").unwrap();
        node.register_real_variable(real(&x, "t", 3, Attributes::new()), "/").unwrap();

        let cv = ComplexVariable::pair("w", re, im).unwrap();
        node.register_complex_variable(cv.clone(), "/").unwrap();
        assert_eq!(node.reals.len(), 1);
        assert!(node.reals.by_id(VarId(3)).is_some());
        assert!(node.complexes.by_id(VarId(1)).is_some());
        assert!(node.has_variable("w"));

        let err = node.register_complex_variable(cv, "/").unwrap_err();
        assert!(matches!(err, Error::DuplicateName { .. }));
    }
}
