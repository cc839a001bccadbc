//! Name and path resolution.
//!
//! Dimensions, variables and groups can be addressed three ways from any
//! group:
//!
//! - a bare name (`"time"`): the group's own index first, which also holds
//!   inherited dimensions; failing that, a search of the whole subtree that
//!   must find exactly one entity with that leaf name
//! - a relative path (`"obs/time"`): walked child by child from the group
//! - an absolute path (`"/obs/time"`): walked from the root
//!
//! Paths never search. Empty segments, including a trailing `/`, resolve to
//! nothing.

use crate::util::{EntityKind, Error, Result};

use super::dimension::{join_path, Dimension};
use super::group::Group;
use super::variable::Variable;

/// Entity kinds that can be looked up by name or path.
pub trait Resolvable: Clone + Sized {
    const KIND: EntityKind;

    /// Entry of the group's own index.
    fn lookup_local(group: &Group, name: &str) -> Option<Self>;

    /// Entity named `name` that `group` itself defines. Unlike
    /// [`lookup_local`](Self::lookup_local) this excludes inherited entries,
    /// so each entity is counted once in a subtree search.
    fn lookup_owned(group: &Group, name: &str) -> Option<Self>;

    /// Absolute path of an entity found in `group`.
    fn path_in(group: &Group, item: &Self) -> String;
}

impl Resolvable for Dimension {
    const KIND: EntityKind = EntityKind::Dimension;

    fn lookup_local(group: &Group, name: &str) -> Option<Self> {
        group.local_dimension(name)
    }

    fn lookup_owned(group: &Group, name: &str) -> Option<Self> {
        group
            .local_dimension(name)
            .filter(|d| d.group_path() == group.path())
    }

    fn path_in(_group: &Group, item: &Self) -> String {
        item.full_path()
    }
}

impl Resolvable for Variable {
    const KIND: EntityKind = EntityKind::Variable;

    fn lookup_local(group: &Group, name: &str) -> Option<Self> {
        group.local_variable(name)
    }

    fn lookup_owned(group: &Group, name: &str) -> Option<Self> {
        group.local_variable(name)
    }

    fn path_in(group: &Group, item: &Self) -> String {
        join_path(group.path(), item.name())
    }
}

impl Resolvable for Group {
    const KIND: EntityKind = EntityKind::Group;

    fn lookup_local(group: &Group, name: &str) -> Option<Self> {
        group.child(name)
    }

    fn lookup_owned(group: &Group, name: &str) -> Option<Self> {
        group.child(name)
    }

    fn path_in(_group: &Group, item: &Self) -> String {
        item.path().to_string()
    }
}

impl Group {
    /// Resolve a name or path to one entity.
    ///
    /// ```ignore
    /// let time: Dimension = group.resolve("time")?;
    /// let temp: Variable = group.resolve("/obs/temperature")?;
    /// ```
    pub fn resolve<T: Resolvable>(&self, name_or_path: &str) -> Result<T> {
        self.resolve_located(name_or_path).map(|(_, item)| item)
    }

    /// Resolve several names. Fails on the first name that does not resolve,
    /// before anything is returned.
    pub fn resolve_all<T: Resolvable>(&self, names: &[&str]) -> Result<Vec<T>> {
        names.iter().map(|name| self.resolve(name)).collect()
    }

    /// Like [`resolve`](Self::resolve), also returning the group the entity
    /// was found in.
    pub(crate) fn resolve_located<T: Resolvable>(&self, name_or_path: &str) -> Result<(Group, T)> {
        if name_or_path.contains('/') {
            return self.resolve_path(name_or_path);
        }
        if let Some(item) = T::lookup_local(self, name_or_path) {
            return Ok((self.clone(), item));
        }

        let mut matches = Vec::new();
        self.collect_owned::<T>(name_or_path, &mut matches);
        match matches.len() {
            0 => Err(Error::not_found(T::KIND, name_or_path)),
            1 => Ok(matches.remove(0)),
            _ => {
                let candidates = matches
                    .iter()
                    .map(|(group, item)| T::path_in(group, item))
                    .collect();
                Err(Error::AmbiguousName {
                    kind: T::KIND,
                    name: name_or_path.to_string(),
                    candidates,
                })
            }
        }
    }

    pub(crate) fn resolve_all_located<T: Resolvable>(&self, names: &[&str]) -> Result<Vec<(Group, T)>> {
        names.iter().map(|name| self.resolve_located(name)).collect()
    }

    fn resolve_path<T: Resolvable>(&self, path: &str) -> Result<(Group, T)> {
        let not_found = || Error::not_found(T::KIND, path);
        let (start, rest) = match path.strip_prefix('/') {
            Some(rest) => (self.root(), rest),
            None => (self.clone(), path),
        };
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(not_found());
        }
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(not_found());
        };

        let mut group = start;
        for segment in parents {
            group = group.child(segment).ok_or_else(not_found)?;
        }
        let item = T::lookup_local(&group, leaf).ok_or_else(not_found)?;
        Ok((group, item))
    }

    fn collect_owned<T: Resolvable>(&self, name: &str, out: &mut Vec<(Group, T)>) {
        if let Some(item) = T::lookup_owned(self, name) {
            out.push((self.clone(), item));
        }
        for child in self.children() {
            child.collect_owned(name, out);
        }
    }

    // === Typed shorthands ===

    pub fn dimension(&self, name_or_path: &str) -> Result<Dimension> {
        self.resolve(name_or_path)
    }

    pub fn variable(&self, name_or_path: &str) -> Result<Variable> {
        self.resolve(name_or_path)
    }

    pub fn group(&self, name_or_path: &str) -> Result<Group> {
        self.resolve(name_or_path)
    }

    /// True if the name resolves to a variable. An ambiguous bare name also
    /// counts: at least one such variable exists.
    pub fn has_variable(&self, name_or_path: &str) -> bool {
        exists(self.resolve::<Variable>(name_or_path))
    }

    pub fn has_dimension(&self, name_or_path: &str) -> bool {
        exists(self.resolve::<Dimension>(name_or_path))
    }

    pub fn has_group(&self, name_or_path: &str) -> bool {
        exists(self.resolve::<Group>(name_or_path))
    }
}

fn exists<T>(result: Result<T>) -> bool {
    matches!(result, Ok(_) | Err(Error::AmbiguousName { .. }))
}
