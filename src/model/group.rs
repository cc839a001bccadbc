//! Groups: the aggregate owning dimensions, variables, attributes and child
//! groups.
//!
//! A [`Group`] is a cheap handle. Cloning it yields another reference to the
//! same group; children are owned by their parent and hold only a weak
//! reference back up, so dropping the root tears the whole tree down.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::core::{
    ArrayData, AttrTarget, Attributes, DimLength, GroupId, IndexSelection, StorageBackend,
    StorageBackendExt,
};
use crate::util::{AttrValue, EntityKind, Error, Result, ScalarType};

use super::complex::{self, imag_part_name, part_markers, real_part_name};
use super::dimension::{join_path, Dimension};
use super::registry::GroupNode;
use super::variable::{ComplexVariable, RealVariable, Variable, VariableData};

/// Backend handle shared by every group of one dataset.
pub(crate) type SharedBackend = Arc<Mutex<Box<dyn StorageBackend>>>;

/// Prefix of the private dimension that sizes a blob variable.
const BLOB_DIM_PREFIX: &str = "_nct_blob_";

struct GroupInner {
    name: String,
    id: GroupId,
    path: String,
    parent: Option<Weak<GroupInner>>,
    backend: SharedBackend,
    // Lock order: a group's node before the backend, never the reverse.
    node: RwLock<GroupNode>,
}

/// A group in the hierarchy.
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

impl Group {
    fn new(name: String, id: GroupId, path: String, parent: Option<&Group>, backend: SharedBackend) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                name,
                id,
                path,
                parent: parent.map(|p| Arc::downgrade(&p.inner)),
                backend,
                node: RwLock::new(GroupNode::default()),
            }),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Build the whole tree from what the backend holds.
    pub(crate) fn load_root(backend: SharedBackend) -> Result<Group> {
        let root_id = backend.lock().root();
        let root = Group::new(String::new(), root_id, "/".to_string(), None, backend);
        root.load_tree(&[])?;
        Ok(root)
    }

    fn load_tree(&self, inherited: &[Dimension]) -> Result<()> {
        let listing = self.inner.backend.lock().inspect(self.id())?;
        let path = self.path();

        let (children, visible) = {
            let mut node = self.inner.node.write();
            node.attributes = listing.attributes.into_iter().collect();

            let own: Vec<Dimension> = listing
                .dimensions
                .iter()
                .map(|h| Dimension::from_header(h, path))
                .collect();
            node.register_dimensions(&own, path)?;
            node.inherit_dimensions(inherited);

            for header in listing.variables {
                let dims = header
                    .dim_ids
                    .iter()
                    .map(|&id| {
                        node.dimensions
                            .by_id(id)
                            .or_else(|| inherited.iter().find(|d| d.id() == id))
                            .cloned()
                            .ok_or_else(|| {
                                Error::schema(format!(
                                    "variable '{}' in {} refers to unknown dimension {}",
                                    header.name, path, id
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let var = RealVariable::new(
                    header.name,
                    header.id,
                    dims,
                    header.scalar_type,
                    header.attributes,
                );
                node.register_real_variable(var, path)?;
            }

            let reals: Vec<RealVariable> = node.reals.iter().cloned().collect();
            for cv in complex::pair_parts(&reals)? {
                node.register_complex_variable(cv, path)?;
            }

            for (id, name) in listing.child_groups {
                let child_path = join_path(path, &name);
                let child = Group::new(name, id, child_path, Some(self), self.inner.backend.clone());
                node.register_child_group(child, path)?;
            }

            let children: Vec<Group> = node.children.iter().cloned().collect();
            let visible: Vec<Dimension> = node.dimensions.iter().cloned().collect();
            (children, visible)
        };

        tracing::trace!(
            "loaded group {} ({} dims visible, {} children)",
            path,
            visible.len(),
            children.len()
        );
        for child in children {
            child.load_tree(&visible)?;
        }
        Ok(())
    }

    // ========================================================================
    // Identity and navigation
    // ========================================================================

    /// Leaf name; empty for the root.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn id(&self) -> GroupId {
        self.inner.id
    }

    /// Absolute path, `/` for the root.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn parent(&self) -> Option<Group> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Group { inner })
    }

    /// Topmost ancestor (the group itself for the root).
    pub fn root(&self) -> Group {
        let mut group = self.clone();
        while let Some(parent) = group.parent() {
            group = parent;
        }
        group
    }

    /// True when both handles refer to the same group.
    pub fn same_as(&self, other: &Group) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn backend(&self) -> &SharedBackend {
        &self.inner.backend
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<Group> {
        self.inner.node.read().children.get(name).cloned()
    }

    /// Direct children in creation order.
    pub fn children(&self) -> Vec<Group> {
        self.inner.node.read().children.iter().cloned().collect()
    }

    /// Create a child group. It starts out seeing every dimension visible here.
    pub fn add_group(&self, name: &str) -> Result<Group> {
        let mut node = self.inner.node.write();
        if node.children.contains(name) {
            return Err(Error::duplicate(EntityKind::Group, name, self.path()));
        }
        let id = self.inner.backend.lock().define_group(self.id(), name)?;
        let child = Group::new(
            name.to_string(),
            id,
            join_path(self.path(), name),
            Some(self),
            self.inner.backend.clone(),
        );
        let visible: Vec<Dimension> = node.dimensions.iter().cloned().collect();
        child.inner.node.write().inherit_dimensions(&visible);
        node.register_child_group(child.clone(), self.path())?;
        tracing::debug!("defined group {}", child.path());
        Ok(child)
    }

    /// Visit this group and then every descendant, depth first.
    pub fn walk<F>(&self, f: &mut F) -> Result<()>
    where
        F: FnMut(&Group) -> Result<()>,
    {
        f(self)?;
        for child in self.children() {
            child.walk(f)?;
        }
        Ok(())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attributes(&self) -> Attributes {
        self.inner.node.read().attributes.clone()
    }

    pub fn attribute(&self, name: &str) -> Option<AttrValue> {
        self.inner.node.read().attributes.get(name).cloned()
    }

    /// Add or replace a group attribute.
    pub fn set_attribute(&self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        let value = value.into();
        let mut node = self.inner.node.write();
        self.inner
            .backend
            .lock()
            .put_attribute(self.id(), AttrTarget::Global, name, &value)?;
        node.attributes.set(name, value);
        Ok(())
    }

    /// Add or replace an attribute of a variable. Attributes of a complex
    /// variable are stored on its real part.
    pub fn set_variable_attribute(
        &self,
        variable: &str,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        let (owner, var) = self.resolve_located::<Variable>(variable)?;
        owner.set_local_variable_attribute(var.name(), name, value.into())
    }

    pub(crate) fn set_local_variable_attribute(
        &self,
        variable: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        let mut node = self.inner.node.write();
        let mut backend = self.inner.backend.lock();
        if let Some(v) = node.reals.get_mut(variable) {
            return v.put_attribute(&mut **backend, self.id(), name, value);
        }
        if let Some(c) = node.complexes.get_mut(variable) {
            return c.put_attribute(&mut **backend, self.id(), name, value);
        }
        Err(Error::not_found(EntityKind::Variable, join_path(self.path(), variable)))
    }

    // ========================================================================
    // Dimensions
    // ========================================================================

    /// Every dimension visible here, own and inherited.
    pub fn dimensions(&self) -> Vec<Dimension> {
        self.inner.node.read().dimensions.iter().cloned().collect()
    }

    /// Dimensions defined by this group itself.
    pub fn own_dimensions(&self) -> Vec<Dimension> {
        self.inner
            .node
            .read()
            .dimensions
            .iter()
            .filter(|d| d.group_path() == self.path())
            .cloned()
            .collect()
    }

    /// Visible dimension by leaf name, without searching the subtree.
    pub fn local_dimension(&self, name: &str) -> Option<Dimension> {
        self.inner.node.read().dimensions.get(name).cloned()
    }

    /// Define a dimension in this group.
    ///
    /// Descendants that do not already see a dimension of the same name pick
    /// it up as inherited. Redefining a name that is visible here, including
    /// an inherited one, fails with [`Error::DuplicateName`].
    pub fn add_dimension(&self, name: &str, length: DimLength) -> Result<Dimension> {
        if self.inner.node.read().dimensions.contains(name) {
            return Err(Error::duplicate(EntityKind::Dimension, name, self.path()));
        }
        self.define_dimension(name, length)
    }

    /// Define a dimension owned by this group. An inherited dimension of the
    /// same name is shadowed here and in every descendant that saw it.
    pub(crate) fn define_dimension(&self, name: &str, length: DimLength) -> Result<Dimension> {
        let (dim, shadowed) = {
            let mut node = self.inner.node.write();
            let shadowed = match node.dimensions.get(name) {
                Some(d) if d.group_path() == self.path() => {
                    return Err(Error::duplicate(EntityKind::Dimension, name, self.path()));
                }
                other => other.cloned(),
            };
            let (id, current) = {
                let mut backend = self.inner.backend.lock();
                let id = backend.define_dimension(self.id(), name, length)?;
                (id, backend.dimension_length(id)?)
            };
            let dim = Dimension::new(name, id, length, current, self.path());
            node.shadow_dimension(dim.clone(), self.path())?;
            (dim, shadowed)
        };
        match &shadowed {
            Some(old) => {
                self.replace_inherited(old, &dim);
                tracing::debug!(
                    "defined dimension {} ({}), shadowing {}",
                    dim.full_path(),
                    length,
                    old.full_path()
                );
            }
            None => {
                self.propagate_dimension(&dim);
                tracing::debug!("defined dimension {} ({})", dim.full_path(), length);
            }
        }
        Ok(dim)
    }

    fn replace_inherited(&self, old: &Dimension, new: &Dimension) {
        for child in self.children() {
            let replaced = child.inner.node.write().replace_inherited(old, new);
            if replaced {
                child.replace_inherited(old, new);
            }
        }
    }

    fn propagate_dimension(&self, dim: &Dimension) {
        for child in self.children() {
            let added = child
                .inner
                .node
                .write()
                .inherit_dimensions(std::slice::from_ref(dim));
            if added > 0 {
                child.propagate_dimension(dim);
            }
        }
    }

    /// Define a dimension together with a coordinate variable of the same
    /// name holding `values`.
    pub fn add_dimension_with_data(
        &self,
        name: &str,
        length: DimLength,
        values: ArrayData,
    ) -> Result<(Dimension, Variable)> {
        if values.rank() != 1 {
            return Err(Error::schema(format!(
                "coordinate values for '{}' must be one-dimensional, got shape {}",
                name,
                values.shape()
            )));
        }
        if let Some(n) = length.fixed() {
            if n != values.len() {
                return Err(Error::schema(format!(
                    "dimension '{}' has length {} but {} coordinate values were given",
                    name,
                    n,
                    values.len()
                )));
            }
        }
        if self.inner.node.read().has_variable(name) {
            return Err(Error::duplicate(EntityKind::Variable, name, self.path()));
        }

        let dim = self.add_dimension(name, length)?;
        let var = self.define_real(name, values.scalar_type(), vec![dim.clone()], Attributes::new())?;
        self.write_local(var.name(), &VariableData::Real(values))?;
        Ok((dim, Variable::Real(var)))
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Real variables followed by complex variables, each in definition order.
    pub fn variables(&self) -> Vec<Variable> {
        let node = self.inner.node.read();
        node.reals
            .iter()
            .cloned()
            .map(Variable::Real)
            .chain(node.complexes.iter().cloned().map(Variable::Complex))
            .collect()
    }

    pub fn real_variables(&self) -> Vec<RealVariable> {
        self.inner.node.read().reals.iter().cloned().collect()
    }

    pub fn complex_variables(&self) -> Vec<ComplexVariable> {
        self.inner.node.read().complexes.iter().cloned().collect()
    }

    /// Variable owned by this group, without searching the subtree.
    pub fn local_variable(&self, name: &str) -> Option<Variable> {
        let node = self.inner.node.read();
        node.reals
            .get(name)
            .cloned()
            .map(Variable::Real)
            .or_else(|| node.complexes.get(name).cloned().map(Variable::Complex))
    }

    /// Declare a real variable over the named dimensions.
    pub fn add_variable(&self, name: &str, scalar_type: ScalarType, dims: &[&str]) -> Result<Variable> {
        let dims = self.resolve_all::<Dimension>(dims)?;
        self.define_real(name, scalar_type, dims, Attributes::new())
            .map(Variable::Real)
    }

    /// Declare a real variable and write its initial data.
    pub fn add_variable_with_data(&self, name: &str, dims: &[&str], data: ArrayData) -> Result<Variable> {
        let dims = self.resolve_all::<Dimension>(dims)?;
        check_extents(name, &dims, &data)?;
        let var = self.define_real(name, data.scalar_type(), dims, Attributes::new())?;
        self.write_local(name, &VariableData::Real(data))?;
        Ok(self.local_variable(name).unwrap_or(Variable::Real(var)))
    }

    /// Declare a complex variable stored as a real and an imaginary part.
    pub fn add_complex_variable(
        &self,
        name: &str,
        scalar_type: ScalarType,
        dims: &[&str],
    ) -> Result<Variable> {
        let dims = self.resolve_all::<Dimension>(dims)?;
        self.define_complex(name, scalar_type, dims, &Attributes::new())
            .map(Variable::Complex)
    }

    /// Declare a complex variable and write both parts.
    pub fn add_complex_variable_with_data(
        &self,
        name: &str,
        dims: &[&str],
        re: ArrayData,
        im: ArrayData,
    ) -> Result<Variable> {
        let data = VariableData::complex(re, im)?;
        let dims = self.resolve_all::<Dimension>(dims)?;
        if let VariableData::Complex { re, .. } = &data {
            check_extents(name, &dims, re)?;
        }
        let var = self.define_complex(name, data.scalar_type(), dims, &Attributes::new())?;
        self.write_local(name, &data)?;
        Ok(self.local_variable(name).unwrap_or(Variable::Complex(var)))
    }

    /// Dimensions must be visible here and only the first may be growable.
    fn check_layout(&self, name: &str, dims: &[Dimension]) -> Result<()> {
        let node = self.inner.node.read();
        for (axis, dim) in dims.iter().enumerate() {
            let visible = node
                .dimensions
                .get(dim.name())
                .is_some_and(|d| d.same_as(dim));
            if !visible {
                return Err(Error::schema(format!(
                    "variable '{}': dimension {} is not visible from group {}",
                    name,
                    dim.full_path(),
                    self.path()
                )));
            }
            if axis > 0 && dim.is_growable() {
                return Err(Error::schema(format!(
                    "variable '{}': growable dimension '{}' must be the first axis",
                    name,
                    dim.name()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn define_real(
        &self,
        name: &str,
        scalar_type: ScalarType,
        dims: Vec<Dimension>,
        attributes: Attributes,
    ) -> Result<RealVariable> {
        self.check_layout(name, &dims)?;
        let mut node = self.inner.node.write();
        if node.has_variable(name) {
            return Err(Error::duplicate(EntityKind::Variable, name, self.path()));
        }
        let dim_ids: Vec<_> = dims.iter().map(Dimension::id).collect();
        let id = {
            let mut backend = self.inner.backend.lock();
            let id = backend.define_variable(self.id(), name, scalar_type, &dim_ids)?;
            for (key, value) in attributes.iter() {
                backend.put_attribute(self.id(), AttrTarget::Variable(id), key, value)?;
            }
            id
        };
        let var = RealVariable::new(name, id, dims, scalar_type, attributes);
        node.register_real_variable(var.clone(), self.path())?;
        tracing::debug!("defined variable {} {}", join_path(self.path(), name), var.shape());
        Ok(var)
    }

    pub(crate) fn define_complex(
        &self,
        name: &str,
        scalar_type: ScalarType,
        dims: Vec<Dimension>,
        attributes: &Attributes,
    ) -> Result<ComplexVariable> {
        if !scalar_type.supports_complex() {
            return Err(Error::schema(format!(
                "complex variable '{}' cannot use element type {}",
                name, scalar_type
            )));
        }
        self.check_layout(name, &dims)?;
        let mut node = self.inner.node.write();
        let (re_name, im_name) = (real_part_name(name), imag_part_name(name));
        for taken in [name, re_name.as_str(), im_name.as_str()] {
            if node.has_variable(taken) {
                return Err(Error::duplicate(EntityKind::Variable, taken, self.path()));
            }
        }

        let dim_ids: Vec<_> = dims.iter().map(Dimension::id).collect();
        let mut re_attrs = part_markers(name, true);
        for (key, value) in attributes.user_entries() {
            re_attrs.set(key, value.clone());
        }
        let im_attrs = part_markers(name, false);

        let (re_id, im_id) = {
            let mut backend = self.inner.backend.lock();
            let re_id = backend.define_variable(self.id(), &re_name, scalar_type, &dim_ids)?;
            let im_id = backend.define_variable(self.id(), &im_name, scalar_type, &dim_ids)?;
            for (key, value) in re_attrs.iter() {
                backend.put_attribute(self.id(), AttrTarget::Variable(re_id), key, value)?;
            }
            for (key, value) in im_attrs.iter() {
                backend.put_attribute(self.id(), AttrTarget::Variable(im_id), key, value)?;
            }
            (re_id, im_id)
        };

        let re = RealVariable::new(re_name, re_id, dims.clone(), scalar_type, re_attrs);
        let im = RealVariable::new(im_name, im_id, dims, scalar_type, im_attrs);
        let var = ComplexVariable::pair(name, re, im)?;
        node.register_complex_variable(var.clone(), self.path())?;
        tracing::debug!("defined complex variable {}", join_path(self.path(), name));
        Ok(var)
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Read a whole variable.
    pub fn read(&self, variable: &str) -> Result<VariableData> {
        let (owner, var) = self.resolve_located::<Variable>(variable)?;
        owner.load_local(var.name())
    }

    /// Read several variables. Every name is resolved before any data is read.
    pub fn read_many(&self, variables: &[&str]) -> Result<Vec<VariableData>> {
        let located = self.resolve_all_located::<Variable>(variables)?;
        located
            .iter()
            .map(|(owner, var)| owner.load_local(var.name()))
            .collect()
    }

    /// Read several variables at one 1-based `index` along `dimension`.
    ///
    /// Each result has one axis fewer than its variable. Every variable must
    /// span the dimension.
    pub fn read_slice(&self, variables: &[&str], dimension: &str, index: usize) -> Result<Vec<VariableData>> {
        let dim = self.resolve::<Dimension>(dimension)?;
        let position = IndexSelection::indices([index])
            .resolve(dim.len())?
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidTruncation(format!("no index given for '{}'", dim.name())))?;
        let located = self.resolve_all_located::<Variable>(variables)?;
        let mut axes = Vec::with_capacity(located.len());
        for (owner, var) in &located {
            let axis = var.axis_of(&dim).ok_or_else(|| {
                Error::not_found(
                    EntityKind::Dimension,
                    format!("{} in variable {}", dim.full_path(), join_path(owner.path(), var.name())),
                )
            })?;
            axes.push(axis);
        }
        located
            .iter()
            .zip(axes)
            .map(|((owner, var), axis)| owner.load_local_slice(var.name(), axis, position))
            .collect()
    }

    fn load_local(&self, name: &str) -> Result<VariableData> {
        let mut node = self.inner.node.write();
        let backend = self.inner.backend.lock();
        if let Some(v) = node.reals.get_mut(name) {
            return Ok(VariableData::Real(v.load(&**backend, self.id())?));
        }
        if let Some(c) = node.complexes.get_mut(name) {
            let (re, im) = c.parts_mut();
            return Ok(VariableData::Complex {
                re: re.load(&**backend, self.id())?,
                im: im.load(&**backend, self.id())?,
            });
        }
        Err(Error::not_found(EntityKind::Variable, join_path(self.path(), name)))
    }

    fn load_local_slice(&self, name: &str, axis: usize, position: usize) -> Result<VariableData> {
        let node = self.inner.node.read();
        let backend = self.inner.backend.lock();
        if let Some(v) = node.reals.get(name) {
            return Ok(VariableData::Real(v.load_slice(&**backend, self.id(), axis, position)?));
        }
        if let Some(c) = node.complexes.get(name) {
            return Ok(VariableData::Complex {
                re: c.real_part().load_slice(&**backend, self.id(), axis, position)?,
                im: c.imag_part().load_slice(&**backend, self.id(), axis, position)?,
            });
        }
        Err(Error::not_found(EntityKind::Variable, join_path(self.path(), name)))
    }

    /// Stage new contents for a variable. They reach the backend on
    /// [`flush`](Self::flush) or when the dataset is synced or closed.
    pub fn put_variable(&self, variable: &str, data: impl Into<VariableData>) -> Result<()> {
        let (owner, var) = self.resolve_located::<Variable>(variable)?;
        owner.assign_local(var.name(), data.into())
    }

    fn assign_local(&self, name: &str, data: VariableData) -> Result<()> {
        if !self.inner.backend.lock().is_writable() {
            return Err(Error::ReadOnly);
        }
        let mut node = self.inner.node.write();
        if let Some(v) = node.reals.get_mut(name) {
            return match data {
                VariableData::Real(a) => v.assign(a),
                VariableData::Complex { .. } => Err(Error::schema(format!(
                    "'{}' is a real variable, got complex data",
                    name
                ))),
            };
        }
        let Some(c) = node.complexes.get_mut(name) else {
            return Err(Error::not_found(EntityKind::Variable, join_path(self.path(), name)));
        };
        let VariableData::Complex { re, im } = data else {
            return Err(Error::schema(format!("'{}' is a complex variable, got real data", name)));
        };
        let (re_part, im_part) = c.parts_mut();
        re_part.check_fits(&re)?;
        im_part.check_fits(&im)?;
        re_part.assign(re)?;
        im_part.assign(im)
    }

    /// Append along the variable's growable first axis.
    pub fn append(&self, variable: &str, data: impl Into<VariableData>) -> Result<()> {
        let (owner, var) = self.resolve_located::<Variable>(variable)?;
        owner.append_local(var.name(), data.into())
    }

    fn append_local(&self, name: &str, data: VariableData) -> Result<()> {
        let mut node = self.inner.node.write();
        let mut backend = self.inner.backend.lock();
        let group = self.id();
        let mut parts: Vec<(&mut RealVariable, ArrayData)> = match (name, data) {
            (n, VariableData::Real(a)) => match node.reals.get_mut(n) {
                Some(v) => vec![(v, a)],
                None => return Err(Error::schema(format!("'{}' is not a real variable", n))),
            },
            (n, VariableData::Complex { re, im }) => match node.complexes.get_mut(n) {
                Some(c) => {
                    let (r, i) = c.parts_mut();
                    vec![(r, re), (i, im)]
                }
                None => return Err(Error::schema(format!("'{}' is not a complex variable", n))),
            },
        };

        for (var, array) in &parts {
            if !var.dimensions().first().is_some_and(Dimension::is_growable) {
                return Err(Error::schema(format!(
                    "cannot append to '{}': first axis is not growable",
                    var.name()
                )));
            }
            var.check_fits(array)?;
        }
        for (var, _) in parts.iter_mut() {
            var.flush(&mut **backend, group)?;
        }
        // Both parts of a complex variable share the growable dimension, so
        // the offset is taken once before either write extends it.
        let offset = parts
            .first()
            .map(|(var, _)| var.dimensions()[0].len())
            .unwrap_or(0);
        backend.end_define()?;
        for (var, array) in parts {
            let cached = var
                .data_state()
                .data()
                .filter(|d| d.shape().size(0) == Some(offset))
                .cloned();
            let mut start = vec![0; var.rank()];
            start[0] = offset;
            let count = array.shape();
            backend.write_array(group, var.id(), &start, count.sizes(), &array)?;
            var.refresh_lengths(&**backend)?;
            match cached.map(|c| c.concat(&array)) {
                Some(Ok(joined)) if joined.shape() == var.shape() => var.mark_loaded(joined),
                _ => var.invalidate(),
            }
            tracing::trace!("appended {} to '{}' at {}", count, var.name(), offset);
        }
        Ok(())
    }

    /// Write a local variable immediately and cache what was written.
    pub(crate) fn write_local(&self, name: &str, data: &VariableData) -> Result<()> {
        let mut node = self.inner.node.write();
        let mut backend = self.inner.backend.lock();
        let group = self.id();
        let parts: Vec<(&mut RealVariable, &ArrayData)> = match data {
            VariableData::Real(a) => match node.reals.get_mut(name) {
                Some(v) => vec![(v, a)],
                None => return Err(Error::not_found(EntityKind::Variable, join_path(self.path(), name))),
            },
            VariableData::Complex { re, im } => match node.complexes.get_mut(name) {
                Some(c) => {
                    let (r, i) = c.parts_mut();
                    vec![(r, re), (i, im)]
                }
                None => return Err(Error::not_found(EntityKind::Variable, join_path(self.path(), name))),
            },
        };
        for (var, array) in &parts {
            var.check_fits(array)?;
        }
        backend.end_define()?;
        for (var, array) in parts {
            backend.write_full(group, var.id(), array)?;
            var.refresh_lengths(&**backend)?;
            if array.shape() == var.shape() {
                var.mark_loaded(array.clone());
            } else {
                var.invalidate();
            }
        }
        Ok(())
    }

    /// Write every staged variable in this subtree. Returns how many arrays
    /// were written.
    pub fn flush(&self) -> Result<usize> {
        let mut written = 0;
        self.walk(&mut |group: &Group| {
            let mut node = group.inner.node.write();
            let mut backend = group.inner.backend.lock();
            for var in node.reals.iter_mut() {
                written += usize::from(var.flush(&mut **backend, group.id())?);
            }
            for c in node.complexes.iter_mut() {
                let (re, im) = c.parts_mut();
                written += usize::from(re.flush(&mut **backend, group.id())?);
                written += usize::from(im.flush(&mut **backend, group.id())?);
            }
            Ok(())
        })?;
        if written > 0 {
            tracing::debug!("flushed {} array(s) under {}", written, self.path());
        }
        Ok(written)
    }

    // ========================================================================
    // Blobs
    // ========================================================================

    /// Store an opaque byte string as a variable.
    pub fn add_blob(&self, name: &str, bytes: &[u8]) -> Result<Variable> {
        let dim_name = format!("{}{}", BLOB_DIM_PREFIX, name);
        {
            let node = self.inner.node.read();
            if node.has_variable(name) {
                return Err(Error::duplicate(EntityKind::Variable, name, self.path()));
            }
            if node.dimensions.contains(&dim_name) {
                return Err(Error::duplicate(EntityKind::Dimension, dim_name, self.path()));
            }
        }
        let dim = self.add_dimension(&dim_name, DimLength::Fixed(bytes.len()))?;
        let mut attrs = Attributes::new();
        attrs.set(Attributes::BLOB_KEY, 1i64);
        let var = self.define_real(name, ScalarType::UByte, vec![dim], attrs)?;
        let data = ArrayData::from_vec(&[bytes.len()], bytes.to_vec())?;
        self.write_local(name, &VariableData::Real(data))?;
        Ok(Variable::Real(var))
    }

    /// Bytes of a blob variable.
    pub fn blob(&self, name: &str) -> Result<Vec<u8>> {
        let (owner, var) = self.resolve_located::<Variable>(name)?;
        if !var.as_real().is_some_and(RealVariable::is_blob) {
            return Err(Error::schema(format!("variable '{}' is not a blob", var.name())));
        }
        match owner.load_local(var.name())? {
            VariableData::Real(a) => a
                .to_vec::<u8>()
                .ok_or_else(|| Error::schema(format!("blob '{}' is not stored as bytes", var.name()))),
            VariableData::Complex { .. } => Err(Error::schema(format!("variable '{}' is not a blob", var.name()))),
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("path", &self.path())
            .field("id", &self.id())
            .finish()
    }
}

/// Check fixed extents of `data` against `dims` before anything is defined.
fn check_extents(name: &str, dims: &[Dimension], data: &ArrayData) -> Result<()> {
    let shape = data.shape();
    if shape.rank() != dims.len() {
        return Err(Error::schema(format!(
            "variable '{}' has {} dimension(s), data has shape {}",
            name,
            dims.len(),
            shape
        )));
    }
    for (dim, &extent) in dims.iter().zip(shape.sizes()) {
        if dim.length().fixed().is_some_and(|n| n != extent) {
            return Err(Error::schema(format!(
                "variable '{}': data extent {} does not match dimension '{}' of length {}",
                name,
                extent,
                dim.name(),
                dim.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn empty_root() -> Group {
        let backend: Box<dyn StorageBackend> = Box::new(MemoryBackend::new());
        Group::load_root(Arc::new(Mutex::new(backend))).unwrap()
    }

    fn doubles(shape: &[usize]) -> ArrayData {
        let n = shape.iter().product();
        ArrayData::from_vec(shape, (0..n).map(|i| i as f64).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_root_identity() {
        let root = empty_root();
        assert!(root.is_root());
        assert_eq!(root.path(), "/");
        assert_eq!(root.name(), "");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_child_inherits_dimensions() {
        let root = empty_root();
        let time = root.add_dimension("time", DimLength::Growable).unwrap();
        let obs = root.add_group("obs").unwrap();
        assert!(obs.local_dimension("time").unwrap().same_as(&time));
        assert!(obs.own_dimensions().is_empty());

        // Added to the ancestor afterwards, still visible below.
        let x = root.add_dimension("x", DimLength::Fixed(3)).unwrap();
        let deep = obs.add_group("deep").unwrap();
        let late = root.add_dimension("late", DimLength::Fixed(1)).unwrap();
        assert!(obs.local_dimension("x").unwrap().same_as(&x));
        assert!(deep.local_dimension("late").unwrap().same_as(&late));

        assert!(matches!(
            obs.add_dimension("time", DimLength::Fixed(2)),
            Err(Error::DuplicateName { .. })
        ));
        assert_eq!(deep.parent().unwrap().path(), "/obs");
        assert!(deep.root().same_as(&root));
    }

    #[test]
    fn test_duplicate_group_name() {
        let root = empty_root();
        root.add_group("a").unwrap();
        let err = root.add_group("a").unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: EntityKind::Group, .. }));
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn test_growable_axis_must_come_first() {
        let root = empty_root();
        root.add_dimension("time", DimLength::Growable).unwrap();
        root.add_dimension("x", DimLength::Fixed(2)).unwrap();
        assert!(root.add_variable("ok", ScalarType::Double, &["time", "x"]).is_ok());
        let err = root
            .add_variable("bad", ScalarType::Double, &["x", "time"])
            .unwrap_err();
        assert!(matches!(err, Error::SchemaInconsistent(_)));
        assert!(root.local_variable("bad").is_none());
    }

    #[test]
    fn test_sibling_dimension_not_visible() {
        let root = empty_root();
        let a = root.add_group("a").unwrap();
        let b = root.add_group("b").unwrap();
        a.add_dimension("n", DimLength::Fixed(2)).unwrap();
        let err = b.add_variable("v", ScalarType::Int, &["/a/n"]).unwrap_err();
        assert!(matches!(err, Error::SchemaInconsistent(_)));
    }

    #[test]
    fn test_variable_with_data_roundtrip() {
        let root = empty_root();
        root.add_dimension("time", DimLength::Growable).unwrap();
        root.add_dimension("x", DimLength::Fixed(2)).unwrap();
        let var = root
            .add_variable_with_data("t", &["time", "x"], doubles(&[4, 2]))
            .unwrap();
        assert_eq!(var.shape().sizes(), &[4, 2]);
        assert_eq!(root.local_dimension("time").unwrap().len(), 4);
        assert_eq!(root.read("t").unwrap(), VariableData::Real(doubles(&[4, 2])));

        let err = root
            .add_variable_with_data("u", &["time", "x"], doubles(&[4, 3]))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaInconsistent(_)));
        assert!(root.local_variable("u").is_none());
    }

    #[test]
    fn test_append_and_slice() {
        let root = empty_root();
        root.add_dimension("time", DimLength::Growable).unwrap();
        root.add_dimension("x", DimLength::Fixed(2)).unwrap();
        root.add_variable("t", ScalarType::Double, &["time", "x"]).unwrap();
        root.append("t", doubles(&[2, 2])).unwrap();
        root.append("t", doubles(&[1, 2])).unwrap();
        assert_eq!(root.local_dimension("time").unwrap().len(), 3);

        let rows = root.read_slice(&["t"], "time", 3).unwrap();
        assert_eq!(rows[0].as_real().unwrap().to_vec::<f64>().unwrap(), vec![0.0, 1.0]);

        let err = root.read_slice(&["t"], "time", 4).unwrap_err();
        assert!(matches!(err, Error::InvalidTruncation(_)));
        let err = root.read_slice(&["t"], "time", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidTruncation(_)));
    }

    #[test]
    fn test_append_complex_extends_both_parts() {
        let root = empty_root();
        root.add_dimension("time", DimLength::Growable).unwrap();
        root.add_complex_variable("z", ScalarType::Double, &["time"]).unwrap();
        root.append("z", VariableData::Complex { re: doubles(&[2]), im: doubles(&[2]) })
            .unwrap();
        root.append("z", VariableData::Complex { re: doubles(&[1]), im: doubles(&[1]) })
            .unwrap();
        assert_eq!(root.local_dimension("time").unwrap().len(), 3);

        match root.read("z").unwrap() {
            VariableData::Complex { re, im } => {
                assert_eq!(re.to_vec::<f64>().unwrap(), vec![0.0, 1.0, 0.0]);
                assert_eq!(im.to_vec::<f64>().unwrap(), vec![0.0, 1.0, 0.0]);
            }
            other => panic!("expected complex data, got {:?}", other),
        }
    }

    #[test]
    fn test_put_and_flush() {
        let root = empty_root();
        root.add_dimension("x", DimLength::Fixed(3)).unwrap();
        root.add_variable("v", ScalarType::Double, &["x"]).unwrap();
        root.put_variable("v", doubles(&[3])).unwrap();
        let staged = root.local_variable("v").unwrap();
        assert!(staged.as_real().unwrap().data_state().is_modified());

        assert_eq!(root.flush().unwrap(), 1);
        assert_eq!(root.flush().unwrap(), 0);
        assert_eq!(root.read("v").unwrap(), VariableData::Real(doubles(&[3])));

        assert!(root.put_variable("v", doubles(&[4])).is_err());
    }

    #[test]
    fn test_complex_roundtrip() {
        let root = empty_root();
        root.add_dimension("x", DimLength::Fixed(2)).unwrap();
        let re = ArrayData::from_vec(&[2], vec![1.0f32, 2.0]).unwrap();
        let im = ArrayData::from_vec(&[2], vec![-1.0f32, -2.0]).unwrap();
        root.add_complex_variable_with_data("w", &["x"], re.clone(), im.clone())
            .unwrap();
        assert!(root.local_variable("w").unwrap().is_complex());
        assert!(root.local_variable("w.real").is_none());
        assert_eq!(root.read("w").unwrap(), VariableData::Complex { re, im });

        let err = root
            .add_complex_variable("n", ScalarType::Int, &["x"])
            .unwrap_err();
        assert!(matches!(err, Error::SchemaInconsistent(_)));
    }

    #[test]
    fn test_blob() {
        let root = empty_root();
        root.add_blob("payload", b"hello").unwrap();
        assert_eq!(root.blob("payload").unwrap(), b"hello".to_vec());
        assert!(root.add_blob("payload", b"again").is_err());

        root.add_dimension("x", DimLength::Fixed(1)).unwrap();
        root.add_variable("plain", ScalarType::UByte, &["x"]).unwrap();
        assert!(matches!(root.blob("plain"), Err(Error::SchemaInconsistent(_))));
    }

    #[test]
    fn test_attributes() {
        let root = empty_root();
        root.set_attribute("title", "demo").unwrap();
        root.set_attribute("title", "renamed").unwrap();
        assert_eq!(root.attribute("title"), Some(AttrValue::from("renamed")));
        assert_eq!(root.attributes().len(), 1);

        root.add_dimension("x", DimLength::Fixed(1)).unwrap();
        root.add_complex_variable("w", ScalarType::Double, &["x"]).unwrap();
        root.set_variable_attribute("w", "units", "m/s").unwrap();
        let w = root.local_variable("w").unwrap();
        assert_eq!(w.attributes().get("units"), Some(&AttrValue::from("m/s")));
        let real = w.as_complex().unwrap().real_part();
        assert!(real.attributes().contains("units"));
    }

    #[test]
    fn test_coordinate_variable() {
        let root = empty_root();
        let coords = ArrayData::from_vec(&[3], vec![10i32, 20, 30]).unwrap();
        let (dim, var) = root
            .add_dimension_with_data("lat", DimLength::Fixed(3), coords)
            .unwrap();
        assert_eq!(dim.len(), 3);
        assert_eq!(var.name(), "lat");
        assert!(root
            .add_dimension_with_data("bad", DimLength::Fixed(2), doubles(&[3]))
            .is_err());
        assert!(root.local_dimension("bad").is_none());
    }
}
