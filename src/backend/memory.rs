//! In-memory storage backend with optional JSON file persistence.
//!
//! The whole container lives in memory. File-backed handles write a JSON
//! document on [`sync`](StorageBackend::sync) and [`close`](StorageBackend::close),
//! but only once the container has been committed with
//! [`end_define`](StorageBackend::end_define).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{
    ArrayData, AttrTarget, DimId, DimLength, DimensionHeader, GroupId, GroupListing,
    StorageBackend, VarId, VariableHeader,
};
use crate::util::{AttrValue, Error, Result, ScalarType};

const FORMAT_NAME: &str = "nctree";
const FORMAT_VERSION: u32 = 1;

/// Options used when creating a new container.
#[derive(Clone, Debug)]
pub struct FormatOptions {
    /// Indent the persisted JSON document.
    pub pretty: bool,
    /// Record the library version on the root group.
    pub stamp_provenance: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            stamp_provenance: true,
        }
    }
}

impl FormatOptions {
    /// Compact JSON without provenance, handy for tests and diffs.
    pub fn compact() -> Self {
        Self {
            pretty: false,
            stamp_provenance: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredGroup {
    name: String,
    parent: Option<GroupId>,
    attributes: Vec<(String, AttrValue)>,
    dims: Vec<DimId>,
    vars: Vec<VarId>,
    children: Vec<GroupId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredDim {
    group: GroupId,
    name: String,
    length: DimLength,
    current_len: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredVar {
    group: GroupId,
    name: String,
    scalar_type: ScalarType,
    dims: Vec<DimId>,
    attributes: Vec<(String, AttrValue)>,
    data: Option<ArrayData>,
}

/// Id-indexed tables; ids are positions.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Tables {
    groups: Vec<StoredGroup>,
    dims: Vec<StoredDim>,
    vars: Vec<StoredVar>,
}

impl Tables {
    fn with_root() -> Self {
        Self {
            groups: vec![StoredGroup {
                name: String::new(),
                parent: None,
                attributes: Vec::new(),
                dims: Vec::new(),
                vars: Vec::new(),
                children: Vec::new(),
            }],
            dims: Vec::new(),
            vars: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ContainerFile {
    format: String,
    version: u32,
    tables: Tables,
}

/// Reference [`StorageBackend`] implementation.
pub struct MemoryBackend {
    path: Option<PathBuf>,
    options: FormatOptions,
    writable: bool,
    committed: bool,
    dirty: bool,
    closed: bool,
    tables: Tables,
}

impl MemoryBackend {
    /// Ephemeral writable container that is never persisted.
    pub fn new() -> Self {
        Self {
            path: None,
            options: FormatOptions::default(),
            writable: true,
            committed: false,
            dirty: false,
            closed: false,
            tables: Tables::with_root(),
        }
    }

    /// New container persisted at `path`. Nothing is written before the first
    /// committed sync; an existing file is replaced at that point.
    pub fn create<P: AsRef<Path>>(path: P, options: FormatOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                return Err(Error::backend(format!(
                    "directory {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            options,
            ..Self::new()
        })
    }

    /// Load an existing container.
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let file: ContainerFile = serde_json::from_str(&text)?;
        if file.format != FORMAT_NAME {
            return Err(Error::backend(format!(
                "{} is not an nctree container",
                path.display()
            )));
        }
        if file.version != FORMAT_VERSION {
            return Err(Error::backend(format!(
                "unsupported container version {}",
                file.version
            )));
        }
        if file.tables.groups.is_empty() {
            return Err(Error::backend("container has no root group"));
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            options: FormatOptions::default(),
            writable,
            committed: true,
            dirty: false,
            closed: false,
            tables: file.tables,
        })
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::AlreadyClosed);
        }
        Ok(())
    }

    fn check_writable(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        self.dirty = true;
        Ok(())
    }

    fn group(&self, id: GroupId) -> Result<&StoredGroup> {
        self.tables
            .groups
            .get(id.0 as usize)
            .ok_or_else(|| Error::backend(format!("unknown group id {}", id)))
    }

    fn dim(&self, id: DimId) -> Result<&StoredDim> {
        self.tables
            .dims
            .get(id.0 as usize)
            .ok_or_else(|| Error::backend(format!("unknown dimension id {}", id)))
    }

    /// Variable lookup that also checks the variable belongs to `group`.
    fn var(&self, group: GroupId, id: VarId) -> Result<&StoredVar> {
        match self.tables.vars.get(id.0 as usize) {
            Some(var) if var.group == group => Ok(var),
            _ => Err(Error::backend(format!(
                "unknown variable id {} in group {}",
                id, group
            ))),
        }
    }

    fn is_ancestor_or_self(&self, ancestor: GroupId, mut group: GroupId) -> bool {
        loop {
            if group == ancestor {
                return true;
            }
            match self.tables.groups.get(group.0 as usize).and_then(|g| g.parent) {
                Some(parent) => group = parent,
                None => return false,
            }
        }
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::backend(format!("invalid name '{}'", name)));
        }
        Ok(())
    }

    /// Shape implied by the variable's dimensions at their current extents.
    fn declared_shape(&self, var: &StoredVar) -> Result<Vec<usize>> {
        var.dims
            .iter()
            .map(|&d| self.dim(d).map(|d| d.current_len))
            .collect()
    }

    fn attrs_mut(
        &mut self,
        group: GroupId,
        target: AttrTarget,
    ) -> Result<&mut Vec<(String, AttrValue)>> {
        match target {
            AttrTarget::Global => {
                self.group(group)?;
                Ok(&mut self.tables.groups[group.0 as usize].attributes)
            }
            AttrTarget::Variable(var) => {
                self.var(group, var)?;
                Ok(&mut self.tables.vars[var.0 as usize].attributes)
            }
        }
    }

    fn attrs(&self, group: GroupId, target: AttrTarget) -> Result<&Vec<(String, AttrValue)>> {
        match target {
            AttrTarget::Global => Ok(&self.group(group)?.attributes),
            AttrTarget::Variable(var) => Ok(&self.var(group, var)?.attributes),
        }
    }

    fn persist(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let file = ContainerFile {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION,
            tables: self.tables.clone(),
        };
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&file)?
        } else {
            serde_json::to_string(&file)?
        };

        // Write beside the target and rename so readers never see a partial file.
        let tmp = path.with_extension("tmp");
        {
            let mut out = fs::File::create(&tmp)?;
            out.write_all(text.as_bytes())?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        tracing::debug!("persisted container to {}", path.display());
        self.dirty = false;
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn root(&self) -> GroupId {
        GroupId(0)
    }

    fn define_dimension(&mut self, group: GroupId, name: &str, length: DimLength) -> Result<DimId> {
        self.check_writable()?;
        Self::check_name(name)?;
        let owner = self.group(group)?;
        if owner.dims.iter().any(|&d| self.tables.dims[d.0 as usize].name == name) {
            return Err(Error::backend(format!(
                "dimension '{}' already defined in group {}",
                name, group
            )));
        }

        let id = DimId(self.tables.dims.len() as u32);
        self.tables.dims.push(StoredDim {
            group,
            name: name.to_string(),
            length,
            current_len: length.fixed().unwrap_or(0),
        });
        self.tables.groups[group.0 as usize].dims.push(id);
        Ok(id)
    }

    fn define_variable(
        &mut self,
        group: GroupId,
        name: &str,
        scalar_type: ScalarType,
        dims: &[DimId],
    ) -> Result<VarId> {
        self.check_writable()?;
        Self::check_name(name)?;
        let owner = self.group(group)?;
        if owner.vars.iter().any(|&v| self.tables.vars[v.0 as usize].name == name) {
            return Err(Error::backend(format!(
                "variable '{}' already defined in group {}",
                name, group
            )));
        }
        for &d in dims {
            let dim = self.dim(d)?;
            if !self.is_ancestor_or_self(dim.group, group) {
                return Err(Error::backend(format!(
                    "dimension {} is not visible from group {}",
                    d, group
                )));
            }
        }

        let id = VarId(self.tables.vars.len() as u32);
        self.tables.vars.push(StoredVar {
            group,
            name: name.to_string(),
            scalar_type,
            dims: dims.to_vec(),
            attributes: Vec::new(),
            data: None,
        });
        self.tables.groups[group.0 as usize].vars.push(id);
        Ok(id)
    }

    fn define_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId> {
        self.check_writable()?;
        Self::check_name(name)?;
        let owner = self.group(parent)?;
        if owner
            .children
            .iter()
            .any(|&g| self.tables.groups[g.0 as usize].name == name)
        {
            return Err(Error::backend(format!(
                "group '{}' already defined in group {}",
                name, parent
            )));
        }

        let id = GroupId(self.tables.groups.len() as u32);
        self.tables.groups.push(StoredGroup {
            name: name.to_string(),
            parent: Some(parent),
            attributes: Vec::new(),
            dims: Vec::new(),
            vars: Vec::new(),
            children: Vec::new(),
        });
        self.tables.groups[parent.0 as usize].children.push(id);
        Ok(id)
    }

    fn end_define(&mut self) -> Result<()> {
        self.check_open()?;
        self.committed = true;
        Ok(())
    }

    fn get_attribute(
        &self,
        group: GroupId,
        target: AttrTarget,
        name: &str,
    ) -> Result<Option<AttrValue>> {
        self.check_open()?;
        Ok(self
            .attrs(group, target)?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    fn put_attribute(
        &mut self,
        group: GroupId,
        target: AttrTarget,
        name: &str,
        value: &AttrValue,
    ) -> Result<()> {
        self.check_writable()?;
        if name.is_empty() {
            return Err(Error::backend("empty attribute name"));
        }
        let attrs = self.attrs_mut(group, target)?;
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.clone(),
            None => attrs.push((name.to_string(), value.clone())),
        }
        Ok(())
    }

    fn attribute_names(&self, group: GroupId, target: AttrTarget) -> Result<Vec<String>> {
        self.check_open()?;
        Ok(self.attrs(group, target)?.iter().map(|(k, _)| k.clone()).collect())
    }

    fn read_array(&self, group: GroupId, var: VarId) -> Result<ArrayData> {
        self.check_open()?;
        let stored = self.var(group, var)?;
        let shape = self.declared_shape(stored)?;
        let mut out = ArrayData::zeros(stored.scalar_type, &shape);
        if let Some(data) = &stored.data {
            // Unwritten cells along a growable axis read back as defaults.
            out.assign_region(&vec![0; shape.len()], data)?;
        }
        Ok(out)
    }

    fn read_array_slice(
        &self,
        group: GroupId,
        var: VarId,
        axis: usize,
        position: usize,
    ) -> Result<ArrayData> {
        self.read_array(group, var)?.index_axis(axis, position)
    }

    fn write_array(
        &mut self,
        group: GroupId,
        var: VarId,
        start: &[usize],
        count: &[usize],
        data: &ArrayData,
    ) -> Result<()> {
        self.check_writable()?;
        let stored = self.var(group, var)?;
        if data.scalar_type() != stored.scalar_type {
            return Err(Error::schema(format!(
                "variable '{}' is {}, got {} data",
                stored.name,
                stored.scalar_type,
                data.scalar_type()
            )));
        }
        if count != data.shape().sizes() || start.len() != stored.dims.len() {
            return Err(Error::schema(format!(
                "write to '{}' with start {:?} count {:?} does not match data {} over {} dimension(s)",
                stored.name,
                start,
                count,
                data.shape(),
                stored.dims.len()
            )));
        }
        for (axis, &d) in stored.dims.iter().enumerate() {
            let dim = self.dim(d)?;
            if let DimLength::Fixed(n) = dim.length {
                if start[axis] + count[axis] > n {
                    return Err(Error::backend(format!(
                        "write to '{}' exceeds fixed dimension '{}' of length {}",
                        stored.name, dim.name, n
                    )));
                }
            }
        }

        let shape = self.declared_shape(stored)?;
        let scalar_type = stored.scalar_type;
        let dims = stored.dims.clone();
        let slot = &mut self.tables.vars[var.0 as usize].data;
        let buffer = slot.get_or_insert_with(|| ArrayData::zeros(scalar_type, &shape));
        buffer.assign_region(start, data)?;
        let extents = buffer.shape();

        for (axis, d) in dims.into_iter().enumerate() {
            let dim = &mut self.tables.dims[d.0 as usize];
            if dim.length.is_growable() {
                dim.current_len = dim.current_len.max(extents.sizes()[axis]);
            }
        }
        tracing::trace!("wrote {} at {:?} into {}", data.shape(), start, var);
        Ok(())
    }

    fn dimension_length(&self, dim: DimId) -> Result<usize> {
        self.check_open()?;
        Ok(self.dim(dim)?.current_len)
    }

    fn inspect(&self, group: GroupId) -> Result<GroupListing> {
        self.check_open()?;
        let g = self.group(group)?;
        let dimensions = g
            .dims
            .iter()
            .map(|&id| {
                let d = &self.tables.dims[id.0 as usize];
                DimensionHeader {
                    id,
                    name: d.name.clone(),
                    length: d.length,
                    current_len: d.current_len,
                }
            })
            .collect();
        let variables = g
            .vars
            .iter()
            .map(|&id| {
                let v = &self.tables.vars[id.0 as usize];
                VariableHeader {
                    id,
                    name: v.name.clone(),
                    scalar_type: v.scalar_type,
                    dim_ids: v.dims.clone(),
                    attributes: v.attributes.iter().cloned().collect(),
                }
            })
            .collect();
        let child_groups = g
            .children
            .iter()
            .map(|&id| (id, self.tables.groups[id.0 as usize].name.clone()))
            .collect();
        Ok(GroupListing {
            dimensions,
            variables,
            attributes: g.attributes.clone(),
            child_groups,
        })
    }

    fn sync(&mut self) -> Result<()> {
        self.check_open()?;
        if self.writable && self.committed && self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.check_open()?;
        let result = self.sync();
        self.closed = true;
        if !self.committed && self.path.is_some() {
            tracing::warn!("closing uncommitted container, nothing was written");
        }
        result
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
