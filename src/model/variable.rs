//! Real and complex variables.
//!
//! A variable's payload is loaded lazily. [`DataState`] tracks whether the
//! in-memory copy is absent, mirrors the container, or holds changes that
//! still have to be flushed.

use crate::core::{
    ArrayData, AttrTarget, Attributes, GroupId, StorageBackend, StorageBackendExt, VarId,
};
use crate::util::{AttrValue, Error, Result, ScalarType, Shape};

use super::dimension::Dimension;

/// In-memory state of a variable's payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DataState {
    /// Nothing loaded; the next read goes to the backend.
    #[default]
    Absent,
    /// Matches what the backend holds.
    Loaded(ArrayData),
    /// Assigned in memory and not yet written.
    Modified(ArrayData),
}

impl DataState {
    pub fn data(&self) -> Option<&ArrayData> {
        match self {
            Self::Absent => None,
            Self::Loaded(d) | Self::Modified(d) => Some(d),
        }
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, Self::Modified(_))
    }
}

/// Variable backed by exactly one stored array.
#[derive(Clone, Debug)]
pub struct RealVariable {
    name: String,
    id: VarId,
    dimensions: Vec<Dimension>,
    scalar_type: ScalarType,
    attributes: Attributes,
    state: DataState,
}

impl RealVariable {
    pub(crate) fn new(
        name: impl Into<String>,
        id: VarId,
        dimensions: Vec<Dimension>,
        scalar_type: ScalarType,
        attributes: Attributes,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            dimensions,
            scalar_type,
            attributes,
            state: DataState::Absent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(Dimension::name).collect()
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Current extents of the variable's dimensions.
    pub fn shape(&self) -> Shape {
        self.dimensions.iter().map(Dimension::len).collect()
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_blob(&self) -> bool {
        self.attributes.is_blob()
    }

    pub fn data_state(&self) -> &DataState {
        &self.state
    }

    /// Axis of `dim` in this variable, if it spans it.
    pub fn axis_of(&self, dim: &Dimension) -> Option<usize> {
        self.dimensions.iter().position(|d| d.same_as(dim))
    }

    /// Payload, reading it from the backend on first access.
    pub(crate) fn load(&mut self, backend: &dyn StorageBackend, group: GroupId) -> Result<ArrayData> {
        if let Some(data) = self.state.data() {
            return Ok(data.clone());
        }
        let data = backend.read_array(group, self.id)?;
        tracing::trace!("loaded '{}' {}", self.name, data.shape());
        self.state = DataState::Loaded(data.clone());
        Ok(data)
    }

    /// Sub-array at one 0-based position along `axis`, from the cache when
    /// the payload is already in memory.
    pub(crate) fn load_slice(
        &self,
        backend: &dyn StorageBackend,
        group: GroupId,
        axis: usize,
        position: usize,
    ) -> Result<ArrayData> {
        match self.state.data() {
            Some(data) => data.index_axis(axis, position),
            None => backend.read_array_slice(group, self.id, axis, position),
        }
    }

    /// Stage `data` for the next flush after checking it fits the dimensions.
    pub(crate) fn assign(&mut self, data: ArrayData) -> Result<()> {
        self.check_fits(&data)?;
        self.state = DataState::Modified(data);
        Ok(())
    }

    pub(crate) fn mark_loaded(&mut self, data: ArrayData) {
        self.state = DataState::Loaded(data);
    }

    /// Drop the cached payload so the next read goes to the backend.
    pub(crate) fn invalidate(&mut self) {
        self.state = DataState::Absent;
    }

    /// Write staged changes. Returns true if anything was written.
    pub(crate) fn flush(&mut self, backend: &mut dyn StorageBackend, group: GroupId) -> Result<bool> {
        let DataState::Modified(data) = &self.state else {
            return Ok(false);
        };
        backend.end_define()?;
        backend.write_full(group, self.id, data)?;
        self.refresh_lengths(backend)?;
        let data = data.clone();
        self.state = if data.shape() == self.shape() {
            DataState::Loaded(data)
        } else {
            DataState::Absent
        };
        Ok(true)
    }

    /// Pick up growable extents after a write.
    pub(crate) fn refresh_lengths(&self, backend: &dyn StorageBackend) -> Result<()> {
        for dim in self.dimensions.iter().filter(|d| d.is_growable()) {
            dim.observe_len(backend.dimension_length(dim.id())?);
        }
        Ok(())
    }

    /// Check element type, rank and fixed extents of `data` against this
    /// variable. Growable axes accept any extent.
    pub(crate) fn check_fits(&self, data: &ArrayData) -> Result<()> {
        if data.scalar_type() != self.scalar_type {
            return Err(Error::schema(format!(
                "variable '{}' is {}, got {} data",
                self.name,
                self.scalar_type,
                data.scalar_type()
            )));
        }
        let shape = data.shape();
        if shape.rank() != self.rank() {
            return Err(Error::schema(format!(
                "variable '{}' has {} dimension(s), data has shape {}",
                self.name,
                self.rank(),
                shape
            )));
        }
        for (dim, &extent) in self.dimensions.iter().zip(shape.sizes()) {
            if let Some(n) = dim.length().fixed() {
                if extent != n {
                    return Err(Error::schema(format!(
                        "variable '{}': data extent {} does not match dimension '{}' of length {}",
                        self.name,
                        extent,
                        dim.name(),
                        n
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn put_attribute(
        &mut self,
        backend: &mut dyn StorageBackend,
        group: GroupId,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        backend.put_attribute(group, AttrTarget::Variable(self.id), name, &value)?;
        self.attributes.set(name, value);
        Ok(())
    }
}

/// Pair of real variables presented as one complex-valued variable.
#[derive(Clone, Debug)]
pub struct ComplexVariable {
    name: String,
    attributes: Attributes,
    real: RealVariable,
    imag: RealVariable,
}

impl ComplexVariable {
    /// Join two parts, checking they agree on type and dimensions.
    pub(crate) fn pair(name: impl Into<String>, real: RealVariable, imag: RealVariable) -> Result<Self> {
        let name = name.into();
        if real.scalar_type() != imag.scalar_type() {
            return Err(Error::schema(format!(
                "complex variable '{}': real part is {}, imaginary part is {}",
                name,
                real.scalar_type(),
                imag.scalar_type()
            )));
        }
        if !real.scalar_type().supports_complex() {
            return Err(Error::schema(format!(
                "complex variable '{}' cannot use element type {}",
                name,
                real.scalar_type()
            )));
        }
        let same_dims = real.dimensions().len() == imag.dimensions().len()
            && real
                .dimensions()
                .iter()
                .zip(imag.dimensions())
                .all(|(a, b)| a.same_as(b));
        if !same_dims {
            return Err(Error::schema(format!(
                "complex variable '{}': parts span different dimensions ({:?} vs {:?})",
                name,
                real.dimension_names(),
                imag.dimension_names()
            )));
        }
        let attributes = real
            .attributes()
            .user_entries()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Ok(Self {
            name,
            attributes,
            real,
            imag,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the real part.
    pub fn id(&self) -> VarId {
        self.real.id()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        self.real.dimensions()
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.real.scalar_type()
    }

    /// User attributes, stored on the real part.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn shape(&self) -> Shape {
        self.real.shape()
    }

    pub fn real_part(&self) -> &RealVariable {
        &self.real
    }

    pub fn imag_part(&self) -> &RealVariable {
        &self.imag
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut RealVariable, &mut RealVariable) {
        (&mut self.real, &mut self.imag)
    }

    pub(crate) fn put_attribute(
        &mut self,
        backend: &mut dyn StorageBackend,
        group: GroupId,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        self.real.put_attribute(backend, group, name, value.clone())?;
        self.attributes.set(name, value);
        Ok(())
    }
}

/// A variable as listed by a group.
#[derive(Clone, Debug)]
pub enum Variable {
    Real(RealVariable),
    Complex(ComplexVariable),
}

impl Variable {
    pub fn name(&self) -> &str {
        match self {
            Self::Real(v) => v.name(),
            Self::Complex(v) => v.name(),
        }
    }

    pub fn id(&self) -> VarId {
        match self {
            Self::Real(v) => v.id(),
            Self::Complex(v) => v.id(),
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        match self {
            Self::Real(v) => v.dimensions(),
            Self::Complex(v) => v.dimensions(),
        }
    }

    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions().iter().map(Dimension::name).collect()
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Real(v) => v.scalar_type(),
            Self::Complex(v) => v.scalar_type(),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Self::Real(v) => v.attributes(),
            Self::Complex(v) => v.attributes(),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Real(v) => v.shape(),
            Self::Complex(v) => v.shape(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex(_))
    }

    pub fn as_real(&self) -> Option<&RealVariable> {
        match self {
            Self::Real(v) => Some(v),
            Self::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexVariable> {
        match self {
            Self::Complex(v) => Some(v),
            Self::Real(_) => None,
        }
    }

    /// Axis of `dim` in this variable, if it spans it.
    pub fn axis_of(&self, dim: &Dimension) -> Option<usize> {
        self.dimensions().iter().position(|d| d.same_as(dim))
    }

    /// Whether two variables declare the same layout (kind, type, dimension names).
    pub fn same_layout(&self, other: &Variable) -> bool {
        self.is_complex() == other.is_complex()
            && self.scalar_type() == other.scalar_type()
            && self.dimension_names() == other.dimension_names()
    }
}

/// Payload of a real or complex variable.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableData {
    Real(ArrayData),
    Complex { re: ArrayData, im: ArrayData },
}

impl VariableData {
    pub fn complex(re: ArrayData, im: ArrayData) -> Result<Self> {
        if re.scalar_type() != im.scalar_type() || re.shape() != im.shape() {
            return Err(Error::schema(format!(
                "complex parts disagree: {} {} vs {} {}",
                re.scalar_type(),
                re.shape(),
                im.scalar_type(),
                im.shape()
            )));
        }
        Ok(Self::Complex { re, im })
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Real(a) => a.shape(),
            Self::Complex { re, .. } => re.shape(),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Real(a) => a.scalar_type(),
            Self::Complex { re, .. } => re.scalar_type(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex { .. })
    }

    pub fn as_real(&self) -> Option<&ArrayData> {
        match self {
            Self::Real(a) => Some(a),
            Self::Complex { .. } => None,
        }
    }

    /// Keep the given 0-based positions along `axis`.
    pub fn select(&self, axis: usize, positions: &[usize]) -> Result<Self> {
        Ok(match self {
            Self::Real(a) => Self::Real(a.select(axis, positions)?),
            Self::Complex { re, im } => Self::Complex {
                re: re.select(axis, positions)?,
                im: im.select(axis, positions)?,
            },
        })
    }

    /// Sub-array at one 0-based position along `axis`.
    pub fn index_axis(&self, axis: usize, position: usize) -> Result<Self> {
        Ok(match self {
            Self::Real(a) => Self::Real(a.index_axis(axis, position)?),
            Self::Complex { re, im } => Self::Complex {
                re: re.index_axis(axis, position)?,
                im: im.index_axis(axis, position)?,
            },
        })
    }
}

impl From<ArrayData> for VariableData {
    fn from(a: ArrayData) -> Self {
        Self::Real(a)
    }
}
