//! Array shapes.

use smallvec::SmallVec;

/// Extent of each axis of an array, outermost first.
///
/// An empty shape describes a scalar (rank 0).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Extent of one axis, `None` if the axis is out of range.
    pub fn size(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements.
    pub fn num_points(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Set the extent of an axis, extending with ones if necessary.
    pub fn set_size(&mut self, axis: usize, size: usize) {
        while self.dims.len() <= axis {
            self.dims.push(1);
        }
        self.dims[axis] = size;
    }

    pub fn push(&mut self, size: usize) {
        self.dims.push(size);
    }

    /// Same shape with `axis` replaced by `size`.
    pub fn with_size(&self, axis: usize, size: usize) -> Self {
        let mut out = self.clone();
        out.set_size(axis, size);
        out
    }
}

impl From<&[usize]> for Shape {
    fn from(sizes: &[usize]) -> Self {
        Self::from_slice(sizes)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Self { dims: SmallVec::from_vec(v) }
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self { dims: iter.into_iter().collect() }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}
