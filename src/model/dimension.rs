//! Shared dimension handles.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::{DimId, DimLength, DimensionHeader};

struct DimensionData {
    name: String,
    id: DimId,
    length: DimLength,
    current_len: AtomicUsize,
    group_path: String,
}

/// A named axis.
///
/// Cloning is cheap and yields another reference to the same dimension: the
/// group that defines it and every descendant that inherits it share one
/// `Dimension`, so a growable dimension's length is seen everywhere at once.
#[derive(Clone)]
pub struct Dimension {
    inner: Arc<DimensionData>,
}

impl Dimension {
    pub(crate) fn new(
        name: impl Into<String>,
        id: DimId,
        length: DimLength,
        current_len: usize,
        group_path: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(DimensionData {
                name: name.into(),
                id,
                length,
                current_len: AtomicUsize::new(current_len),
                group_path: group_path.into(),
            }),
        }
    }

    pub(crate) fn from_header(header: &DimensionHeader, group_path: &str) -> Self {
        Self::new(
            header.name.clone(),
            header.id,
            header.length,
            header.current_len,
            group_path,
        )
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn id(&self) -> DimId {
        self.inner.id
    }

    /// Declared length.
    pub fn length(&self) -> DimLength {
        self.inner.length
    }

    pub fn is_growable(&self) -> bool {
        self.inner.length.is_growable()
    }

    /// Current extent.
    pub fn len(&self) -> usize {
        self.inner.current_len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the group that defines this dimension.
    pub fn group_path(&self) -> &str {
        &self.inner.group_path
    }

    /// Absolute path of the dimension, e.g. `/obs/time`.
    pub fn full_path(&self) -> String {
        join_path(&self.inner.group_path, &self.inner.name)
    }

    /// True when both handles refer to the same dimension.
    pub fn same_as(&self, other: &Dimension) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Growable extents only ever increase.
    pub(crate) fn observe_len(&self, len: usize) {
        if self.is_growable() {
            self.inner.current_len.fetch_max(len, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dimension")
            .field("path", &self.full_path())
            .field("length", &self.length())
            .field("len", &self.len())
            .finish()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length() {
            DimLength::Growable => write!(f, "{} = UNLIMITED ; // ({} currently)", self.name(), self.len()),
            DimLength::Fixed(n) => write!(f, "{} = {} ;", self.name(), n),
        }
    }
}

/// Join a group path and a leaf name.
pub(crate) fn join_path(group_path: &str, name: &str) -> String {
    if group_path.ends_with('/') {
        format!("{}{}", group_path, name)
    } else {
        format!("{}/{}", group_path, name)
    }
}
