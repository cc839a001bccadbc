//! Backend-level identifiers and headers.
//!
//! Headers describe dimensions and variables the way the storage backend
//! reports them, before the model turns them into shared handles.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Attributes;
use crate::util::{AttrValue, ScalarType};

macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

backend_id!(
    /// Backend identifier of a group.
    GroupId, "g"
);
backend_id!(
    /// Backend identifier of a dimension.
    DimId, "d"
);
backend_id!(
    /// Backend identifier of a variable.
    VarId, "v"
);

/// Declared length of a dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimLength {
    Fixed(usize),
    /// Unlimited; grows as data is appended along it.
    Growable,
}

impl DimLength {
    #[inline]
    pub const fn is_growable(self) -> bool {
        matches!(self, Self::Growable)
    }

    /// Declared length, `None` for growable dimensions.
    pub const fn fixed(self) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(n),
            Self::Growable => None,
        }
    }
}

impl fmt::Display for DimLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{}", n),
            Self::Growable => write!(f, "UNLIMITED"),
        }
    }
}

/// Where an attribute lives: on the group itself or on one of its variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrTarget {
    Global,
    Variable(VarId),
}

/// Dimension as reported by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionHeader {
    pub id: DimId,
    pub name: String,
    pub length: DimLength,
    /// Current extent; equals the declared length for fixed dimensions.
    pub current_len: usize,
}

/// Variable as reported by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableHeader {
    pub id: VarId,
    pub name: String,
    pub scalar_type: ScalarType,
    /// Dimension ids in axis order; may reference ancestor groups.
    pub dim_ids: Vec<DimId>,
    pub attributes: Attributes,
}

/// Everything the backend knows about one group, used when loading.
#[derive(Clone, Debug, Default)]
pub struct GroupListing {
    /// Dimensions defined directly in the group.
    pub dimensions: Vec<DimensionHeader>,
    pub variables: Vec<VariableHeader>,
    pub attributes: Vec<(String, AttrValue)>,
    pub child_groups: Vec<(GroupId, String)>,
}
