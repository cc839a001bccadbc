//! Scalar element types that variables can be declared with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a variable.
///
/// Names follow the CDL spelling (`byte`, `ubyte`, `short`, ...), which is also
/// how the type is persisted by [`MemoryBackend`](crate::backend::MemoryBackend).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ScalarType {
    /// Signed 8-bit integer
    Byte = 1,
    /// Unsigned 8-bit integer
    UByte = 2,
    /// Signed 16-bit integer
    Short = 3,
    /// Unsigned 16-bit integer
    UShort = 4,
    /// Signed 32-bit integer
    Int = 5,
    /// Unsigned 32-bit integer
    UInt = 6,
    /// Signed 64-bit integer
    Int64 = 7,
    /// Unsigned 64-bit integer
    UInt64 = 8,
    /// 32-bit IEEE float
    Float = 9,
    /// 64-bit IEEE float
    Double = 10,
    /// Variable-length UTF-8 string
    String = 11,
}

impl ScalarType {
    pub const ALL: [ScalarType; 11] = [
        Self::Byte,
        Self::UByte,
        Self::Short,
        Self::UShort,
        Self::Int,
        Self::UInt,
        Self::Int64,
        Self::UInt64,
        Self::Float,
        Self::Double,
        Self::String,
    ];

    /// Size in bytes of one element. Strings report the size of a pointer.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Byte | Self::UByte => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Int64 | Self::UInt64 | Self::Double => 8,
            Self::String => std::mem::size_of::<usize>(),
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::UByte => "ubyte",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    /// Parse a type from its CDL name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::UByte
                | Self::Short
                | Self::UShort
                | Self::Int
                | Self::UInt
                | Self::Int64
                | Self::UInt64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Complex variables are only meaningful over floating point parts.
    #[inline]
    pub const fn supports_complex(self) -> bool {
        self.is_float()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
