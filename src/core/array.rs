//! Typed n-dimensional array payloads.
//!
//! [`ArrayData`] holds one dynamic-rank `ndarray` array per scalar type. It is
//! what the storage backend reads and writes, and what the model hands back to
//! callers.

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};

use crate::util::{Error, Result, ScalarType, Shape};

/// Array payload of a variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "StoredArray", try_from = "StoredArray")]
pub enum ArrayData {
    Byte(ArrayD<i8>),
    UByte(ArrayD<u8>),
    Short(ArrayD<i16>),
    UShort(ArrayD<u16>),
    Int(ArrayD<i32>),
    UInt(ArrayD<u32>),
    Int64(ArrayD<i64>),
    UInt64(ArrayD<u64>),
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
    Text(ArrayD<String>),
}

/// Evaluate `$body` with `$arr` bound to the inner array, whatever its type.
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayData::Byte($arr) => $body,
            ArrayData::UByte($arr) => $body,
            ArrayData::Short($arr) => $body,
            ArrayData::UShort($arr) => $body,
            ArrayData::Int($arr) => $body,
            ArrayData::UInt($arr) => $body,
            ArrayData::Int64($arr) => $body,
            ArrayData::UInt64($arr) => $body,
            ArrayData::Float($arr) => $body,
            ArrayData::Double($arr) => $body,
            ArrayData::Text($arr) => $body,
        }
    };
}

/// Like `with_array!` but rewraps the resulting array in the same variant.
macro_rules! map_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayData::Byte($arr) => ArrayData::Byte($body),
            ArrayData::UByte($arr) => ArrayData::UByte($body),
            ArrayData::Short($arr) => ArrayData::Short($body),
            ArrayData::UShort($arr) => ArrayData::UShort($body),
            ArrayData::Int($arr) => ArrayData::Int($body),
            ArrayData::UInt($arr) => ArrayData::UInt($body),
            ArrayData::Int64($arr) => ArrayData::Int64($body),
            ArrayData::UInt64($arr) => ArrayData::UInt64($body),
            ArrayData::Float($arr) => ArrayData::Float($body),
            ArrayData::Double($arr) => ArrayData::Double($body),
            ArrayData::Text($arr) => ArrayData::Text($body),
        }
    };
}

impl ArrayData {
    /// Array of `shape` filled with the type's default value.
    pub fn zeros(scalar_type: ScalarType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match scalar_type {
            ScalarType::Byte => Self::Byte(ArrayD::default(dim)),
            ScalarType::UByte => Self::UByte(ArrayD::default(dim)),
            ScalarType::Short => Self::Short(ArrayD::default(dim)),
            ScalarType::UShort => Self::UShort(ArrayD::default(dim)),
            ScalarType::Int => Self::Int(ArrayD::default(dim)),
            ScalarType::UInt => Self::UInt(ArrayD::default(dim)),
            ScalarType::Int64 => Self::Int64(ArrayD::default(dim)),
            ScalarType::UInt64 => Self::UInt64(ArrayD::default(dim)),
            ScalarType::Float => Self::Float(ArrayD::default(dim)),
            ScalarType::Double => Self::Double(ArrayD::default(dim)),
            ScalarType::String => Self::Text(ArrayD::default(dim)),
        }
    }

    /// Build from a flat vector in row-major order.
    pub fn from_vec<T: NcScalar>(shape: &[usize], values: Vec<T>) -> Result<Self> {
        let len = values.len();
        let array = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| {
            Error::schema(format!(
                "{} values do not fill shape {}",
                len,
                Shape::from_slice(shape)
            ))
        })?;
        Ok(T::wrap(array))
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Byte(_) => ScalarType::Byte,
            Self::UByte(_) => ScalarType::UByte,
            Self::Short(_) => ScalarType::Short,
            Self::UShort(_) => ScalarType::UShort,
            Self::Int(_) => ScalarType::Int,
            Self::UInt(_) => ScalarType::UInt,
            Self::Int64(_) => ScalarType::Int64,
            Self::UInt64(_) => ScalarType::UInt64,
            Self::Float(_) => ScalarType::Float,
            Self::Double(_) => ScalarType::Double,
            Self::Text(_) => ScalarType::String,
        }
    }

    pub fn shape(&self) -> Shape {
        with_array!(self, a => Shape::from_slice(a.shape()))
    }

    pub fn rank(&self) -> usize {
        with_array!(self, a => a.ndim())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed view of the array, `None` if `T` is not the element type.
    pub fn as_array<T: NcScalar>(&self) -> Option<&ArrayD<T>> {
        T::unwrap_ref(self)
    }

    /// Values in row-major order, `None` if `T` is not the element type.
    pub fn to_vec<T: NcScalar>(&self) -> Option<Vec<T>> {
        self.as_array::<T>().map(|a| a.iter().cloned().collect())
    }

    /// Gather the given 0-based positions along `axis`, in the order given.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<Self> {
        let shape = self.shape();
        let extent = shape.size(axis).ok_or_else(|| {
            Error::schema(format!("axis {} out of range for shape {}", axis, shape))
        })?;
        if let Some(bad) = indices.iter().find(|&&i| i >= extent) {
            return Err(Error::InvalidTruncation(format!(
                "index {} outside axis {} of length {}",
                bad + 1,
                axis,
                extent
            )));
        }
        Ok(map_array!(self, a => a.select(Axis(axis), indices)))
    }

    /// Sub-array at one 0-based position along `axis` (rank drops by one).
    pub fn index_axis(&self, axis: usize, position: usize) -> Result<Self> {
        let shape = self.shape();
        match shape.size(axis) {
            Some(extent) if position < extent => {
                Ok(map_array!(self, a => a.index_axis(Axis(axis), position).to_owned()))
            }
            _ => Err(Error::backend(format!(
                "position {} along axis {} is outside shape {}",
                position, axis, shape
            ))),
        }
    }

    /// Join `other` after this array along the first axis.
    pub fn concat(&self, other: &ArrayData) -> Result<Self> {
        macro_rules! cat {
            ($lhs:expr, $rhs:expr; $($variant:ident),*) => {
                match ($lhs, $rhs) {
                    $((ArrayData::$variant(a), ArrayData::$variant(b)) => {
                        ndarray::concatenate(Axis(0), &[a.view(), b.view()])
                            .map(ArrayData::$variant)
                            .map_err(|e| {
                                Error::schema(format!(
                                    "cannot join {} and {}: {}",
                                    $lhs.shape(),
                                    $rhs.shape(),
                                    e
                                ))
                            })
                    })*
                    _ => Err(Error::schema(format!(
                        "cannot join {} data to {} data",
                        $rhs.scalar_type(),
                        $lhs.scalar_type()
                    ))),
                }
            };
        }
        cat!(self, other; Byte, UByte, Short, UShort, Int, UInt, Int64, UInt64, Float, Double, Text)
    }

    /// Copy `src` into this array starting at `start`, growing any axis the
    /// region extends past. New cells take the type's default value.
    pub fn assign_region(&mut self, start: &[usize], src: &ArrayData) -> Result<()> {
        if self.scalar_type() != src.scalar_type() {
            return Err(Error::schema(format!(
                "cannot write {} data into {} array",
                src.scalar_type(),
                self.scalar_type()
            )));
        }
        if start.len() != self.rank() || src.rank() != self.rank() {
            return Err(Error::schema(format!(
                "rank mismatch: target {}, start {:?}, data {}",
                self.shape(),
                start,
                src.shape()
            )));
        }

        let count = src.shape();
        let current = self.shape();
        let needed: Vec<usize> = (0..self.rank())
            .map(|i| current.sizes()[i].max(start[i] + count.sizes()[i]))
            .collect();
        if needed.as_slice() != current.sizes() {
            let mut grown = ArrayData::zeros(self.scalar_type(), &needed);
            let origin = vec![0; needed.len()];
            grown.write_within(&origin, self);
            *self = grown;
        }
        self.write_within(start, src);
        Ok(())
    }

    /// Caller guarantees matching types and that the region fits.
    fn write_within(&mut self, start: &[usize], src: &ArrayData) {
        macro_rules! assign {
            ($target:expr, $source:expr, $origin:expr; $($variant:ident),*) => {
                match ($target, $source) {
                    $((ArrayData::$variant(dst), ArrayData::$variant(s)) => {
                        let count = s.shape();
                        dst.slice_each_axis_mut(|ax| {
                            let i = ax.axis.index();
                            Slice::from($origin[i]..$origin[i] + count[i])
                        })
                        .assign(s);
                    })*
                    _ => {}
                }
            };
        }
        assign!(self, src, start; Byte, UByte, Short, UShort, Int, UInt, Int64, UInt64, Float, Double, Text);
    }

    /// Render up to `limit` values in row-major order.
    pub fn preview(&self, limit: usize) -> String {
        let mut parts: Vec<String> =
            with_array!(self, a => a.iter().take(limit).map(|v| format!("{:?}", v)).collect());
        if self.len() > limit {
            parts.push("...".to_string());
        }
        parts.join(", ")
    }
}

/// Host element types that map onto a [`ScalarType`].
pub trait NcScalar: Clone + Default + std::fmt::Debug + 'static {
    const SCALAR_TYPE: ScalarType;

    fn wrap(array: ArrayD<Self>) -> ArrayData;

    fn unwrap_ref(data: &ArrayData) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_nc_scalar {
    ($($ty:ty => $variant:ident, $scalar:ident;)*) => {
        $(
            impl NcScalar for $ty {
                const SCALAR_TYPE: ScalarType = ScalarType::$scalar;

                fn wrap(array: ArrayD<Self>) -> ArrayData {
                    ArrayData::$variant(array)
                }

                fn unwrap_ref(data: &ArrayData) -> Option<&ArrayD<Self>> {
                    match data {
                        ArrayData::$variant(a) => Some(a),
                        _ => None,
                    }
                }
            }

            impl From<ArrayD<$ty>> for ArrayData {
                fn from(array: ArrayD<$ty>) -> Self {
                    ArrayData::$variant(array)
                }
            }
        )*
    };
}

impl_nc_scalar! {
    i8 => Byte, Byte;
    u8 => UByte, UByte;
    i16 => Short, Short;
    u16 => UShort, UShort;
    i32 => Int, Int;
    u32 => UInt, UInt;
    i64 => Int64, Int64;
    u64 => UInt64, UInt64;
    f32 => Float, Float;
    f64 => Double, Double;
    String => Text, String;
}

// === Persisted form ===

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
enum FlatValues {
    Byte(Vec<i8>),
    UByte(Vec<u8>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
}

/// Shape plus row-major values, the layout arrays are persisted in.
#[derive(Clone, Serialize, Deserialize)]
struct StoredArray {
    shape: Vec<usize>,
    data: FlatValues,
}

impl From<ArrayData> for StoredArray {
    fn from(array: ArrayData) -> Self {
        let shape = array.shape().sizes().to_vec();
        let data = match array {
            ArrayData::Byte(a) => FlatValues::Byte(a.iter().cloned().collect()),
            ArrayData::UByte(a) => FlatValues::UByte(a.iter().cloned().collect()),
            ArrayData::Short(a) => FlatValues::Short(a.iter().cloned().collect()),
            ArrayData::UShort(a) => FlatValues::UShort(a.iter().cloned().collect()),
            ArrayData::Int(a) => FlatValues::Int(a.iter().cloned().collect()),
            ArrayData::UInt(a) => FlatValues::UInt(a.iter().cloned().collect()),
            ArrayData::Int64(a) => FlatValues::Int64(a.iter().cloned().collect()),
            ArrayData::UInt64(a) => FlatValues::UInt64(a.iter().cloned().collect()),
            ArrayData::Float(a) => FlatValues::Float(a.iter().cloned().collect()),
            ArrayData::Double(a) => FlatValues::Double(a.iter().cloned().collect()),
            ArrayData::Text(a) => FlatValues::String(a.iter().cloned().collect()),
        };
        Self { shape, data }
    }
}

impl TryFrom<StoredArray> for ArrayData {
    type Error = Error;

    fn try_from(stored: StoredArray) -> Result<Self> {
        let shape = stored.shape.as_slice();
        match stored.data {
            FlatValues::Byte(v) => ArrayData::from_vec(shape, v),
            FlatValues::UByte(v) => ArrayData::from_vec(shape, v),
            FlatValues::Short(v) => ArrayData::from_vec(shape, v),
            FlatValues::UShort(v) => ArrayData::from_vec(shape, v),
            FlatValues::Int(v) => ArrayData::from_vec(shape, v),
            FlatValues::UInt(v) => ArrayData::from_vec(shape, v),
            FlatValues::Int64(v) => ArrayData::from_vec(shape, v),
            FlatValues::UInt64(v) => ArrayData::from_vec(shape, v),
            FlatValues::Float(v) => ArrayData::from_vec(shape, v),
            FlatValues::Double(v) => ArrayData::from_vec(shape, v),
            FlatValues::String(v) => ArrayData::from_vec(shape, v),
        }
    }
}
