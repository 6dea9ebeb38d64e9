//! Buffer payloads.
//!
//! A resource holds at most one [`Buffer`]: a dense host [`Array`], an opaque
//! device-side [`FieldDesc`], or a plain immediate [`Value`]. The
//! [`Payload`] trait converts between concrete payload types and `Buffer`,
//! which is how typed resource handles flow expectations to call sites.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Array, Dtype, Value};

/// Discriminates the three buffer families a resource may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Opaque device-side field, validated by metadata only.
    Field,
    /// Dense host-side typed array.
    Array,
    /// Plain immediate value; no validation beyond the null check.
    Value,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Field => "field",
            ResourceKind::Array => "array",
            ResourceKind::Value => "value",
        };
        write!(f, "{name}")
    }
}

/// Opaque descriptor for a device-resident field.
///
/// The engine never touches device memory; it validates the metadata carried
/// here. The `handle` identifies the allocation to the external numeric
/// runtime that owns it. A descriptor without a lane count skips lane
/// validation (the device runtime may not expose it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDesc {
    dtype: Dtype,
    lanes: Option<u32>,
    shape: Vec<usize>,
    handle: u64,
}

impl FieldDesc {
    /// New descriptor for a scalar field.
    pub fn new(dtype: Dtype, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            dtype,
            lanes: None,
            shape: shape.into(),
            handle: 0,
        }
    }

    /// Set the vector-lane count.
    pub fn with_lanes(mut self, lanes: u32) -> Self {
        self.lanes = Some(lanes);
        self
    }

    /// Set the device-side handle.
    pub fn with_handle(mut self, handle: u64) -> Self {
        self.handle = handle;
        self
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Vector-lane count, if the owning runtime exposes one.
    pub fn lanes(&self) -> Option<u32> {
        self.lanes
    }

    /// Logical shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Device-side handle.
    pub fn handle(&self) -> u64 {
        self.handle
    }
}

/// The payload a resource holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    /// Dense host-side array.
    Array(Array),
    /// Opaque device-side field descriptor.
    Field(FieldDesc),
    /// Plain immediate value.
    Value(Value),
}

impl Buffer {
    /// Which buffer family this is.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Buffer::Array(_) => ResourceKind::Array,
            Buffer::Field(_) => ResourceKind::Field,
            Buffer::Value(_) => ResourceKind::Value,
        }
    }

    /// Element type, for the numeric families.
    pub fn dtype(&self) -> Option<Dtype> {
        match self {
            Buffer::Array(a) => Some(a.dtype()),
            Buffer::Field(f) => Some(f.dtype()),
            Buffer::Value(_) => None,
        }
    }

    /// Vector-lane count, where the payload exposes one.
    pub fn lanes(&self) -> Option<u32> {
        match self {
            Buffer::Array(a) => Some(a.lanes()),
            Buffer::Field(f) => f.lanes(),
            Buffer::Value(_) => None,
        }
    }

    /// Logical shape, for the numeric families.
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Buffer::Array(a) => Some(a.shape()),
            Buffer::Field(f) => Some(f.shape()),
            Buffer::Value(_) => None,
        }
    }

    /// Borrow as an array, if this is one.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Buffer::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Mutably borrow as an array, if this is one.
    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Buffer::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as a field descriptor, if this is one.
    pub fn as_field(&self) -> Option<&FieldDesc> {
        match self {
            Buffer::Field(f) => Some(f),
            _ => None,
        }
    }

    /// Borrow as a plain value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Buffer::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Array> for Buffer {
    fn from(a: Array) -> Self {
        Buffer::Array(a)
    }
}

impl From<FieldDesc> for Buffer {
    fn from(f: FieldDesc) -> Self {
        Buffer::Field(f)
    }
}

impl From<Value> for Buffer {
    fn from(v: Value) -> Self {
        Buffer::Value(v)
    }
}

/// Two-way conversion between concrete payload types and [`Buffer`].
///
/// Typed resource handles are parameterized over a `Payload`; reads convert
/// out of the stored buffer and writes convert into it. `from_buffer`
/// returns `None` when the stored buffer is of a different family.
pub trait Payload: Sized {
    /// Wrap this payload into a buffer.
    fn into_buffer(self) -> Buffer;
    /// Extract this payload from a buffer, if the family matches.
    fn from_buffer(buffer: &Buffer) -> Option<Self>;
}

impl Payload for Buffer {
    fn into_buffer(self) -> Buffer {
        self
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        Some(buffer.clone())
    }
}

impl Payload for Array {
    fn into_buffer(self) -> Buffer {
        Buffer::Array(self)
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_array().cloned()
    }
}

impl Payload for FieldDesc {
    fn into_buffer(self) -> Buffer {
        Buffer::Field(self)
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_field().cloned()
    }
}

impl Payload for Value {
    fn into_buffer(self) -> Buffer {
        Buffer::Value(self)
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_value().cloned()
    }
}

impl Payload for f64 {
    fn into_buffer(self) -> Buffer {
        Buffer::Value(Value::Scalar(self))
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_value().and_then(Value::as_scalar)
    }
}

impl Payload for i64 {
    fn into_buffer(self) -> Buffer {
        Buffer::Value(Value::Integer(self))
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_value().and_then(Value::as_integer)
    }
}

impl Payload for bool {
    fn into_buffer(self) -> Buffer {
        Buffer::Value(Value::Boolean(self))
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_value().and_then(Value::as_boolean)
    }
}

impl Payload for [f64; 2] {
    fn into_buffer(self) -> Buffer {
        Buffer::Value(Value::Vec2(self))
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_value().and_then(Value::as_vec2)
    }
}

impl Payload for [f64; 3] {
    fn into_buffer(self) -> Buffer {
        Buffer::Value(Value::Vec3(self))
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_value().and_then(Value::as_vec3)
    }
}

impl Payload for [f64; 4] {
    fn into_buffer(self) -> Buffer {
        Buffer::Value(Value::Vec4(self))
    }

    fn from_buffer(buffer: &Buffer) -> Option<Self> {
        buffer.as_value().and_then(Value::as_vec4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_metadata() {
        let array = Buffer::from(Array::zeros(Dtype::F32, [4]));
        assert_eq!(array.kind(), ResourceKind::Array);
        assert_eq!(array.dtype(), Some(Dtype::F32));
        assert_eq!(array.lanes(), Some(1));
        assert_eq!(array.shape(), Some(&[4usize][..]));

        let field = Buffer::from(FieldDesc::new(Dtype::I32, [8]).with_lanes(2));
        assert_eq!(field.kind(), ResourceKind::Field);
        assert_eq!(field.lanes(), Some(2));

        let value = Buffer::from(Value::Scalar(1.0));
        assert_eq!(value.kind(), ResourceKind::Value);
        assert_eq!(value.dtype(), None);
        assert_eq!(value.shape(), None);
    }

    #[test]
    fn test_payload_roundtrip_scalar() {
        let buffer = 6.0f64.into_buffer();
        assert_eq!(f64::from_buffer(&buffer), Some(6.0));
        assert_eq!(i64::from_buffer(&buffer), None);
    }

    #[test]
    fn test_payload_roundtrip_array() {
        let buffer = Array::from_i32(vec![1, 2, 3], [3]).into_buffer();
        let back = Array::from_buffer(&buffer).expect("array payload");
        assert_eq!(back.as_i32(), Some(&[1, 2, 3][..]));
        assert_eq!(FieldDesc::from_buffer(&buffer), None);
    }

    #[test]
    fn test_payload_buffer_identity() {
        let buffer = Buffer::from(Value::Boolean(true));
        let back = Buffer::from_buffer(&buffer).expect("buffer payload");
        assert_eq!(back, buffer);
    }
}
