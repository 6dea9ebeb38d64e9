//! Plain immediate values.

use serde::{Deserialize, Serialize};

/// A plain value held directly by a resource.
///
/// These cover the small, copyable payloads that do not warrant an array:
/// counts, toggles, time steps, single positions. Larger numeric data goes
/// into an [`Array`](crate::Array) or a device-side
/// [`FieldDesc`](crate::FieldDesc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Scalar float.
    Scalar(f64),
    /// Signed integer.
    Integer(i64),
    /// Boolean flag.
    Boolean(bool),
    /// 2-component vector.
    Vec2([f64; 2]),
    /// 3-component vector.
    Vec3([f64; 3]),
    /// 4-component vector.
    Vec4([f64; 4]),
}

impl Value {
    /// Extract a scalar, if this is one.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract an integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a boolean, if this is one.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a Vec2, if this is one.
    pub fn as_vec2(&self) -> Option<[f64; 2]> {
        match self {
            Value::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a Vec3, if this is one.
    pub fn as_vec3(&self) -> Option<[f64; 3]> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a Vec4, if this is one.
    pub fn as_vec4(&self) -> Option<[f64; 4]> {
        match self {
            Value::Vec4(v) => Some(*v),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Scalar(0.0)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<[f64; 2]> for Value {
    fn from(v: [f64; 2]) -> Self {
        Value::Vec2(v)
    }
}

impl From<[f64; 3]> for Value {
    fn from(v: [f64; 3]) -> Self {
        Value::Vec3(v)
    }
}

impl From<[f64; 4]> for Value {
    fn from(v: [f64; 4]) -> Self {
        Value::Vec4(v)
    }
}
