//! Runtime buffer contracts.
//!
//! A [`ResourceSpec`] is validated against a candidate buffer at write time
//! (and at commit time, against the current buffer). This is runtime
//! validation of research-grade data flows, not static typing: it catches
//! shape and dtype drift at the registry boundary instead of deep inside a
//! kernel.

use std::fmt;
use std::rc::Rc;

use weft_foundation::{Buffer, Dtype, Payload, ResourceKind, ResourceName};

use crate::error::{Error, Result};
use crate::handle::ResourceRef;
use crate::registry::Registry;

/// Computes an expected shape from the registry at validation time.
///
/// Shape functions read upstream buffers through the registry and must not
/// mutate it. Returning `None` skips the shape check (upstream not yet
/// available).
pub type ShapeFn = Rc<dyn Fn(&Registry) -> Option<Vec<usize>>>;

/// Declarative runtime contract for a resource's buffer.
///
/// At most one of `shape` and `shape_fn` is retained; setting one clears the
/// other. `allow_null` defaults to `true`: a null buffer is a legal committed
/// value unless the spec opts out.
///
/// # Examples
///
/// ```
/// # use weft_engine::ResourceSpec;
/// # use weft_foundation::Dtype;
/// let positions = ResourceSpec::field()
///     .with_dtype(Dtype::F32)
///     .with_lanes(3);
/// let weights = ResourceSpec::array()
///     .with_dtype(Dtype::F64)
///     .with_shape([16])
///     .with_allow_null(false);
/// ```
#[derive(Clone)]
pub struct ResourceSpec {
    kind: ResourceKind,
    dtype: Option<Dtype>,
    lanes: Option<u32>,
    shape: Option<Vec<usize>>,
    shape_fn: Option<ShapeFn>,
    allow_null: bool,
}

impl ResourceSpec {
    /// New spec for the given buffer family.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            dtype: None,
            lanes: None,
            shape: None,
            shape_fn: None,
            allow_null: true,
        }
    }

    /// Spec for an opaque device-side field.
    pub fn field() -> Self {
        Self::new(ResourceKind::Field)
    }

    /// Spec for a dense host-side array.
    pub fn array() -> Self {
        Self::new(ResourceKind::Array)
    }

    /// Spec for a plain value (no checks beyond the null rule).
    pub fn value() -> Self {
        Self::new(ResourceKind::Value)
    }

    /// Require an exact element type.
    pub fn with_dtype(mut self, dtype: Dtype) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Require an exact vector-lane count.
    pub fn with_lanes(mut self, lanes: u32) -> Self {
        self.lanes = Some(lanes);
        self
    }

    /// Require an exact static shape. Clears any shape function.
    pub fn with_shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.shape = Some(shape.into());
        self.shape_fn = None;
        self
    }

    /// Require a shape computed from the registry at validation time.
    /// Clears any static shape.
    pub fn with_shape_fn(mut self, f: impl Fn(&Registry) -> Option<Vec<usize>> + 'static) -> Self {
        self.shape_fn = Some(Rc::new(f));
        self.shape = None;
        self
    }

    /// Set whether a null buffer is a legal committed value.
    pub fn with_allow_null(mut self, allow: bool) -> Self {
        self.allow_null = allow;
        self
    }

    /// The buffer family this spec accepts.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Required element type, if any.
    pub fn dtype(&self) -> Option<Dtype> {
        self.dtype
    }

    /// Required lane count, if any.
    pub fn lanes(&self) -> Option<u32> {
        self.lanes
    }

    /// Required static shape, if any.
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    /// Whether a null buffer is accepted.
    pub fn allow_null(&self) -> bool {
        self.allow_null
    }

    /// Validate a candidate buffer against this contract.
    ///
    /// Validation never mutates the registry; the registry is only consulted
    /// by shape functions reading upstream buffers.
    pub fn validate(
        &self,
        name: &ResourceName,
        buffer: Option<&Buffer>,
        registry: &Registry,
    ) -> Result<()> {
        let Some(buffer) = buffer else {
            if self.allow_null {
                return Ok(());
            }
            return Err(reject(name, "buffer is null but the spec disallows null"));
        };

        // Plain values carry no checkable structure.
        if self.kind == ResourceKind::Value {
            return Ok(());
        }

        if buffer.kind() != self.kind {
            return Err(reject(
                name,
                format!("expected {} buffer, got {}", self.kind, buffer.kind()),
            ));
        }

        if let Some(expected) = self.dtype {
            match buffer.dtype() {
                Some(actual) if actual == expected => {}
                actual => {
                    return Err(reject(
                        name,
                        format!("expected dtype {expected}, got {actual:?}"),
                    ));
                }
            }
        }

        if let Some(expected) = self.lanes {
            // Field descriptors without a lane count skip this check.
            if let Some(actual) = buffer.lanes() {
                if actual != expected {
                    return Err(reject(
                        name,
                        format!("expected {expected} lanes, got {actual}"),
                    ));
                }
            }
        }

        let expected_shape = match (&self.shape, &self.shape_fn) {
            (Some(shape), _) => Some(shape.clone()),
            (None, Some(shape_fn)) => shape_fn(registry),
            (None, None) => None,
        };
        if let Some(expected) = expected_shape {
            match buffer.shape() {
                Some(actual) if actual == expected.as_slice() => {}
                actual => {
                    return Err(reject(
                        name,
                        format!("expected shape {expected:?}, got {actual:?}"),
                    ));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSpec")
            .field("kind", &self.kind)
            .field("dtype", &self.dtype)
            .field("lanes", &self.lanes)
            .field("shape", &self.shape)
            .field("shape_fn", &self.shape_fn.as_ref().map(|_| "<fn>"))
            .field("allow_null", &self.allow_null)
            .finish()
    }
}

fn reject(name: &ResourceName, reason: impl Into<String>) -> Error {
    Error::Validation {
        name: name.clone(),
        reason: reason.into(),
    }
}

/// Shape function mirroring another resource's current buffer shape.
///
/// The common wiring for derived per-element data: a field of weights over
/// mesh vertices declares `shape_of(&mesh.v_pos)` and stays shape-correct as
/// the mesh is swapped out. Pass the result to
/// [`ResourceSpec::with_shape_fn`].
pub fn shape_of<T: Payload + 'static>(
    resource: &ResourceRef<T>,
) -> impl Fn(&Registry) -> Option<Vec<usize>> + 'static {
    let name = resource.name().clone();
    move |registry: &Registry| {
        registry
            .read(&name, false)
            .ok()
            .flatten()
            .and_then(|buffer| buffer.shape().map(<[usize]>::to_vec))
    }
}
