//! Dense host-side arrays.

use std::sync::Arc;

use crate::Dtype;

/// Per-dtype storage for an [`Array`].
///
/// Vectors are wrapped in `Arc` so array clones share memory; mutation goes
/// through `Arc::make_mut` (copy-on-write).
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// 32-bit float elements.
    F32(Arc<Vec<f32>>),
    /// 64-bit float elements.
    F64(Arc<Vec<f64>>),
    /// 32-bit signed integer elements.
    I32(Arc<Vec<i32>>),
    /// 64-bit signed integer elements.
    I64(Arc<Vec<i64>>),
    /// 32-bit unsigned integer elements.
    U32(Arc<Vec<u32>>),
}

impl ArrayData {
    fn zeros(dtype: Dtype, count: usize) -> Self {
        match dtype {
            Dtype::F32 => ArrayData::F32(Arc::new(vec![0.0; count])),
            Dtype::F64 => ArrayData::F64(Arc::new(vec![0.0; count])),
            Dtype::I32 => ArrayData::I32(Arc::new(vec![0; count])),
            Dtype::I64 => ArrayData::I64(Arc::new(vec![0; count])),
            Dtype::U32 => ArrayData::U32(Arc::new(vec![0; count])),
        }
    }

    fn dtype(&self) -> Dtype {
        match self {
            ArrayData::F32(_) => Dtype::F32,
            ArrayData::F64(_) => Dtype::F64,
            ArrayData::I32(_) => Dtype::I32,
            ArrayData::I64(_) => Dtype::I64,
            ArrayData::U32(_) => Dtype::U32,
        }
    }

    fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::U32(v) => v.len(),
        }
    }
}

/// A dense host-side numeric array.
///
/// Arrays carry an element type, a vector-lane count (`1` for plain scalar
/// arrays), and an explicit shape. The flat storage holds
/// `shape.product() * lanes` components in row-major order.
///
/// # Examples
///
/// ```
/// # use weft_foundation::{Array, Dtype};
/// let mut a = Array::zeros(Dtype::F32, [4]);
/// assert_eq!(a.shape(), &[4]);
/// if let Some(data) = a.as_f32_mut() {
///     data[0] = 1.5;
/// }
/// assert_eq!(a.as_f32().map(|d| d[0]), Some(1.5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    dtype: Dtype,
    lanes: u32,
    shape: Vec<usize>,
    data: ArrayData,
}

impl Array {
    /// Zero-filled array of scalar elements.
    pub fn zeros(dtype: Dtype, shape: impl Into<Vec<usize>>) -> Self {
        Self::zeros_with_lanes(dtype, 1, shape)
    }

    /// Zero-filled array of vector elements with `lanes` components each.
    pub fn zeros_with_lanes(dtype: Dtype, lanes: u32, shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let count = shape.iter().product::<usize>() * lanes as usize;
        Self {
            dtype,
            lanes,
            shape,
            data: ArrayData::zeros(dtype, count),
        }
    }

    /// Array from existing f32 data. The data length must match the shape.
    pub fn from_f32(data: Vec<f32>, shape: impl Into<Vec<usize>>) -> Self {
        Self::from_data(ArrayData::F32(Arc::new(data)), 1, shape.into())
    }

    /// Array from existing f64 data. The data length must match the shape.
    pub fn from_f64(data: Vec<f64>, shape: impl Into<Vec<usize>>) -> Self {
        Self::from_data(ArrayData::F64(Arc::new(data)), 1, shape.into())
    }

    /// Array from existing i32 data. The data length must match the shape.
    pub fn from_i32(data: Vec<i32>, shape: impl Into<Vec<usize>>) -> Self {
        Self::from_data(ArrayData::I32(Arc::new(data)), 1, shape.into())
    }

    /// Array from existing i64 data. The data length must match the shape.
    pub fn from_i64(data: Vec<i64>, shape: impl Into<Vec<usize>>) -> Self {
        Self::from_data(ArrayData::I64(Arc::new(data)), 1, shape.into())
    }

    /// Array from existing u32 data. The data length must match the shape.
    pub fn from_u32(data: Vec<u32>, shape: impl Into<Vec<usize>>) -> Self {
        Self::from_data(ArrayData::U32(Arc::new(data)), 1, shape.into())
    }

    /// Vector-valued array from existing i32 data, `lanes` components per
    /// element.
    pub fn from_i32_with_lanes(data: Vec<i32>, lanes: u32, shape: impl Into<Vec<usize>>) -> Self {
        Self::from_data(ArrayData::I32(Arc::new(data)), lanes, shape.into())
    }

    /// Vector-valued array from existing f32 data, `lanes` components per
    /// element.
    pub fn from_f32_with_lanes(data: Vec<f32>, lanes: u32, shape: impl Into<Vec<usize>>) -> Self {
        Self::from_data(ArrayData::F32(Arc::new(data)), lanes, shape.into())
    }

    fn from_data(data: ArrayData, lanes: u32, shape: Vec<usize>) -> Self {
        let expected = shape.iter().product::<usize>() * lanes as usize;
        assert_eq!(
            data.len(),
            expected,
            "array data length {} does not match shape {:?} with {} lanes",
            data.len(),
            shape,
            lanes,
        );
        Self {
            dtype: data.dtype(),
            lanes,
            shape,
            data,
        }
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Vector-lane count (`1` for scalar arrays).
    pub fn lanes(&self) -> u32 {
        self.lanes
    }

    /// Logical shape (element counts per dimension, lanes excluded).
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of logical elements (product of the shape).
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of stored components (`element_count * lanes`).
    pub fn component_count(&self) -> usize {
        self.data.len()
    }

    /// Flat f32 view, if the element type matches.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            ArrayData::F32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Flat f64 view, if the element type matches.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            ArrayData::F64(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Flat i32 view, if the element type matches.
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            ArrayData::I32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Flat i64 view, if the element type matches.
    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            ArrayData::I64(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Flat u32 view, if the element type matches.
    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.data {
            ArrayData::U32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Mutable flat f32 view. Unshares the storage if it is aliased.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            ArrayData::F32(v) => Some(Arc::make_mut(v).as_mut_slice()),
            _ => None,
        }
    }

    /// Mutable flat f64 view. Unshares the storage if it is aliased.
    pub fn as_f64_mut(&mut self) -> Option<&mut [f64]> {
        match &mut self.data {
            ArrayData::F64(v) => Some(Arc::make_mut(v).as_mut_slice()),
            _ => None,
        }
    }

    /// Mutable flat i32 view. Unshares the storage if it is aliased.
    pub fn as_i32_mut(&mut self) -> Option<&mut [i32]> {
        match &mut self.data {
            ArrayData::I32(v) => Some(Arc::make_mut(v).as_mut_slice()),
            _ => None,
        }
    }

    /// Mutable flat i64 view. Unshares the storage if it is aliased.
    pub fn as_i64_mut(&mut self) -> Option<&mut [i64]> {
        match &mut self.data {
            ArrayData::I64(v) => Some(Arc::make_mut(v).as_mut_slice()),
            _ => None,
        }
    }

    /// Mutable flat u32 view. Unshares the storage if it is aliased.
    pub fn as_u32_mut(&mut self) -> Option<&mut [u32]> {
        match &mut self.data {
            ArrayData::U32(v) => Some(Arc::make_mut(v).as_mut_slice()),
            _ => None,
        }
    }
}
