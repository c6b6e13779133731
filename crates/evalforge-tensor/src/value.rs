//! Values produced by expression evaluation.

use std::fmt;

use evalforge_core::DimensionSpec;

use crate::error::{Result, TensorError};

/// Indexed dimensions of a dense tensor, sorted by name.
///
/// A type with no dimensions describes a single double.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TensorType {
    dims: Vec<DimensionSpec>,
}

impl TensorType {
    /// Sorts `dims` by name and validates it.
    ///
    /// # Errors
    ///
    /// `DuplicateDimension` if a name repeats, `EmptyDimension` if a size is 0,
    /// `TooManyCells` if the cell count does not fit in `usize`.
    pub fn new(mut dims: Vec<DimensionSpec>) -> Result<Self> {
        dims.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in dims.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(TensorError::DuplicateDimension(pair[0].name.clone()));
            }
        }
        if let Some(empty) = dims.iter().find(|d| d.size == 0) {
            return Err(TensorError::EmptyDimension(empty.name.clone()));
        }
        let ty = Self { dims };
        if ty.dims.iter().try_fold(1usize, |n, d| n.checked_mul(d.size)).is_none() {
            return Err(TensorError::TooManyCells(ty.to_string()));
        }
        Ok(ty)
    }

    /// The type of a plain double.
    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn dimensions(&self) -> &[DimensionSpec] {
        &self.dims
    }

    /// Position of `name` in the sorted dimension list.
    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims
            .binary_search_by(|d| d.name.as_str().cmp(name))
            .ok()
    }

    pub fn size_of(&self, name: &str) -> Option<usize> {
        self.dim_index(name).map(|i| self.dims[i].size)
    }

    pub fn cell_count(&self) -> usize {
        self.dims.iter().map(|d| d.size).product()
    }

    /// Row-major strides; the last dimension varies fastest.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.dims.len()];
        for i in (0..self.dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1].size;
        }
        strides
    }

    /// Dense offset of `address`, or `None` if it is out of range.
    pub fn offset(&self, address: &[usize]) -> Option<usize> {
        if address.len() != self.dims.len() {
            return None;
        }
        let mut offset = 0;
        for (dim, &idx) in self.dims.iter().zip(address) {
            if idx >= dim.size {
                return None;
            }
            offset = offset * dim.size + idx;
        }
        Some(offset)
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scalar() {
            return f.write_str("double");
        }
        f.write_str("tensor(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}[{}]", d.name, d.size)?;
        }
        f.write_str(")")
    }
}

/// A dense tensor with row-major cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    ty: TensorType,
    cells: Vec<f64>,
}

impl Tensor {
    /// # Errors
    ///
    /// `CellCount` if `cells` does not match the type.
    pub fn new(ty: TensorType, cells: Vec<f64>) -> Result<Self> {
        let expected = ty.cell_count();
        if cells.len() != expected {
            return Err(TensorError::CellCount {
                expected,
                got: cells.len(),
            });
        }
        Ok(Self { ty, cells })
    }

    /// Builds a tensor by calling `f` with every address in row-major order.
    pub fn from_fn(ty: TensorType, mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let mut cells = Vec::with_capacity(ty.cell_count());
        let mut address = vec![0; ty.dims.len()];
        for _ in 0..ty.cell_count() {
            cells.push(f(&address));
            advance(&ty, &mut address);
        }
        Self { ty, cells }
    }

    pub fn tensor_type(&self) -> &TensorType {
        &self.ty
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn cell(&self, address: &[usize]) -> Option<f64> {
        self.ty.offset(address).map(|i| self.cells[i])
    }
}

/// Steps `address` to the next row-major position, wrapping to all zeros
/// after the last one.
pub(crate) fn advance(ty: &TensorType, address: &mut [usize]) {
    for (idx, dim) in address.iter_mut().zip(&ty.dims).rev() {
        *idx += 1;
        if *idx < dim.size {
            return;
        }
        *idx = 0;
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    Tensor(Tensor),
}

impl Value {
    /// Wraps dense parts, collapsing a dimensionless type to a double.
    pub(crate) fn from_parts(ty: TensorType, mut cells: Vec<f64>) -> Self {
        if ty.is_scalar() {
            Value::Double(cells.pop().unwrap_or(f64::NAN))
        } else {
            Value::Tensor(Tensor { ty, cells })
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Tensor(_) => None,
        }
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Double(_) => None,
            Value::Tensor(t) => Some(t),
        }
    }

    /// Type of the value; doubles have no dimensions.
    pub fn tensor_type(&self) -> TensorType {
        match self {
            Value::Double(_) => TensorType::scalar(),
            Value::Tensor(t) => t.ty.clone(),
        }
    }

    /// Dense cells; a double is a single cell.
    pub fn cells(&self) -> &[f64] {
        match self {
            Value::Double(v) => std::slice::from_ref(v),
            Value::Tensor(t) => &t.cells,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Value::Tensor(tensor)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Double(v) => write!(f, "{v}"),
            Value::Tensor(t) => {
                write!(f, "{}:[", t.ty)?;
                for (i, v) in t.cells.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}
