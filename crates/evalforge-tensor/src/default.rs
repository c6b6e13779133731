//! Production tensor engine.
//!
//! Operates directly on dense row-major cells using strides. Cell generation
//! for large `map`, `join` and `create` results runs on the rayon pool; each
//! cell is computed independently, so parallel and sequential results are
//! bit-identical. `reduce` feeds cells in row-major order like the reference
//! engine.

use evalforge_core::Aggr;
use rayon::prelude::*;
use tracing::trace;

use crate::aggr::Aggregator;
use crate::engine::{
    concat_type, dim_names, join_type, project_strides, reduce_type, rename_type, CellFn,
    CreateFn, JoinFn, TensorEngine,
};
use crate::error::Result;
use crate::value::{advance, TensorType, Value};

/// Results with at least this many cells are generated in parallel.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// Dense, stride-based implementation of every tensor operation.
#[derive(Debug, Clone, Copy)]
pub struct DefaultTensorEngine {
    parallel_threshold: usize,
}

impl Default for DefaultTensorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultTensorEngine {
    pub const fn new() -> Self {
        Self {
            parallel_threshold: PARALLEL_THRESHOLD,
        }
    }

    /// Overrides the cell count above which generation goes parallel.
    pub fn with_parallel_threshold(mut self, cells: usize) -> Self {
        self.parallel_threshold = cells;
        self
    }

    /// Produces `count` cells with `f(index)`, in parallel when large.
    fn generate(&self, count: usize, f: impl Fn(usize) -> f64 + Sync + Send) -> Vec<f64> {
        if count >= self.parallel_threshold {
            trace!(count, "parallel cell generation");
            (0..count).into_par_iter().map(f).collect()
        } else {
            (0..count).map(f).collect()
        }
    }
}

/// Maps a dense index in `ty` to an offset through per-dimension strides.
fn offset_of(ty: &TensorType, strides: &[usize], mut index: usize) -> usize {
    let mut offset = 0;
    for (dim, stride) in ty.dimensions().iter().zip(strides).rev() {
        offset += (index % dim.size) * stride;
        index /= dim.size;
    }
    offset
}

impl TensorEngine for DefaultTensorEngine {
    fn name(&self) -> &'static str {
        "default"
    }

    fn sum(&self, value: &Value, dimension: Option<&str>) -> Result<Value> {
        match dimension {
            Some(dim) => self.reduce(value, Aggr::Sum, &[dim.to_string()]),
            None => self.reduce(value, Aggr::Sum, &[]),
        }
    }

    fn map(&self, value: &Value, f: CellFn<'_>) -> Result<Value> {
        let cells = value.cells();
        let out = self.generate(cells.len(), |i| f(cells[i]));
        Ok(Value::from_parts(value.tensor_type(), out))
    }

    fn join(&self, lhs: &Value, rhs: &Value, f: JoinFn<'_>) -> Result<Value> {
        let lhs_ty = lhs.tensor_type();
        let rhs_ty = rhs.tensor_type();
        let ty = join_type(&lhs_ty, &rhs_ty)?;
        let lhs_strides = project_strides(&ty, &dim_names(&lhs_ty), &lhs_ty);
        let rhs_strides = project_strides(&ty, &dim_names(&rhs_ty), &rhs_ty);
        let (a, b) = (lhs.cells(), rhs.cells());
        let out = self.generate(ty.cell_count(), |i| {
            f(
                a[offset_of(&ty, &lhs_strides, i)],
                b[offset_of(&ty, &rhs_strides, i)],
            )
        });
        Ok(Value::from_parts(ty, out))
    }

    fn reduce(&self, value: &Value, aggr: Aggr, dimensions: &[String]) -> Result<Value> {
        let source = value.tensor_type();
        let ty = reduce_type(&source, dimensions)?;
        let out_strides = project_strides(&source, &dim_names(&ty), &ty);
        let mut groups = vec![Aggregator::new(aggr); ty.cell_count()];
        let mut address = vec![0; source.dimensions().len()];
        for &v in value.cells() {
            let out: usize = address
                .iter()
                .zip(&out_strides)
                .map(|(idx, stride)| idx * stride)
                .sum();
            groups[out].add(v);
            advance(&source, &mut address);
        }
        let cells = groups.iter().map(Aggregator::result).collect();
        Ok(Value::from_parts(ty, cells))
    }

    fn rename(&self, value: &Value, from: &[String], to: &[String]) -> Result<Value> {
        let source = value.tensor_type();
        let (ty, renamed) = rename_type(&source, from, to)?;
        let strides = project_strides(&ty, &renamed, &source);
        let cells = value.cells();
        let out = (0..ty.cell_count())
            .map(|i| cells[offset_of(&ty, &strides, i)])
            .collect();
        Ok(Value::from_parts(ty, out))
    }

    fn create(&self, ty: &TensorType, f: CreateFn<'_>) -> Result<Value> {
        let out = if ty.cell_count() >= self.parallel_threshold {
            self.generate(ty.cell_count(), |mut i| {
                let mut address = vec![0; ty.dimensions().len()];
                for (idx, dim) in address.iter_mut().zip(ty.dimensions()).rev() {
                    *idx = i % dim.size;
                    i /= dim.size;
                }
                f(&address)
            })
        } else {
            let mut cells = Vec::with_capacity(ty.cell_count());
            let mut address = vec![0; ty.dimensions().len()];
            for _ in 0..ty.cell_count() {
                cells.push(f(&address));
                advance(ty, &mut address);
            }
            cells
        };
        Ok(Value::from_parts(ty.clone(), out))
    }

    fn concat(&self, lhs: &Value, rhs: &Value, dimension: &str) -> Result<Value> {
        let lhs_ty = lhs.tensor_type();
        let rhs_ty = rhs.tensor_type();
        let (ty, lhs_size, axis) = concat_type(&lhs_ty, &rhs_ty, dimension)?;
        let lhs_strides = project_strides(&ty, &dim_names(&lhs_ty), &lhs_ty);
        let rhs_strides = project_strides(&ty, &dim_names(&rhs_ty), &rhs_ty);
        let (a, b) = (lhs.cells(), rhs.cells());
        let mut out = Vec::with_capacity(ty.cell_count());
        let mut address = vec![0; ty.dimensions().len()];
        for _ in 0..ty.cell_count() {
            let (cells, strides, shift) = if address[axis] < lhs_size {
                (a, &lhs_strides, 0)
            } else {
                (b, &rhs_strides, lhs_size)
            };
            let offset: usize = address
                .iter()
                .zip(strides.iter())
                .enumerate()
                .map(|(d, (idx, stride))| {
                    let idx = if d == axis { idx - shift } else { *idx };
                    idx * stride
                })
                .sum();
            out.push(cells[offset]);
            advance(&ty, &mut address);
        }
        Ok(Value::from_parts(ty, out))
    }
}
