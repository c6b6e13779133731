//! Reference tensor engine.
//!
//! Every operation converts its operands into an address map and walks it
//! cell by cell. Slow but obviously correct; used to check other engines.

use std::collections::BTreeMap;

use evalforge_core::Aggr;
use smallvec::SmallVec;

use crate::aggr::Aggregator;
use crate::engine::{
    concat_type, dim_names, join_type, reduce_type, rename_type, CellFn, CreateFn, JoinFn,
    TensorEngine,
};
use crate::error::Result;
use crate::value::{advance, TensorType, Value};

type Address = SmallVec<[usize; 4]>;

/// Cells keyed by address; iteration order is row-major.
struct AddressMap {
    ty: TensorType,
    cells: BTreeMap<Address, f64>,
}

impl AddressMap {
    fn from_value(value: &Value) -> Self {
        let ty = value.tensor_type();
        let mut cells = BTreeMap::new();
        let mut address: Address = SmallVec::from_elem(0, ty.dimensions().len());
        for &v in value.cells() {
            cells.insert(address.clone(), v);
            advance(&ty, &mut address);
        }
        Self { ty, cells }
    }

    fn into_value(self) -> Value {
        Value::from_parts(self.ty, self.cells.into_values().collect())
    }

    /// Looks up the cell whose coordinates match `address` on every
    /// dimension of this map, where `address` is laid out over `names`.
    fn lookup(&self, names: &[String], address: &[usize]) -> Option<f64> {
        let own: Address = self
            .ty
            .dimensions()
            .iter()
            .map(|d| {
                names
                    .iter()
                    .position(|n| *n == d.name)
                    .map(|i| address[i])
            })
            .collect::<Option<_>>()?;
        self.cells.get(&own).copied()
    }
}

/// Straightforward address-map implementation of every tensor operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTensorEngine;

impl SimpleTensorEngine {
    pub const fn new() -> Self {
        Self
    }
}

impl TensorEngine for SimpleTensorEngine {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn sum(&self, value: &Value, dimension: Option<&str>) -> Result<Value> {
        let dims: Vec<String> = dimension.map(str::to_string).into_iter().collect();
        self.reduce(value, Aggr::Sum, &dims)
    }

    fn map(&self, value: &Value, f: CellFn<'_>) -> Result<Value> {
        let mut map = AddressMap::from_value(value);
        for v in map.cells.values_mut() {
            *v = f(*v);
        }
        Ok(map.into_value())
    }

    fn join(&self, lhs: &Value, rhs: &Value, f: JoinFn<'_>) -> Result<Value> {
        let lhs = AddressMap::from_value(lhs);
        let rhs = AddressMap::from_value(rhs);
        let ty = join_type(&lhs.ty, &rhs.ty)?;
        let names = dim_names(&ty);
        let mut cells = BTreeMap::new();
        let mut address: Address = SmallVec::from_elem(0, names.len());
        for _ in 0..ty.cell_count() {
            if let (Some(a), Some(b)) = (
                lhs.lookup(&names, &address),
                rhs.lookup(&names, &address),
            ) {
                cells.insert(address.clone(), f(a, b));
            }
            advance(&ty, &mut address);
        }
        Ok(AddressMap { ty, cells }.into_value())
    }

    fn reduce(&self, value: &Value, aggr: Aggr, dimensions: &[String]) -> Result<Value> {
        let source = AddressMap::from_value(value);
        let ty = reduce_type(&source.ty, dimensions)?;
        let kept: Vec<usize> = source
            .ty
            .dimensions()
            .iter()
            .enumerate()
            .filter(|(_, d)| ty.dim_index(&d.name).is_some())
            .map(|(i, _)| i)
            .collect();
        let mut groups: BTreeMap<Address, Aggregator> = BTreeMap::new();
        for (address, &v) in &source.cells {
            let key: Address = kept.iter().map(|&i| address[i]).collect();
            groups
                .entry(key)
                .or_insert_with(|| Aggregator::new(aggr))
                .add(v);
        }
        let cells = groups
            .into_iter()
            .map(|(address, acc)| (address, acc.result()))
            .collect();
        Ok(AddressMap { ty, cells }.into_value())
    }

    fn rename(&self, value: &Value, from: &[String], to: &[String]) -> Result<Value> {
        let source = AddressMap::from_value(value);
        let (ty, renamed) = rename_type(&source.ty, from, to)?;
        let cells = source
            .cells
            .iter()
            .map(|(address, &v)| {
                let mut moved: Address = SmallVec::from_elem(0, address.len());
                for (name, &idx) in renamed.iter().zip(address) {
                    if let Some(pos) = ty.dim_index(name) {
                        moved[pos] = idx;
                    }
                }
                (moved, v)
            })
            .collect();
        Ok(AddressMap { ty, cells }.into_value())
    }

    fn create(&self, ty: &TensorType, f: CreateFn<'_>) -> Result<Value> {
        let mut cells = BTreeMap::new();
        let mut address: Address = SmallVec::from_elem(0, ty.dimensions().len());
        for _ in 0..ty.cell_count() {
            cells.insert(address.clone(), f(&address));
            advance(ty, &mut address);
        }
        Ok(AddressMap {
            ty: ty.clone(),
            cells,
        }
        .into_value())
    }

    fn concat(&self, lhs: &Value, rhs: &Value, dimension: &str) -> Result<Value> {
        let lhs = AddressMap::from_value(lhs);
        let rhs = AddressMap::from_value(rhs);
        let (ty, lhs_size, axis) = concat_type(&lhs.ty, &rhs.ty, dimension)?;
        let names = dim_names(&ty);
        let mut cells = BTreeMap::new();
        let mut address: Address = SmallVec::from_elem(0, names.len());
        for _ in 0..ty.cell_count() {
            // An operand without the axis ignores that coordinate on lookup.
            let mut local = address.clone();
            let side = if address[axis] < lhs_size {
                &lhs
            } else {
                local[axis] -= lhs_size;
                &rhs
            };
            if let Some(v) = side.lookup(&names, &local) {
                cells.insert(address.clone(), v);
            }
            advance(&ty, &mut address);
        }
        Ok(AddressMap { ty, cells }.into_value())
    }
}
