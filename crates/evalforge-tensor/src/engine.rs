//! The tensor engine abstraction.
//!
//! A [`TensorEngine`] is a stateless strategy object with one method per
//! tensor operation kind. Engines are injected by the caller as
//! `&dyn TensorEngine`, so a reference and a production implementation can
//! be swapped freely and checked against each other.
//!
//! Result types are computed by the helpers in this module for every engine,
//! which keeps shape validation and its error kinds identical across them.

use evalforge_core::{Aggr, DimensionSpec, TensorOpKind};

use crate::error::{Result, TensorError};
use crate::value::{TensorType, Value};

/// Per-cell function used by `map`.
pub type CellFn<'a> = &'a (dyn Fn(f64) -> f64 + Sync);

/// Cell-pair function used by `join`.
pub type JoinFn<'a> = &'a (dyn Fn(f64, f64) -> f64 + Sync);

/// Generator used by `create`; receives an address in the type's sorted
/// dimension order.
pub type CreateFn<'a> = &'a (dyn Fn(&[usize]) -> f64 + Sync);

/// Tensor operations over [`Value`]s.
///
/// Every method has a default body returning [`TensorError::Unimplemented`],
/// so a partial engine is distinguishable from one that rejects a shape.
pub trait TensorEngine: Send + Sync {
    /// Short engine name for diagnostics.
    fn name(&self) -> &'static str;

    /// Sums over `dimension`, or over everything when `None`.
    fn sum(&self, _value: &Value, _dimension: Option<&str>) -> Result<Value> {
        Err(self.unimplemented(TensorOpKind::Sum))
    }

    fn map(&self, _value: &Value, _f: CellFn<'_>) -> Result<Value> {
        Err(self.unimplemented(TensorOpKind::Map))
    }

    /// Combines every pair of cells that agree on common dimensions.
    fn join(&self, _lhs: &Value, _rhs: &Value, _f: JoinFn<'_>) -> Result<Value> {
        Err(self.unimplemented(TensorOpKind::Join))
    }

    /// Aggregates over `dimensions`, or over everything when empty.
    fn reduce(&self, _value: &Value, _aggr: Aggr, _dimensions: &[String]) -> Result<Value> {
        Err(self.unimplemented(TensorOpKind::Reduce))
    }

    fn rename(&self, _value: &Value, _from: &[String], _to: &[String]) -> Result<Value> {
        Err(self.unimplemented(TensorOpKind::Rename))
    }

    fn create(&self, _ty: &TensorType, _f: CreateFn<'_>) -> Result<Value> {
        Err(self.unimplemented(TensorOpKind::Create))
    }

    /// Appends `rhs` after `lhs` along `dimension`.
    fn concat(&self, _lhs: &Value, _rhs: &Value, _dimension: &str) -> Result<Value> {
        Err(self.unimplemented(TensorOpKind::Concat))
    }

    #[doc(hidden)]
    fn unimplemented(&self, op: TensorOpKind) -> TensorError {
        TensorError::Unimplemented {
            engine: self.name(),
            op,
        }
    }
}

/// Union of both types; shared dimensions must agree in size.
pub(crate) fn join_type(lhs: &TensorType, rhs: &TensorType) -> Result<TensorType> {
    let mut dims: Vec<DimensionSpec> = lhs.dimensions().to_vec();
    for d in rhs.dimensions() {
        match lhs.size_of(&d.name) {
            Some(size) if size != d.size => {
                return Err(TensorError::DimensionMismatch {
                    dimension: d.name.clone(),
                    lhs: size,
                    rhs: d.size,
                })
            }
            Some(_) => {}
            None => dims.push(d.clone()),
        }
    }
    TensorType::new(dims)
}

/// Type left after aggregating over `dimensions`; all of them when empty.
pub(crate) fn reduce_type(ty: &TensorType, dimensions: &[String]) -> Result<TensorType> {
    if dimensions.is_empty() {
        return Ok(TensorType::scalar());
    }
    for (i, name) in dimensions.iter().enumerate() {
        if ty.dim_index(name).is_none() {
            return Err(TensorError::DimensionNotFound(name.clone()));
        }
        if dimensions[..i].contains(name) {
            return Err(TensorError::DuplicateDimension(name.clone()));
        }
    }
    let kept = ty
        .dimensions()
        .iter()
        .filter(|d| !dimensions.contains(&d.name))
        .cloned()
        .collect();
    TensorType::new(kept)
}

/// Renamed type, plus the new name of each source dimension in source order.
pub(crate) fn rename_type(
    ty: &TensorType,
    from: &[String],
    to: &[String],
) -> Result<(TensorType, Vec<String>)> {
    if from.len() != to.len() {
        return Err(TensorError::RenameArity {
            from: from.len(),
            to: to.len(),
        });
    }
    for (i, name) in from.iter().enumerate() {
        if ty.dim_index(name).is_none() {
            return Err(TensorError::DimensionNotFound(name.clone()));
        }
        if from[..i].contains(name) {
            return Err(TensorError::DuplicateDimension(name.clone()));
        }
    }
    let names: Vec<String> = ty
        .dimensions()
        .iter()
        .map(|d| match from.iter().position(|f| *f == d.name) {
            Some(i) => to[i].clone(),
            None => d.name.clone(),
        })
        .collect();
    let dims = ty
        .dimensions()
        .iter()
        .zip(&names)
        .map(|(d, name)| DimensionSpec::new(name.clone(), d.size))
        .collect();
    Ok((TensorType::new(dims)?, names))
}

/// Result type of `concat`, the size of `lhs` along `dimension` and the
/// position of `dimension` in the result.
///
/// An operand without `dimension` counts as size 1 along it.
pub(crate) fn concat_type(
    lhs: &TensorType,
    rhs: &TensorType,
    dimension: &str,
) -> Result<(TensorType, usize, usize)> {
    let lhs_size = lhs.size_of(dimension).unwrap_or(1);
    let rhs_size = rhs.size_of(dimension).unwrap_or(1);
    let without = |ty: &TensorType| {
        ty.dimensions()
            .iter()
            .filter(|d| d.name != dimension)
            .cloned()
            .collect::<Vec<_>>()
    };
    let common = join_type(&TensorType::new(without(lhs))?, &TensorType::new(without(rhs))?)?;
    let mut dims = common.dimensions().to_vec();
    let size = lhs_size
        .checked_add(rhs_size)
        .ok_or_else(|| TensorError::TooManyCells(format!("{dimension}[{lhs_size}+{rhs_size}]")))?;
    dims.push(DimensionSpec::new(dimension, size));
    let ty = TensorType::new(dims)?;
    let axis = common
        .dimensions()
        .iter()
        .filter(|d| d.name.as_str() < dimension)
        .count();
    Ok((ty, lhs_size, axis))
}

/// For each dimension of `target`, the stride of the same-named dimension in
/// `source`, or 0 when `source` lacks it.
pub(crate) fn project_strides(
    target: &TensorType,
    source_names: &[String],
    source: &TensorType,
) -> Vec<usize> {
    let strides = source.strides();
    target
        .dimensions()
        .iter()
        .map(|d| {
            source_names
                .iter()
                .position(|n| *n == d.name)
                .map_or(0, |i| strides[i])
        })
        .collect()
}

/// Names of `ty`'s dimensions in order.
pub(crate) fn dim_names(ty: &TensorType) -> Vec<String> {
    ty.dimensions().iter().map(|d| d.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Partial;

    impl TensorEngine for Partial {
        fn name(&self) -> &'static str {
            "partial"
        }

        fn map(&self, value: &Value, f: CellFn<'_>) -> Result<Value> {
            Ok(Value::Double(f(value.as_double().unwrap_or(0.0))))
        }
    }

    fn ty(dims: &[(&str, usize)]) -> TensorType {
        TensorType::new(dims.iter().map(|(n, s)| DimensionSpec::new(*n, *s)).collect()).unwrap()
    }

    #[test]
    fn test_default_methods_are_unimplemented() {
        let engine = Partial;
        let v = Value::Double(2.0);
        assert_eq!(engine.map(&v, &|x| x * 2.0).unwrap(), Value::Double(4.0));
        let err = engine.sum(&v, None).unwrap_err();
        assert!(err.is_unimplemented());
        assert_eq!(err.to_string(), "partial engine does not implement sum");
        assert!(engine.concat(&v, &v, "x").unwrap_err().is_unimplemented());
    }

    #[test]
    fn test_join_type() {
        let t = join_type(&ty(&[("y", 2), ("x", 3)]), &ty(&[("z", 4), ("y", 2)])).unwrap();
        assert_eq!(t.to_string(), "tensor(x[3],y[2],z[4])");
        let err = join_type(&ty(&[("x", 3)]), &ty(&[("x", 2)])).unwrap_err();
        assert_eq!(
            err,
            TensorError::DimensionMismatch {
                dimension: "x".into(),
                lhs: 3,
                rhs: 2
            }
        );
    }

    #[test]
    fn test_reduce_type() {
        let t = ty(&[("x", 3), ("y", 2)]);
        assert!(reduce_type(&t, &[]).unwrap().is_scalar());
        assert_eq!(reduce_type(&t, &["x".into()]).unwrap(), ty(&[("y", 2)]));
        assert_eq!(
            reduce_type(&t, &["q".into()]).unwrap_err(),
            TensorError::DimensionNotFound("q".into())
        );
        assert_eq!(
            reduce_type(&t, &["x".into(), "x".into()]).unwrap_err(),
            TensorError::DuplicateDimension("x".into())
        );
    }

    #[test]
    fn test_rename_type() {
        let t = ty(&[("x", 3), ("y", 2)]);
        let (renamed, names) = rename_type(&t, &["x".into()], &["z".into()]).unwrap();
        assert_eq!(renamed, ty(&[("y", 2), ("z", 3)]));
        assert_eq!(names, vec!["z".to_string(), "y".to_string()]);
        assert_eq!(
            rename_type(&t, &["x".into()], &[]).unwrap_err(),
            TensorError::RenameArity { from: 1, to: 0 }
        );
        assert_eq!(
            rename_type(&t, &["x".into()], &["y".into()]).unwrap_err(),
            TensorError::DuplicateDimension("y".into())
        );
    }

    #[test]
    fn test_concat_type() {
        let (t, lhs, axis) = concat_type(&ty(&[("x", 2)]), &TensorType::scalar(), "x").unwrap();
        assert_eq!(t, ty(&[("x", 3)]));
        assert_eq!((lhs, axis), (2, 0));
        let (t, _, axis) = concat_type(&ty(&[("y", 2)]), &ty(&[("x", 2)]), "y").unwrap();
        assert_eq!(t, ty(&[("x", 2), ("y", 3)]));
        assert_eq!(axis, 1);
        assert!(concat_type(&ty(&[("y", 2)]), &ty(&[("y", 3)]), "x").is_err());
    }
}
