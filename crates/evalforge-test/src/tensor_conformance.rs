//! Direct checks of a [`TensorEngine`] implementation.
//!
//! Three kinds of checks run against the engine under test:
//! hand-computed results for each operation, the exact error raised for
//! invalid shapes, and seeded random inputs compared with
//! [`SimpleTensorEngine`].

use evalforge_core::{Aggr, DimensionSpec};
use evalforge_tensor::{SimpleTensorEngine, Tensor, TensorEngine, TensorError, TensorType, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::conformance::is_same;

/// Seed used by [`TensorConformance::new`].
pub const DEFAULT_SEED: u64 = 0x5eed;

/// Random rounds run by [`TensorConformance::new`].
pub const DEFAULT_ROUNDS: usize = 64;

const EPSILON: f64 = 1e-12;

type Result<T> = std::result::Result<T, TensorError>;

/// Outcome of a tensor engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TensorReport {
    pub pass_count: usize,
    pub fail_count: usize,
    pub failures: Vec<String>,
}

impl TensorReport {
    pub fn is_conformant(&self) -> bool {
        self.fail_count == 0 && self.pass_count > 0
    }
}

struct Checker {
    engine: &'static str,
    report: TensorReport,
}

impl Checker {
    fn pass(&mut self) {
        self.report.pass_count += 1;
    }

    fn fail(&mut self, name: &str, message: String) {
        warn!(engine = self.engine, check = name, "{message}");
        self.report.fail_count += 1;
        self.report.failures.push(format!("{name}: {message}"));
    }

    fn value(&mut self, name: &str, actual: Result<Value>, expected: Value) {
        match actual {
            Ok(actual) if same_value(&actual, &expected) => self.pass(),
            Ok(actual) => self.fail(name, format!("expected {expected}, got {actual}")),
            Err(err) => self.fail(name, format!("expected {expected}, got error: {err}")),
        }
    }

    fn error(&mut self, name: &str, actual: Result<Value>, expected: TensorError) {
        match actual {
            Err(err) if err == expected => self.pass(),
            Err(err) => self.fail(name, format!("expected error '{expected}', got '{err}'")),
            Ok(value) => self.fail(name, format!("expected error '{expected}', got {value}")),
        }
    }

    /// Both engines must produce the same value or the same error.
    fn agree(&mut self, name: &str, actual: Result<Value>, reference: Result<Value>) {
        match (actual, reference) {
            (Ok(a), Ok(r)) if same_value(&a, &r) => self.pass(),
            (Err(a), Err(r)) if a == r => self.pass(),
            (actual, reference) => self.fail(
                name,
                format!("reference gave {}, engine gave {}", show(&reference), show(&actual)),
            ),
        }
    }
}

fn show(result: &Result<Value>) -> String {
    match result {
        Ok(value) => value.to_string(),
        Err(err) => format!("error: {err}"),
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    a.tensor_type() == b.tensor_type()
        && a
            .cells()
            .iter()
            .zip(b.cells())
            .all(|(x, y)| is_same(*x, *y, EPSILON, EPSILON))
}

fn ty(dims: &[(&str, usize)]) -> Result<TensorType> {
    TensorType::new(dims.iter().map(|(n, s)| DimensionSpec::new(*n, *s)).collect())
}

fn tensor(dims: &[(&str, usize)], cells: &[f64]) -> Result<Value> {
    Ok(Value::Tensor(Tensor::new(ty(dims)?, cells.to_vec())?))
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Conformance checks for one engine.
pub struct TensorConformance<'e> {
    engine: &'e dyn TensorEngine,
    reference: SimpleTensorEngine,
    seed: u64,
    rounds: usize,
}

impl<'e> TensorConformance<'e> {
    pub fn new(engine: &'e dyn TensorEngine) -> Self {
        Self {
            engine,
            reference: SimpleTensorEngine::new(),
            seed: DEFAULT_SEED,
            rounds: DEFAULT_ROUNDS,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Runs every check and reports the outcome.
    pub fn run_all_tests(&self) -> TensorReport {
        let mut check = Checker {
            engine: self.engine.name(),
            report: TensorReport::default(),
        };
        let groups: [(&str, fn(&Self, &mut Checker) -> Result<()>); 8] = [
            ("map", Self::test_map),
            ("join", Self::test_join),
            ("reduce", Self::test_reduce),
            ("sum", Self::test_sum),
            ("rename", Self::test_rename),
            ("create", Self::test_create),
            ("concat", Self::test_concat),
            ("random", Self::test_random),
        ];
        for (name, group) in groups {
            if let Err(err) = group(self, &mut check) {
                check.fail(name, format!("fixture could not be built: {err}"));
            }
        }
        info!(
            engine = check.engine,
            pass = check.report.pass_count,
            fail = check.report.fail_count,
            "tensor conformance finished"
        );
        check.report
    }

    fn test_map(&self, check: &mut Checker) -> Result<()> {
        let e = self.engine;
        check.value(
            "map doubles each cell",
            e.map(&tensor(&[("x", 3)], &[1.0, 2.0, 3.0])?, &|v| v * 2.0),
            tensor(&[("x", 3)], &[2.0, 4.0, 6.0])?,
        );
        check.value(
            "map keeps the type",
            e.map(&tensor(&[("x", 2), ("y", 2)], &[1.0, -2.0, 3.0, -4.0])?, &f64::abs),
            tensor(&[("x", 2), ("y", 2)], &[1.0, 2.0, 3.0, 4.0])?,
        );
        check.value(
            "map over a double",
            e.map(&Value::Double(-2.0), &f64::abs),
            Value::Double(2.0),
        );
        Ok(())
    }

    fn test_join(&self, check: &mut Checker) -> Result<()> {
        let e = self.engine;
        let x = tensor(&[("x", 2)], &[1.0, 2.0])?;
        let y = tensor(&[("y", 3)], &[10.0, 20.0, 30.0])?;
        check.value(
            "join broadcasts disjoint dimensions",
            e.join(&x, &y, &|a, b| a + b),
            tensor(&[("x", 2), ("y", 3)], &[11.0, 21.0, 31.0, 12.0, 22.0, 32.0])?,
        );
        let xy = tensor(&[("x", 2), ("y", 2)], &[1.0, 2.0, 3.0, 4.0])?;
        check.value(
            "join matches shared dimensions",
            e.join(&xy, &x, &|a, b| a * b),
            tensor(&[("x", 2), ("y", 2)], &[1.0, 2.0, 6.0, 8.0])?,
        );
        check.value(
            "join with a double on the left",
            e.join(&Value::Double(10.0), &x, &|a, b| a - b),
            tensor(&[("x", 2)], &[9.0, 8.0])?,
        );
        check.value(
            "join of two doubles",
            e.join(&Value::Double(3.0), &Value::Double(4.0), &|a, b| a * b),
            Value::Double(12.0),
        );
        check.error(
            "join rejects mismatched sizes",
            e.join(&x, &tensor(&[("x", 3)], &[1.0, 2.0, 3.0])?, &|a, b| a + b),
            TensorError::DimensionMismatch {
                dimension: "x".into(),
                lhs: 2,
                rhs: 3,
            },
        );
        Ok(())
    }

    fn test_reduce(&self, check: &mut Checker) -> Result<()> {
        let e = self.engine;
        let t = tensor(&[("x", 2), ("y", 3)], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        let everything: &[(Aggr, f64)] = &[
            (Aggr::Avg, 3.5),
            (Aggr::Count, 6.0),
            (Aggr::Prod, 720.0),
            (Aggr::Sum, 21.0),
            (Aggr::Max, 6.0),
            (Aggr::Min, 1.0),
        ];
        for (aggr, expected) in everything {
            check.value(
                &format!("reduce {} over everything", aggr.name()),
                e.reduce(&t, *aggr, &[]),
                Value::Double(*expected),
            );
        }
        check.value(
            "reduce sum over y",
            e.reduce(&t, Aggr::Sum, &names(&["y"])),
            tensor(&[("x", 2)], &[6.0, 15.0])?,
        );
        check.value(
            "reduce max over x",
            e.reduce(&t, Aggr::Max, &names(&["x"])),
            tensor(&[("y", 3)], &[4.0, 5.0, 6.0])?,
        );
        check.value(
            "reduce naming every dimension",
            e.reduce(&t, Aggr::Avg, &names(&["y", "x"])),
            Value::Double(3.5),
        );
        check.value(
            "reduce a double",
            e.reduce(&Value::Double(5.0), Aggr::Count, &[]),
            Value::Double(1.0),
        );
        check.error(
            "reduce rejects an unknown dimension",
            e.reduce(&t, Aggr::Sum, &names(&["z"])),
            TensorError::DimensionNotFound("z".into()),
        );
        check.error(
            "reduce rejects a repeated dimension",
            e.reduce(&t, Aggr::Sum, &names(&["x", "x"])),
            TensorError::DuplicateDimension("x".into()),
        );
        Ok(())
    }

    fn test_sum(&self, check: &mut Checker) -> Result<()> {
        let e = self.engine;
        let t = tensor(&[("x", 2), ("y", 3)], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        check.value("sum over everything", e.sum(&t, None), Value::Double(21.0));
        check.value(
            "sum over x",
            e.sum(&t, Some("x")),
            tensor(&[("y", 3)], &[5.0, 7.0, 9.0])?,
        );
        check.error(
            "sum rejects an unknown dimension",
            e.sum(&t, Some("q")),
            TensorError::DimensionNotFound("q".into()),
        );
        Ok(())
    }

    fn test_rename(&self, check: &mut Checker) -> Result<()> {
        let e = self.engine;
        let t = tensor(&[("x", 2), ("y", 3)], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
        check.value(
            "rename reorders cells",
            e.rename(&t, &names(&["x"]), &names(&["z"])),
            tensor(&[("y", 3), ("z", 2)], &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0])?,
        );
        check.value(
            "rename swapping names transposes",
            e.rename(&t, &names(&["x", "y"]), &names(&["y", "x"])),
            tensor(&[("x", 3), ("y", 2)], &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0])?,
        );
        check.value(
            "rename keeping order",
            e.rename(&t, &names(&["y"]), &names(&["z"])),
            tensor(&[("x", 2), ("z", 3)], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?,
        );
        check.error(
            "rename rejects unequal lists",
            e.rename(&t, &names(&["x", "y"]), &names(&["z"])),
            TensorError::RenameArity { from: 2, to: 1 },
        );
        check.error(
            "rename rejects an unknown dimension",
            e.rename(&t, &names(&["w"]), &names(&["z"])),
            TensorError::DimensionNotFound("w".into()),
        );
        check.error(
            "rename rejects a name collision",
            e.rename(&t, &names(&["x"]), &names(&["y"])),
            TensorError::DuplicateDimension("y".into()),
        );
        Ok(())
    }

    fn test_create(&self, check: &mut Checker) -> Result<()> {
        let e = self.engine;
        check.value(
            "create fills in row-major order",
            e.create(&ty(&[("y", 2), ("x", 2)])?, &|a| (a[0] * 10 + a[1]) as f64),
            tensor(&[("x", 2), ("y", 2)], &[0.0, 1.0, 10.0, 11.0])?,
        );
        check.value(
            "create with no dimensions is a double",
            e.create(&TensorType::scalar(), &|a| a.len() as f64 + 7.0),
            Value::Double(7.0),
        );
        Ok(())
    }

    fn test_concat(&self, check: &mut Checker) -> Result<()> {
        let e = self.engine;
        check.value(
            "concat along a shared dimension",
            e.concat(
                &tensor(&[("x", 2)], &[1.0, 2.0])?,
                &tensor(&[("x", 3)], &[3.0, 4.0, 5.0])?,
                "x",
            ),
            tensor(&[("x", 5)], &[1.0, 2.0, 3.0, 4.0, 5.0])?,
        );
        check.value(
            "concat a double in front",
            e.concat(&Value::Double(9.0), &tensor(&[("x", 2)], &[1.0, 2.0])?, "x"),
            tensor(&[("x", 3)], &[9.0, 1.0, 2.0])?,
        );
        check.value(
            "concat two doubles",
            e.concat(&Value::Double(1.0), &Value::Double(2.0), "x"),
            tensor(&[("x", 2)], &[1.0, 2.0])?,
        );
        check.value(
            "concat broadcasts the other dimensions",
            e.concat(
                &tensor(&[("x", 2), ("y", 2)], &[1.0, 2.0, 3.0, 4.0])?,
                &tensor(&[("y", 2)], &[5.0, 6.0])?,
                "x",
            ),
            tensor(&[("x", 3), ("y", 2)], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?,
        );
        check.error(
            "concat rejects mismatched sizes",
            e.concat(
                &tensor(&[("y", 2)], &[1.0, 2.0])?,
                &tensor(&[("y", 3)], &[1.0, 2.0, 3.0])?,
                "x",
            ),
            TensorError::DimensionMismatch {
                dimension: "y".into(),
                lhs: 2,
                rhs: 3,
            },
        );
        Ok(())
    }

    /// Random shapes and cells, compared with the reference engine.
    fn test_random(&self, check: &mut Checker) -> Result<()> {
        let (e, r) = (self.engine, &self.reference);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        for _ in 0..self.rounds {
            let a = random_value(&mut rng, &["x", "y", "z"])?;
            let b = random_value(&mut rng, &["y", "w"])?;

            check.agree("random map", e.map(&a, &f64::sin), r.map(&a, &f64::sin));
            check.agree(
                "random join",
                e.join(&a, &b, &|p, q| p * q - q),
                r.join(&a, &b, &|p, q| p * q - q),
            );
            let dims = names(&pick_dims(&mut rng, &a));
            for aggr in Aggr::ALL {
                check.agree(
                    "random reduce",
                    e.reduce(&a, aggr, &dims),
                    r.reduce(&a, aggr, &dims),
                );
            }
            check.agree("random sum", e.sum(&a, Some("y")), r.sum(&a, Some("y")));
            let (from, to) = (names(&["x", "z"]), names(&["z", "v"]));
            check.agree(
                "random rename",
                e.rename(&a, &from, &to),
                r.rename(&a, &from, &to),
            );
            check.agree("random concat", e.concat(&a, &b, "y"), r.concat(&a, &b, "y"));
        }
        Ok(())
    }
}

/// A tensor over a random subset of `dims` with sizes 1 to 4, or a double
/// when the subset is empty.
fn random_value(rng: &mut ChaCha8Rng, dims: &[&str]) -> Result<Value> {
    let mut chosen = Vec::with_capacity(dims.len());
    for name in dims {
        if rng.random_bool(0.8) {
            chosen.push(DimensionSpec::new(*name, rng.random_range(1..5)));
        }
    }
    let ty = TensorType::new(chosen)?;
    if ty.is_scalar() {
        return Ok(Value::Double(rng.random_range(-5.0..5.0)));
    }
    let cells = (0..ty.cell_count())
        .map(|_| rng.random_range(-5.0..5.0))
        .collect();
    Ok(Value::Tensor(Tensor::new(ty, cells)?))
}

fn pick_dims<'v>(rng: &mut ChaCha8Rng, value: &'v Value) -> Vec<&'v str> {
    match value.as_tensor() {
        Some(t) => t
            .tensor_type()
            .dimensions()
            .iter()
            .filter(|_| rng.random_bool(0.5))
            .map(|d| d.name.as_str())
            .collect(),
        None => Vec::new(),
    }
}
