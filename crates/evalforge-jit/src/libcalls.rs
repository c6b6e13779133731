//! Math routines that Cranelift has no instruction for.
//!
//! Each shim is an `extern "C"` wrapper around the operator's reference
//! semantics in [`evalforge_core::operation`], so native and interpreted
//! results agree bit for bit. Shims are registered with every JIT module under
//! a fixed symbol name and imported on first use by the emitter.

use cranelift_jit::JITBuilder;
use evalforge_core::{BinaryOp, UnaryOp};

type UnaryShim = extern "C" fn(f64) -> f64;
type BinaryShim = extern "C" fn(f64, f64) -> f64;

macro_rules! unary_shims {
    ($($shim:ident => $op:ident),* $(,)?) => {
        $(
            extern "C" fn $shim(a: f64) -> f64 {
                UnaryOp::$op.apply(a)
            }
        )*

        const UNARY: &[(UnaryOp, &str, UnaryShim)] = &[
            $((UnaryOp::$op, concat!("evalforge_", stringify!($shim)), $shim as UnaryShim)),*
        ];
    };
}

macro_rules! binary_shims {
    ($($shim:ident => $op:ident),* $(,)?) => {
        $(
            extern "C" fn $shim(a: f64, b: f64) -> f64 {
                BinaryOp::$op.apply(a, b)
            }
        )*

        const BINARY: &[(BinaryOp, &str, BinaryShim)] = &[
            $((BinaryOp::$op, concat!("evalforge_", stringify!($shim)), $shim as BinaryShim)),*
        ];
    };
}

unary_shims! {
    cos => Cos,
    sin => Sin,
    tan => Tan,
    cosh => Cosh,
    sinh => Sinh,
    tanh => Tanh,
    acos => Acos,
    asin => Asin,
    atan => Atan,
    exp => Exp,
    log10 => Log10,
    log => Log,
    sigmoid => Sigmoid,
}

binary_shims! {
    fmod => Mod,
    pow => Pow,
    approx => Approx,
    atan2 => Atan2,
    ldexp => Ldexp,
}

/// Symbol name of the shim implementing `op`, if it needs one.
pub(crate) fn unary_symbol(op: UnaryOp) -> Option<&'static str> {
    UNARY
        .iter()
        .find(|(shim_op, _, _)| *shim_op == op)
        .map(|(_, name, _)| *name)
}

/// Symbol name of the shim implementing `op`, if it needs one.
pub(crate) fn binary_symbol(op: BinaryOp) -> Option<&'static str> {
    BINARY
        .iter()
        .find(|(shim_op, _, _)| *shim_op == op)
        .map(|(_, name, _)| *name)
}

/// Makes every shim resolvable by name in modules built from `builder`.
pub(crate) fn register(builder: &mut JITBuilder) {
    for (_, name, shim) in UNARY {
        builder.symbol(*name, *shim as *const u8);
    }
    for (_, name, shim) in BINARY {
        builder.symbol(*name, *shim as *const u8);
    }
}
