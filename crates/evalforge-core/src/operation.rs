//! Scalar semantics of every operator.
//!
//! These are the single source of truth for what an operator computes. The
//! interpreter calls them directly and the native compiler either emits
//! equivalent instructions or calls them through `extern "C"` shims.

use crate::node::{BinaryOp, UnaryOp};

/// Relative tolerance used by the `~=` operator.
pub const APPROX_EPSILON: f64 = 1e-6;

/// Boolean interpretation of a double; NaN counts as true.
#[inline]
pub fn is_true(value: f64) -> bool {
    value != 0.0
}

#[inline]
pub fn from_bool(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[inline]
pub fn min(a: f64, b: f64) -> f64 {
    if b < a {
        b
    } else {
        a
    }
}

#[inline]
pub fn max(a: f64, b: f64) -> f64 {
    if a < b {
        b
    } else {
        a
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= APPROX_EPSILON * a.abs().max(b.abs())
}

pub fn ldexp(a: f64, b: f64) -> f64 {
    // Clamp before the cast so huge exponents saturate instead of wrapping.
    let exp = b.clamp(-2200.0, 2200.0) as i32;
    if exp > 1023 {
        a * 2f64.powi(1023) * 2f64.powi(exp - 1023)
    } else if exp < -1022 {
        a * 2f64.powi(-1022) * 2f64.powi(exp + 1022)
    } else {
        a * 2f64.powi(exp)
    }
}

pub fn sigmoid(a: f64) -> f64 {
    1.0 / (1.0 + (-a).exp())
}

impl UnaryOp {
    /// Applies the operation to a single double.
    pub fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOp::Neg => -a,
            UnaryOp::Not => from_bool(!is_true(a)),
            UnaryOp::Cos => a.cos(),
            UnaryOp::Sin => a.sin(),
            UnaryOp::Tan => a.tan(),
            UnaryOp::Cosh => a.cosh(),
            UnaryOp::Sinh => a.sinh(),
            UnaryOp::Tanh => a.tanh(),
            UnaryOp::Acos => a.acos(),
            UnaryOp::Asin => a.asin(),
            UnaryOp::Atan => a.atan(),
            UnaryOp::Exp => a.exp(),
            UnaryOp::Log10 => a.log10(),
            UnaryOp::Log => a.ln(),
            UnaryOp::Sqrt => a.sqrt(),
            UnaryOp::Ceil => a.ceil(),
            UnaryOp::Fabs => a.abs(),
            UnaryOp::Floor => a.floor(),
            UnaryOp::IsNan => from_bool(a.is_nan()),
            UnaryOp::Relu => max(a, 0.0),
            UnaryOp::Sigmoid => sigmoid(a),
        }
    }
}

impl BinaryOp {
    /// Applies the operation to two doubles.
    ///
    /// `And` and `Or` evaluate both operands here; lazy evaluation is the
    /// caller's responsibility.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a % b,
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Equal => from_bool(a == b),
            BinaryOp::NotEqual => from_bool(a != b),
            BinaryOp::Approx => from_bool(approx(a, b)),
            BinaryOp::Less => from_bool(a < b),
            BinaryOp::LessEqual => from_bool(a <= b),
            BinaryOp::Greater => from_bool(a > b),
            BinaryOp::GreaterEqual => from_bool(a >= b),
            BinaryOp::And => from_bool(is_true(a) && is_true(b)),
            BinaryOp::Or => from_bool(is_true(a) || is_true(b)),
            BinaryOp::Atan2 => a.atan2(b),
            BinaryOp::Ldexp => ldexp(a, b),
            BinaryOp::Min => min(a, b),
            BinaryOp::Max => max(a, b),
        }
    }

    /// True for `&&` and `||`, whose right operand is evaluated lazily.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(is_true(1.0));
        assert!(is_true(-0.5));
        assert!(is_true(f64::NAN));
        assert!(!is_true(0.0));
        assert!(!is_true(-0.0));
    }

    #[test]
    fn test_division_by_zero_is_not_a_trap() {
        assert_eq!(BinaryOp::Div.apply(1.0, 0.0), f64::INFINITY);
        assert_eq!(BinaryOp::Div.apply(-1.0, 0.0), f64::NEG_INFINITY);
        assert!(BinaryOp::Div.apply(0.0, 0.0).is_nan());
        assert!(BinaryOp::Mod.apply(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_min_max_keep_first_operand_on_nan() {
        assert!(min(f64::NAN, 1.0).is_nan());
        assert_eq!(min(1.0, f64::NAN), 1.0);
        assert!(max(f64::NAN, 1.0).is_nan());
        assert_eq!(max(1.0, f64::NAN), 1.0);
        assert_eq!(UnaryOp::Relu.apply(-3.0), 0.0);
        assert_eq!(UnaryOp::Relu.apply(3.0), 3.0);
    }

    #[test]
    fn test_ldexp() {
        assert_eq!(ldexp(3.0, 2.0), 12.0);
        assert_eq!(ldexp(3.0, -1.0), 1.5);
        assert_eq!(ldexp(1.0, 1.9), 2.0);
        assert_eq!(ldexp(1.0, 1024.0), f64::INFINITY);
        assert_eq!(ldexp(1.0, 1023.0), 2f64.powi(1023));
        assert_eq!(ldexp(1.0, -1074.0), f64::from_bits(1));
    }

    #[test]
    fn test_approx() {
        assert_eq!(BinaryOp::Approx.apply(1.0, 1.0 + 1e-9), 1.0);
        assert_eq!(BinaryOp::Approx.apply(1.0, 1.1), 0.0);
        assert_eq!(BinaryOp::Approx.apply(f64::INFINITY, f64::INFINITY), 1.0);
    }

    #[test]
    fn test_not_and_is_nan() {
        assert_eq!(UnaryOp::Not.apply(0.0), 1.0);
        assert_eq!(UnaryOp::Not.apply(2.0), 0.0);
        assert_eq!(UnaryOp::Not.apply(f64::NAN), 0.0);
        assert_eq!(UnaryOp::IsNan.apply(f64::NAN), 1.0);
        assert_eq!(UnaryOp::IsNan.apply(1.0), 0.0);
    }
}
