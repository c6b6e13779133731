//! The shared catalog of expressions and expected results.
//!
//! Most cases come from rules: an expression, its parameter names, a grid of
//! values swept over every parameter, and a plain Rust closure computing the
//! expected result. The rest are explicit cases for constants and special
//! values. Every compiler and engine is measured against the same catalog.
//!
//! # Example
//!
//! ```
//! use evalforge_test::EvalSpec;
//!
//! let spec = EvalSpec::all();
//! assert!(spec.cases().len() >= 1000);
//! assert!(spec.expressions().iter().any(|e| e.expression.starts_with("sum(")));
//! ```

use std::fmt;

use evalforge_core::operation::{approx, ldexp, sigmoid};

/// Values swept for single-parameter rules.
pub const UNARY_GRID: [f64; 8] = [-2.5, -1.0, -0.5, 0.0, 0.5, 1.0, 2.0, 3.0];

/// Values swept for two-parameter rules.
pub const BINARY_GRID: [f64; 6] = [-2.0, -0.5, 0.0, 0.5, 1.0, 3.0];

/// Values swept for three-parameter rules.
pub const TERNARY_GRID: [f64; 4] = [-1.5, 0.0, 0.5, 2.0];

/// Values swept for rules over tensor expressions.
pub const TENSOR_GRID: [f64; 4] = [-1.0, 0.0, 1.5, 3.0];

/// One expression evaluated at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalCase {
    pub param_names: Vec<String>,
    pub param_values: Vec<f64>,
    pub expression: String,
    pub expected: f64,
}

impl EvalCase {
    /// Human-readable form used in failure reports.
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EvalCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)?;
        if !self.param_names.is_empty() {
            write!(f, " with ")?;
            for (i, (name, value)) in self.param_names.iter().zip(&self.param_values).enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name}={value}")?;
            }
        }
        write!(f, " = {}", self.expected)
    }
}

/// A distinct expression in the catalog together with its parameter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalExpression {
    pub param_names: Vec<String>,
    pub expression: String,
}

/// Catalog of conformance cases.
#[derive(Debug, Clone, Default)]
pub struct EvalSpec {
    cases: Vec<EvalCase>,
    expressions: Vec<EvalExpression>,
}

impl EvalSpec {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full catalog.
    pub fn all() -> Self {
        let mut spec = Self::new();
        spec.add_all_cases();
        spec
    }

    pub fn cases(&self) -> &[EvalCase] {
        &self.cases
    }

    /// Every distinct expression, in insertion order.
    pub fn expressions(&self) -> &[EvalExpression] {
        &self.expressions
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn add_all_cases(&mut self) {
        self.add_constant_cases();
        self.add_special_value_cases();
        self.add_unary_cases();
        self.add_binary_cases();
        self.add_precedence_cases();
        self.add_conditional_cases();
        self.add_membership_cases();
        self.add_wide_cases();
        self.add_tensor_cases();
    }

    /// Adds one explicit case.
    pub fn add_case(&mut self, names: &[&str], values: &[f64], expression: &str, expected: f64) {
        assert_eq!(
            names.len(),
            values.len(),
            "case '{expression}' needs one value per parameter"
        );
        self.note_expression(names, expression);
        self.cases.push(EvalCase {
            param_names: names.iter().map(|n| n.to_string()).collect(),
            param_values: values.to_vec(),
            expression: expression.to_string(),
            expected,
        });
    }

    /// Adds one case for every combination of `grid` values over `names`,
    /// with the expected result computed by `reference`.
    pub fn add_rule<F>(&mut self, names: &[&str], expression: &str, grid: &[f64], reference: F)
    where
        F: Fn(&[f64]) -> f64,
    {
        self.note_expression(names, expression);
        if names.is_empty() {
            self.add_case(names, &[], expression, reference(&[]));
            return;
        }
        if grid.is_empty() {
            return;
        }
        let mut index = vec![0usize; names.len()];
        loop {
            let values: Vec<f64> = index.iter().map(|&i| grid[i]).collect();
            let expected = reference(&values);
            self.add_case(names, &values, expression, expected);

            // Odometer over the grid, last parameter fastest.
            let mut d = index.len();
            loop {
                if d == 0 {
                    return;
                }
                d -= 1;
                index[d] += 1;
                if index[d] < grid.len() {
                    break;
                }
                index[d] = 0;
            }
        }
    }

    fn note_expression(&mut self, names: &[&str], expression: &str) {
        let known = self
            .expressions
            .iter()
            .any(|e| e.expression == expression && e.param_names == names);
        if !known {
            self.expressions.push(EvalExpression {
                param_names: names.iter().map(|n| n.to_string()).collect(),
                expression: expression.to_string(),
            });
        }
    }

    pub fn add_constant_cases(&mut self) {
        let constants: &[(&str, f64)] = &[
            ("0", 0.0),
            ("1", 1.0),
            ("2.5", 2.5),
            ("-3", -3.0),
            ("1e3", 1000.0),
            ("2.5e-1", 0.25),
            ("true", 1.0),
            ("false", 0.0),
            ("!true", 0.0),
            ("!false", 1.0),
            ("1+2*3", 7.0),
            ("(1+2)*3", 9.0),
            ("2^3^2", 512.0),
            ("-2^2", 4.0),
            ("10-4-3", 3.0),
            ("100/10/5", 2.0),
            ("10%3", 1.0),
            ("if(1,2,3)", 2.0),
            ("if(0,2,3)", 3.0),
            ("3 in [1,2,3]", 1.0),
            ("4 in [1,2,3]", 0.0),
            ("relu(-3)", 0.0),
            ("relu(3)", 3.0),
            ("sigmoid(0)", 0.5),
            ("max(1,2)", 2.0),
            ("min(1,2)", 1.0),
            ("ldexp(3,2)", 12.0),
            ("atan2(0,1)", 0.0),
            ("pow(2,10)", 1024.0),
            ("fmod(7,4)", 3.0),
            ("1~=1.0000000001", 1.0),
            ("1~=1.1", 0.0),
            ("true&&false", 0.0),
            ("true||false", 1.0),
            ("fabs(-7.25)", 7.25),
            ("floor(-1.5)+ceil(-1.5)", -3.0),
            ("sqrt(16)", 4.0),
            ("(1+2)*(3+4)-5", 16.0),
        ];
        for (expression, expected) in constants {
            self.add_case(&[], &[], expression, *expected);
        }
    }

    /// Infinities, NaN and the boolean view of them.
    pub fn add_special_value_cases(&mut self) {
        let special: &[(&str, f64)] = &[
            ("1/0", f64::INFINITY),
            ("-1/0", f64::NEG_INFINITY),
            ("0/0", f64::NAN),
            ("isNan(0/0)", 1.0),
            ("isNan(1/0)", 0.0),
            ("0/0==0/0", 0.0),
            ("0/0!=0/0", 1.0),
            ("min(0/0,1)", f64::NAN),
            ("min(1,0/0)", 1.0),
            ("max(1,0/0)", 1.0),
            ("max(0/0,1)", f64::NAN),
            ("relu(0/0)", f64::NAN),
            ("if(0/0,1,2)", 1.0),
            ("!(0/0)", 0.0),
            ("(0/0) in [0]", 0.0),
            ("(0/0)&&1", 1.0),
            ("1/0>1e308", 1.0),
            ("exp(1000)", f64::INFINITY),
            ("log(0)", f64::NEG_INFINITY),
            ("sqrt(-1)", f64::NAN),
            ("5%0", f64::NAN),
            ("ldexp(1,2000)", f64::INFINITY),
            ("ldexp(1,-2000)", 0.0),
        ];
        for (expression, expected) in special {
            self.add_case(&[], &[], expression, *expected);
        }
    }

    pub fn add_unary_cases(&mut self) {
        let rules: &[(&str, fn(f64) -> f64)] = &[
            ("-a", |a| -a),
            ("!a", |a| bool_value(a == 0.0)),
            ("cos(a)", f64::cos),
            ("sin(a)", f64::sin),
            ("tan(a)", f64::tan),
            ("cosh(a)", f64::cosh),
            ("sinh(a)", f64::sinh),
            ("tanh(a)", f64::tanh),
            ("acos(a)", f64::acos),
            ("asin(a)", f64::asin),
            ("atan(a)", f64::atan),
            ("exp(a)", f64::exp),
            ("log10(a)", f64::log10),
            ("log(a)", f64::ln),
            ("sqrt(a)", f64::sqrt),
            ("ceil(a)", f64::ceil),
            ("fabs(a)", f64::abs),
            ("floor(a)", f64::floor),
            ("isNan(a)", |a| bool_value(a.is_nan())),
            ("relu(a)", |a| if a < 0.0 { 0.0 } else { a }),
            ("sigmoid(a)", sigmoid),
        ];
        for (expression, f) in rules {
            self.add_rule(&["a"], expression, &UNARY_GRID, |p| f(p[0]));
        }
    }

    pub fn add_binary_cases(&mut self) {
        let rules: &[(&str, fn(f64, f64) -> f64)] = &[
            ("a+b", |a, b| a + b),
            ("a-b", |a, b| a - b),
            ("a*b", |a, b| a * b),
            ("a/b", |a, b| a / b),
            ("a%b", |a, b| a % b),
            ("a^b", f64::powf),
            ("a==b", |a, b| bool_value(a == b)),
            ("a!=b", |a, b| bool_value(a != b)),
            ("a~=b", |a, b| bool_value(approx(a, b))),
            ("a<b", |a, b| bool_value(a < b)),
            ("a<=b", |a, b| bool_value(a <= b)),
            ("a>b", |a, b| bool_value(a > b)),
            ("a>=b", |a, b| bool_value(a >= b)),
            ("a&&b", |a, b| bool_value(a != 0.0 && b != 0.0)),
            ("a||b", |a, b| bool_value(a != 0.0 || b != 0.0)),
            ("pow(a,b)", f64::powf),
            ("fmod(a,b)", |a, b| a % b),
            ("atan2(a,b)", f64::atan2),
            ("ldexp(a,b)", ldexp),
            ("min(a,b)", |a, b| if b < a { b } else { a }),
            ("max(a,b)", |a, b| if a < b { b } else { a }),
        ];
        for (expression, f) in rules {
            self.add_rule(&["a", "b"], expression, &BINARY_GRID, |p| f(p[0], p[1]));
        }
    }

    pub fn add_precedence_cases(&mut self) {
        let rules: &[(&str, fn(f64, f64, f64) -> f64)] = &[
            ("a+b*c", |a, b, c| a + b * c),
            ("a*b+c", |a, b, c| a * b + c),
            ("(a+b)*c", |a, b, c| (a + b) * c),
            ("a-b-c", |a, b, c| (a - b) - c),
            ("a/b/c", |a, b, c| (a / b) / c),
            ("a^b^c", |a, b, c| a.powf(b.powf(c))),
            ("-a^b", |a, b, _| (-a).powf(b)),
            ("a%b*c", |a, b, c| (a % b) * c),
            ("a*-b+c", |a, b, c| a * -b + c),
            ("a-(-b)-c", |a, b, c| a + b - c),
            ("a+b<c", |a, b, c| bool_value(a + b < c)),
            ("a<b&&b<c", |a, b, c| bool_value(a < b && b < c)),
            ("a==b||b==c&&c==a", |a, b, c| {
                bool_value(a == b || (b == c && c == a))
            }),
            ("!a||b", |a, b, _| bool_value(a == 0.0 || b != 0.0)),
            ("!(a&&b)", |a, b, _| bool_value(!(a != 0.0 && b != 0.0))),
            ("min(a,b)+max(b,c)", |a, b, c| {
                (if b < a { b } else { a }) + (if b < c { c } else { b })
            }),
            ("atan2(a,b)*c", |a, b, c| a.atan2(b) * c),
            ("sqrt(a*a+b*b+c*c)", |a, b, c| (a * a + b * b + c * c).sqrt()),
        ];
        for (expression, f) in rules {
            self.add_rule(&["a", "b", "c"], expression, &TERNARY_GRID, |p| {
                f(p[0], p[1], p[2])
            });
        }
    }

    /// `if`, including nesting, truthiness of the condition and the ignored
    /// probability hint.
    pub fn add_conditional_cases(&mut self) {
        let rules: &[(&str, fn(f64, f64, f64) -> f64)] = &[
            ("if(a<b,a,b)", |a, b, _| if a < b { a } else { b }),
            ("if(a,b,c)", |a, b, c| if a != 0.0 { b } else { c }),
            ("if(a>=b,if(b>=c,a,b),c)", |a, b, c| {
                if a >= b {
                    if b >= c {
                        a
                    } else {
                        b
                    }
                } else {
                    c
                }
            }),
            ("if(a==b,1,0)+if(b==c,1,0)", |a, b, c| {
                bool_value(a == b) + bool_value(b == c)
            }),
            ("if(isNan(a/b),c,a/b)", |a, b, c| {
                if (a / b).is_nan() {
                    c
                } else {
                    a / b
                }
            }),
            ("if(a||b,c,-c)", |a, b, c| {
                if a != 0.0 || b != 0.0 {
                    c
                } else {
                    -c
                }
            }),
            ("a||b||c", |a, b, c| bool_value(a != 0.0 || b != 0.0 || c != 0.0)),
            ("a&&b&&c", |a, b, c| bool_value(a != 0.0 && b != 0.0 && c != 0.0)),
            ("if(a,b,c,0.75)", |a, b, c| if a != 0.0 { b } else { c }),
            ("if(b!=0&&a/b>1,a,c)", |a, b, c| {
                if b != 0.0 && a / b > 1.0 {
                    a
                } else {
                    c
                }
            }),
        ];
        for (expression, f) in rules {
            self.add_rule(&["a", "b", "c"], expression, &TERNARY_GRID, |p| {
                f(p[0], p[1], p[2])
            });
        }
    }

    /// `in` with integer, fractional, negative and empty sets.
    pub fn add_membership_cases(&mut self) {
        let rules: &[(&str, fn(f64) -> f64)] = &[
            ("a in [1,2,3]", |a| bool_value([1.0, 2.0, 3.0].contains(&a))),
            ("a in {-1,0.5,3}", |a| bool_value([-1.0, 0.5, 3.0].contains(&a))),
            ("a in []", |_| 0.0),
            ("if(a in [0.5,-2.5,3],a,-a)", |a| {
                if [0.5, -2.5, 3.0].contains(&a) {
                    a
                } else {
                    -a
                }
            }),
            ("(a*2) in [1,2,4,6]", |a| bool_value([1.0, 2.0, 4.0, 6.0].contains(&(a * 2.0)))),
            ("!(a in [0])", |a| bool_value(a != 0.0)),
            ("a+1 in [1]", |a| a + 1.0),
        ];
        for (expression, f) in rules {
            self.add_rule(&["a"], expression, &UNARY_GRID, |p| f(p[0]));
        }
        let members: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let large = format!("a in [{}]", members.join(","));
        self.add_rule(&["a"], &large, &[-1.0, 0.0, 42.0, 99.0, 99.5, 100.0], |p| {
            bool_value(p[0] >= 0.0 && p[0] < 100.0 && p[0].fract() == 0.0)
        });
    }

    /// Expressions with more parameters than fit in registers.
    pub fn add_wide_cases(&mut self) {
        let names = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l"];
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        self.add_case(&names, &values, "a+b+c+d+e+f+g+h+i+j+k+l", 78.0);
        self.add_case(&names, &values, "l*k-a*b", 130.0);
        self.add_case(&names, &values, "if(l>k,j,i)", 10.0);
        self.add_case(&names, &values, "max(a,l)-min(f,g)", 6.0);
    }

    /// Expressions using tensor operations; each one starts with a tensor
    /// operation name and evaluates to a double.
    pub fn add_tensor_cases(&mut self) {
        let rules: &[(&str, fn(f64) -> f64)] = &[
            ("sum(tensor(x[3])(x+a))", |a| 3.0 * a + 3.0),
            ("sum(tensor(x[3])(x+a),x)", |a| 3.0 * a + 3.0),
            ("sum(map(tensor(x[4])(x),f(v)(v*v+a)))", |a| 14.0 + 4.0 * a),
            ("sum(join(tensor(x[2])(x+1),tensor(y[3])(y),f(p,q)(p*q*a)))", |a| 9.0 * a),
            ("sum(tensor(x[2])(x)*a+tensor(x[2])(1))", |a| a + 2.0),
            ("sum(tensor(x[2],y[2])(if(x==y,a,0)))", |a| 2.0 * a),
            ("sum(concat(tensor(x[2])(x),a,x))", |a| 1.0 + a),
            ("sum(rename(tensor(x[3])(x*a),x,y),y)", |a| 3.0 * a),
            ("reduce(tensor(x[3])(x+a),avg)", |a| a + 1.0),
            ("reduce(tensor(x[3])(x+a),count)", |_| 3.0),
            ("reduce(tensor(x[3])(x+a),prod)", |a| a * (a + 1.0) * (a + 2.0)),
            ("reduce(tensor(x[2],y[3])(x*y-a),max)", |a| 2.0 - a),
            ("reduce(tensor(x[2],y[3])(x*y-a),min)", |a| -a),
            ("reduce(tensor(x[3],y[2])(x+y*a),sum,x,y)", |a| 6.0 + 3.0 * a),
            ("map(sum(tensor(x[3])(x)),f(v)(v+a))", |a| 3.0 + a),
            ("join(a,2,f(p,q)(p*q))", |a| 2.0 * a),
        ];
        for (expression, f) in rules {
            self.add_rule(&["a"], expression, &TENSOR_GRID, |p| f(p[0]));
        }
    }
}

fn bool_value(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
