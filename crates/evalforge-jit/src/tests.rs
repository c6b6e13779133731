//! Tests for native compilation and capability classification.

use evalforge_config::{JitConfig, OptLevel};
use evalforge_core::{BinaryOp, Function, LiteralSet, Node, UnaryOp};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::*;

const PARAMS_10: [&str; 10] = ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8", "p9", "p10"];
const EXPR_10: &str = "p1 + p2 + p3 + p4 + p5 + p6 + p7 + p8 + p9 + p10";

fn compile(params: &[&str], expr: &str, pass: PassParams) -> CompiledFunction {
    let function = Function::parse_with_params(params, expr);
    assert!(!function.has_error(), "{expr}: {:?}", function.error());
    CompiledFunction::new(&function, pass)
}

fn same(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

#[test]
fn test_separate_parameter_passing() {
    let cf = compile(&PARAMS_10, EXPR_10, PassParams::Separate);
    assert_eq!(cf.num_params(), 10);
    let f = cf.get_function::<10>().unwrap();
    assert_eq!(f.call([1.0; 10]), 10.0);
    assert_eq!(f.call([5.0; 10]), 50.0);
    assert_eq!(
        f.call([0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
        45.0
    );
    assert_eq!(
        f.call([9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0]),
        45.0
    );
}

#[test]
fn test_array_parameter_passing() {
    let cf = compile(&PARAMS_10, EXPR_10, PassParams::Array);
    let f = cf.get_array_function().unwrap();
    assert_eq!(f.call(&[1.0; 10]), 10.0);
    assert_eq!(f.call(&[5.0; 10]), 50.0);
    assert_eq!(f.call(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]), 45.0);
    assert_eq!(f.call(&[9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.0]), 45.0);
}

#[test]
fn test_array_accepts_longer_buffers() {
    let cf = compile(&["a", "b"], "a-b", PassParams::Array);
    let f = cf.get_array_function().unwrap();
    assert_eq!(f.call(&[5.0, 2.0, 100.0, 100.0]), 3.0);
}

#[test]
fn test_array_has_no_arity_limit() {
    let names: Vec<String> = (0..40).map(|i| format!("x{i}")).collect();
    let expr = names.join("+");
    let function = Function::parse_with_params(&names, &expr);
    let cf = CompiledFunction::new(&function, PassParams::Array);
    let args: Vec<f64> = (0..40).map(f64::from).collect();
    assert_eq!(cf.get_array_function().unwrap().call(&args), 780.0);
}

#[test]
fn test_zero_parameter_function() {
    let cf = compile(&[], "max(1,2)*3", PassParams::Separate);
    assert_eq!(cf.get_function::<0>().unwrap().call([]), 6.0);
    let cf = compile(&[], "max(1,2)*3", PassParams::Array);
    assert_eq!(cf.get_array_function().unwrap().call(&[]), 6.0);
}

fn random_case<const N: usize>(rng: &mut ChaCha8Rng)
where
    Params<N>: SeparateArity,
{
    let names: Vec<String> = (0..N).map(|i| format!("p{i}")).collect();
    let mut expr = String::from("1");
    for (i, name) in names.iter().enumerate() {
        let op = ["+", "-", "*", "/"][i % 4];
        expr = format!("({expr}){op}({name}+{})", i + 1);
    }
    let function = Function::parse_with_params(&names, &expr);
    assert!(!function.has_error(), "{expr}");
    let separate = CompiledFunction::new(&function, PassParams::Separate);
    let array = CompiledFunction::new(&function, PassParams::Array);
    let f = separate.get_function::<N>().unwrap();
    let g = array.get_array_function().unwrap();
    for _ in 0..20 {
        let mut args = [0.0; N];
        for arg in args.iter_mut() {
            *arg = rng.random_range(-10.0..10.0);
        }
        let a = f.call(args);
        let b = g.call(&args);
        assert!(same(a, b), "{expr} with {args:?}: {a} vs {b}");
    }
}

#[test]
fn test_separate_and_array_agree_for_every_arity() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    random_case::<0>(&mut rng);
    random_case::<1>(&mut rng);
    random_case::<2>(&mut rng);
    random_case::<3>(&mut rng);
    random_case::<4>(&mut rng);
    random_case::<5>(&mut rng);
    random_case::<6>(&mut rng);
    random_case::<7>(&mut rng);
    random_case::<8>(&mut rng);
    random_case::<9>(&mut rng);
    random_case::<10>(&mut rng);
}

#[test]
fn test_large_set_membership() {
    let set: Vec<String> = (1..=100).map(|i| i.to_string()).collect();
    let expr = format!("if(a in [{}],1,0)", set.join(","));
    let function = Function::parse(&expr);
    assert!(!function.has_error());
    let cf = CompiledFunction::new(&function, PassParams::Separate);
    let arr_cf = CompiledFunction::new(&function, PassParams::Array);
    let f = cf.get_function::<1>().unwrap();
    let g = arr_cf.get_array_function().unwrap();
    let mut value: f64 = 0.5;
    while value <= 100.5 {
        let expected = if value.round() == value { 1.0 } else { 0.0 };
        assert_eq!(f.call([value]), expected, "{value}");
        assert_eq!(g.call(&[value]), expected, "{value}");
        value += 0.5;
    }
}

#[test]
fn test_fractional_set_members() {
    let cf = compile(&["a"], "a in [0.5, -2.25, 3]", PassParams::Separate);
    let f = cf.get_function::<1>().unwrap();
    assert_eq!(f.call([0.5]), 1.0);
    assert_eq!(f.call([-2.25]), 1.0);
    assert_eq!(f.call([3.0]), 1.0);
    assert_eq!(f.call([0.25]), 0.0);
    assert_eq!(f.call([f64::NAN]), 0.0);

    let empty = CompiledFunction::new(
        &Function::new(vec!["a".into()], Node::is_in(Node::symbol(0), LiteralSet::default())),
        PassParams::Separate,
    );
    assert_eq!(empty.get_function::<1>().unwrap().call([1.0]), 0.0);
}

fn pass_fun(cf: CompiledFunction) -> CompiledFunction {
    let f = cf.get_function::<2>().unwrap();
    assert_eq!(f.call([2.0, 3.0]), 5.0);
    cf
}

#[test]
fn test_compiled_function_can_be_moved_around() {
    let mut cf = compile(&["a", "b"], "a+b", PassParams::Separate);
    let addr = cf.get_function::<2>().unwrap().addr();
    assert_eq!(cf.get_function::<2>().unwrap().call([2.0, 2.0]), 4.0);

    let cf2 = pass_fun(cf.take());
    assert!(cf.is_empty());
    assert!(cf.get_function::<2>().is_none());
    assert!(cf.dump().is_none());
    assert!(cf.pass_params().is_none());

    let f2 = cf2.get_function::<2>().unwrap();
    assert_eq!(f2.addr(), addr);
    assert_eq!(f2.call([3.0, 7.0]), 10.0);
}

#[test]
fn test_default_handle_is_empty() {
    let cf = CompiledFunction::default();
    assert!(cf.is_empty());
    assert_eq!(cf.num_params(), 0);
    assert!(cf.get_array_function().is_none());
    assert!(cf.get_function::<0>().is_none());
}

#[test]
fn test_constant_sub_expressions() {
    let cf = compile(&["a", "b"], "if(1,2,10)+a+b+max(1,2)/1", PassParams::Separate);
    let f = cf.get_function::<2>().unwrap();
    assert_eq!(f.call([1.0, 2.0]), 7.0);
    assert_eq!(f.call([3.0, 4.0]), 11.0);
}

#[test]
fn test_lazy_boolean_operators() {
    let cf = compile(&["a", "b"], "12==2+if(a==3&&a<10||b,10,5)", PassParams::Separate);
    let f = cf.get_function::<2>().unwrap();
    assert_eq!(f.call([0.0, 0.0]), 0.0);
    assert_eq!(f.call([0.0, 1.0]), 1.0);
    assert_eq!(f.call([3.0, 0.0]), 1.0);

    let ir = cf.dump().unwrap();
    assert!(ir.contains("brif"), "{ir}");
    // Dumping does not disturb the code.
    assert_eq!(f.call([3.0, 0.0]), 1.0);
}

#[test]
fn test_short_circuit_normalizes_to_booleans() {
    let cf = compile(&["a"], "(a && (0/0)) + (1 || (0/0))", PassParams::Separate);
    let f = cf.get_function::<1>().unwrap();
    assert_eq!(f.call([0.0]), 1.0);
    assert_eq!(f.call([1.0]), 2.0);
}

#[test]
fn test_truthiness_and_booleans() {
    let cf = compile(&["a"], "if(a,1,2)", PassParams::Separate);
    let f = cf.get_function::<1>().unwrap();
    assert_eq!(f.call([0.0]), 2.0);
    assert_eq!(f.call([-0.0]), 2.0);
    assert_eq!(f.call([0.1]), 1.0);
    assert_eq!(f.call([f64::NAN]), 1.0);

    let cf = compile(&["a"], "!a", PassParams::Separate);
    let f = cf.get_function::<1>().unwrap();
    assert_eq!(f.call([0.0]), 1.0);
    assert_eq!(f.call([2.0]), 0.0);
    assert_eq!(f.call([f64::NAN]), 0.0);
}

#[test]
fn test_division_by_zero_does_not_trap() {
    let cf = compile(&["a", "b"], "a/b", PassParams::Separate);
    let f = cf.get_function::<2>().unwrap();
    assert_eq!(f.call([1.0, 0.0]), f64::INFINITY);
    assert_eq!(f.call([-1.0, 0.0]), f64::NEG_INFINITY);
    assert!(f.call([0.0, 0.0]).is_nan());
}

#[test]
fn test_unary_operations_match_scalar_semantics() {
    let inputs = [-2.5, -1.0, -0.25, 0.0, 0.3, 0.5, 1.0, 2.0, 7.75, f64::NAN];
    let mut ops = vec![UnaryOp::Neg, UnaryOp::Not];
    ops.extend(UnaryOp::CALLS);
    for op in ops {
        let function = Function::new(vec!["a".into()], Node::unary(op, Node::symbol(0)));
        let cf = CompiledFunction::new(&function, PassParams::Separate);
        let f = cf.get_function::<1>().unwrap();
        for a in inputs {
            let expected = op.apply(a);
            let actual = f.call([a]);
            assert!(same(expected, actual), "{}({a}): {expected} vs {actual}", op.name());
        }
    }
}

#[test]
fn test_binary_operations_match_scalar_semantics() {
    let inputs = [-3.0, -0.5, 0.0, 0.5, 2.0, 3.0, f64::INFINITY, f64::NAN];
    let ops = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Pow,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::Approx,
        BinaryOp::Less,
        BinaryOp::LessEqual,
        BinaryOp::Greater,
        BinaryOp::GreaterEqual,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Atan2,
        BinaryOp::Ldexp,
        BinaryOp::Min,
        BinaryOp::Max,
    ];
    for op in ops {
        let function = Function::new(
            vec!["a".into(), "b".into()],
            Node::binary(op, Node::symbol(0), Node::symbol(1)),
        );
        let cf = CompiledFunction::new(&function, PassParams::Array);
        let f = cf.get_array_function().unwrap();
        for a in inputs {
            for b in inputs {
                let expected = op.apply(a, b);
                let actual = f.call(&[a, b]);
                assert!(same(expected, actual), "{op:?}({a}, {b}): {expected} vs {actual}");
            }
        }
    }
}

#[test]
fn test_opt_levels_agree() {
    let function = Function::parse_with_params(&["x", "y"], "sigmoid(x)*y^2 - fmod(x, 0.7)");
    let none = CompiledFunction::with_config(
        &function,
        PassParams::Separate,
        &JitConfig {
            opt_level: OptLevel::None,
            verify: true,
        },
    );
    let fast = CompiledFunction::with_config(
        &function,
        PassParams::Separate,
        &JitConfig {
            opt_level: OptLevel::SpeedAndSize,
            verify: true,
        },
    );
    let f = none.get_function::<2>().unwrap();
    let g = fast.get_function::<2>().unwrap();
    for (x, y) in [(0.0, 1.0), (1.5, -2.0), (-3.25, 0.5)] {
        assert_eq!(f.call([x, y]), g.call([x, y]));
    }
}

#[test]
fn test_multithreaded_compilation() {
    let function = Function::parse_with_params(&["x", "y", "z", "w"], "((x+1)*(y-1))/((z+1)/(w-1))");
    let cases = [
        ([0.0, 2.0, 0.0, 2.0], 1.0),
        ([1.0, 3.0, 0.0, 2.0], 4.0),
        ([1.0, 3.0, 1.0, 2.0], 2.0),
        ([1.0, 3.0, 1.0, 5.0], 8.0),
    ];
    std::thread::scope(|s| {
        for _ in 0..64 {
            s.spawn(|| {
                for (args, expected) in cases {
                    let cf = CompiledFunction::new(&function, PassParams::Separate);
                    assert_eq!(cf.get_function::<4>().unwrap().call(args), expected);
                }
            });
        }
    });
    assert!(backend::pooled_context_count() >= 1);
}

#[test]
fn test_compiled_function_is_shareable_across_threads() {
    let cf = compile(&["a"], "a*a", PassParams::Array);
    std::thread::scope(|s| {
        for i in 0..8 {
            let cf = &cf;
            s.spawn(move || {
                let x = f64::from(i);
                assert_eq!(cf.get_array_function().unwrap().call(&[x]), x * x);
            });
        }
    });
}

#[test]
#[should_panic(expected = "get_function::<3>")]
fn test_wrong_arity_is_a_contract_violation() {
    let cf = compile(&["a", "b"], "a+b", PassParams::Separate);
    let _ = cf.get_function::<3>();
}

#[test]
#[should_panic(expected = "requires PassParams::Array")]
fn test_wrong_convention_is_a_contract_violation() {
    let cf = compile(&["a", "b"], "a+b", PassParams::Separate);
    let _ = cf.get_array_function();
}

#[test]
#[should_panic(expected = "at least 2 arguments")]
fn test_short_array_is_a_contract_violation() {
    let cf = compile(&["a", "b"], "a+b", PassParams::Array);
    cf.get_array_function().unwrap().call(&[1.0]);
}

#[test]
#[should_panic(expected = "at most 10 parameters")]
fn test_separate_arity_limit() {
    let names: Vec<String> = (0..11).map(|i| format!("x{i}")).collect();
    let function = Function::parse_with_params(&names, &names.join("+"));
    let _ = CompiledFunction::new(&function, PassParams::Separate);
}

#[test]
#[should_panic(expected = "parse error")]
fn test_parse_error_is_a_contract_violation() {
    let function = Function::parse("a+");
    let _ = CompiledFunction::new(&function, PassParams::Array);
}

#[test]
fn test_function_issues_can_be_detected() {
    let simple = Function::parse("a+b");
    let complex = Function::parse("join(a,b,f(a,b)(a+b))");
    assert!(!simple.has_error());
    assert!(!complex.has_error());
    assert!(!detect_issues(&simple).has_issues());
    let issues = detect_issues(&complex);
    assert!(issues.has_issues());
    assert_eq!(issues.list, vec!["unsupported node type: join".to_string()]);
}

#[test]
fn test_issues_are_reported_per_node_in_pre_order() {
    let function = Function::parse("a + sum(map(tensor(x[2])(x), f(v)(reduce(v, max))))");
    assert!(!function.has_error(), "{:?}", function.error());
    let issues = detect_issues(&function);
    assert_eq!(
        issues.list,
        vec![
            "unsupported node type: sum",
            "unsupported node type: map",
            "unsupported node type: tensor",
            "unsupported node type: reduce",
        ]
    );
    assert_eq!(issues.to_string().lines().count(), 4);
}

#[test]
fn test_scalar_constructs_have_no_issues() {
    for expr in [
        "1",
        "a",
        "-a^2 % 3",
        "if(a in [1,2,3], sqrt(a), ldexp(a, 2))",
        "a ~= b || !(a >= b) && isNan(a)",
        "relu(sigmoid(a)) + atan2(a, b) + min(a, max(b, 1))",
    ] {
        let function = Function::parse(expr);
        assert!(!function.has_error(), "{expr}");
        assert!(!detect_issues(&function).has_issues(), "{expr}");
    }
}
