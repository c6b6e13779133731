//! Cranelift code generation for scalar expression trees.
//!
//! # Calling Conventions
//!
//! - **Separate**: `extern "C" fn(f64, ..., f64) -> f64`, one argument per
//!   parameter. Parameters are the entry block's parameters.
//! - **Array**: `extern "C" fn(*const f64) -> f64`. Every parameter is loaded
//!   from `base + index * 8` in the entry block.
//!
//! `if`, `&&` and `||` are emitted as branches that meet in a join block
//! carrying the result as a block parameter, so only the taken operand runs.

use std::collections::HashMap;
use std::fmt;

use cranelift_codegen::ir::condcodes::FloatCC;
use cranelift_codegen::ir::types::F64;
use cranelift_codegen::ir::{AbiParam, FuncRef, InstBuilder, MemFlags, UserFuncName, Value};
use cranelift_frontend::FunctionBuilder;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module, ModuleError};
use evalforge_config::JitConfig;
use evalforge_core::{BinaryOp, Function, LiteralSet, Node, UnaryOp};
use tracing::trace;

use crate::backend;
use crate::compiled::PassParams;
use crate::libcalls;

/// Name of the single function defined in each module.
const ENTRY_SYMBOL: &str = "evalforge_expr";

/// Internal error type. Only formatted into a panic message by the caller.
#[derive(Debug)]
pub(crate) enum CodegenError {
    Module(ModuleError),
    Unsupported(String),
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::Module(e) => write!(f, "module: {e}"),
            CodegenError::Unsupported(s) => write!(f, "unsupported: {s}"),
        }
    }
}

impl From<ModuleError> for CodegenError {
    fn from(e: ModuleError) -> Self {
        CodegenError::Module(e)
    }
}

/// Finalized native code and the module that owns it.
pub(crate) struct Compiled {
    pub module: JITModule,
    pub code: *const u8,
    pub ir: String,
}

#[allow(clippy::result_large_err)]
pub(crate) fn compile(
    function: &Function,
    pass: PassParams,
    config: &JitConfig,
) -> Result<Compiled, CodegenError> {
    let mut jit_builder =
        JITBuilder::with_isa(backend::isa(config), cranelift_module::default_libcall_names());
    libcalls::register(&mut jit_builder);
    let mut module = JITModule::new(jit_builder);
    let ptr_type = module.target_config().pointer_type();
    let num_params = function.num_params();

    let mut sig = module.make_signature();
    match pass {
        PassParams::Separate => {
            sig.params
                .extend(std::iter::repeat(AbiParam::new(F64)).take(num_params));
        }
        PassParams::Array => sig.params.push(AbiParam::new(ptr_type)),
    }
    sig.returns.push(AbiParam::new(F64));

    let func_id = module.declare_function(ENTRY_SYMBOL, Linkage::Local, &sig)?;

    let mut pooled = backend::context();
    let backend::CodegenContext { ctx, builder_ctx } = &mut *pooled;
    ctx.func.signature = sig;
    ctx.func.name = UserFuncName::user(0, func_id.as_u32());

    {
        let mut builder = FunctionBuilder::new(&mut ctx.func, builder_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);

        let params: Vec<Value> = match pass {
            PassParams::Separate => builder.block_params(entry).to_vec(),
            PassParams::Array => {
                let base = builder.block_params(entry)[0];
                (0..num_params)
                    .map(|i| {
                        builder
                            .ins()
                            .load(F64, MemFlags::trusted(), base, (i * 8) as i32)
                    })
                    .collect()
            }
        };

        let mut emitter = Emitter {
            builder: &mut builder,
            module: &mut module,
            params,
            imports: HashMap::new(),
        };
        let result = emitter.emit(function.root())?;
        builder.ins().return_(&[result]);
        builder.seal_all_blocks();
        builder.finalize();
    }

    let ir = ctx.func.display().to_string();
    trace!(ir = %ir, "generated IR");

    module.define_function(func_id, ctx)?;
    module.clear_context(ctx);
    module.finalize_definitions()?;
    let code = module.get_finalized_function(func_id);

    Ok(Compiled { module, code, ir })
}

struct Emitter<'a, 'b> {
    builder: &'a mut FunctionBuilder<'b>,
    module: &'a mut JITModule,
    params: Vec<Value>,
    imports: HashMap<&'static str, FuncRef>,
}

impl Emitter<'_, '_> {
    fn emit(&mut self, node: &Node) -> Result<Value, CodegenError> {
        match node {
            Node::Number(v) => Ok(self.builder.ins().f64const(*v)),
            Node::Symbol(idx) => self.params.get(*idx).copied().ok_or_else(|| {
                CodegenError::Unsupported(format!(
                    "symbol {idx} out of range for {} parameters",
                    self.params.len()
                ))
            }),
            Node::Unary(op, child) => {
                let a = self.emit(child)?;
                self.unary(*op, a)
            }
            Node::Binary(op, l, r) if op.is_short_circuit() => self.short_circuit(*op, l, r),
            Node::Binary(op, l, r) => {
                let a = self.emit(l)?;
                let b = self.emit(r)?;
                self.binary(*op, a, b)
            }
            Node::If {
                cond,
                true_expr,
                false_expr,
            } => self.branch(cond, true_expr, false_expr),
            Node::In(probe, set) => {
                let p = self.emit(probe)?;
                Ok(self.membership(p, set))
            }
            Node::Tensor(tensor) => Err(CodegenError::Unsupported(format!(
                "tensor operation '{}'",
                tensor.kind()
            ))),
        }
    }

    fn unary(&mut self, op: UnaryOp, a: Value) -> Result<Value, CodegenError> {
        let value = match op {
            UnaryOp::Neg => self.builder.ins().fneg(a),
            UnaryOp::Sqrt => self.builder.ins().sqrt(a),
            UnaryOp::Ceil => self.builder.ins().ceil(a),
            UnaryOp::Floor => self.builder.ins().floor(a),
            UnaryOp::Fabs => self.builder.ins().fabs(a),
            UnaryOp::Not => {
                let zero = self.builder.ins().f64const(0.0);
                let c = self.builder.ins().fcmp(FloatCC::Equal, a, zero);
                self.bool_value(c)
            }
            UnaryOp::IsNan => {
                let c = self.builder.ins().fcmp(FloatCC::Unordered, a, a);
                self.bool_value(c)
            }
            UnaryOp::Relu => {
                let zero = self.builder.ins().f64const(0.0);
                self.select_max(a, zero)
            }
            UnaryOp::Cos
            | UnaryOp::Sin
            | UnaryOp::Tan
            | UnaryOp::Cosh
            | UnaryOp::Sinh
            | UnaryOp::Tanh
            | UnaryOp::Acos
            | UnaryOp::Asin
            | UnaryOp::Atan
            | UnaryOp::Exp
            | UnaryOp::Log10
            | UnaryOp::Log
            | UnaryOp::Sigmoid => {
                let name = libcalls::unary_symbol(op).ok_or_else(|| {
                    CodegenError::Unsupported(format!("no shim for '{}'", op.name()))
                })?;
                self.call(name, &[a])?
            }
        };
        Ok(value)
    }

    fn binary(&mut self, op: BinaryOp, a: Value, b: Value) -> Result<Value, CodegenError> {
        let value = match op {
            BinaryOp::Add => self.builder.ins().fadd(a, b),
            BinaryOp::Sub => self.builder.ins().fsub(a, b),
            BinaryOp::Mul => self.builder.ins().fmul(a, b),
            BinaryOp::Div => self.builder.ins().fdiv(a, b),
            BinaryOp::Equal => self.compare(FloatCC::Equal, a, b),
            BinaryOp::NotEqual => self.compare(FloatCC::NotEqual, a, b),
            BinaryOp::Less => self.compare(FloatCC::LessThan, a, b),
            BinaryOp::LessEqual => self.compare(FloatCC::LessThanOrEqual, a, b),
            BinaryOp::Greater => self.compare(FloatCC::GreaterThan, a, b),
            BinaryOp::GreaterEqual => self.compare(FloatCC::GreaterThanOrEqual, a, b),
            BinaryOp::Min => {
                let c = self.builder.ins().fcmp(FloatCC::LessThan, b, a);
                self.builder.ins().select(c, b, a)
            }
            BinaryOp::Max => self.select_max(a, b),
            BinaryOp::And | BinaryOp::Or => {
                let ta = self.truthy(a);
                let tb = self.truthy(b);
                let c = if op == BinaryOp::And {
                    self.builder.ins().band(ta, tb)
                } else {
                    self.builder.ins().bor(ta, tb)
                };
                self.bool_value(c)
            }
            BinaryOp::Mod
            | BinaryOp::Pow
            | BinaryOp::Approx
            | BinaryOp::Atan2
            | BinaryOp::Ldexp => {
                let name = libcalls::binary_symbol(op).ok_or_else(|| {
                    CodegenError::Unsupported(format!("no shim for '{op:?}'"))
                })?;
                self.call(name, &[a, b])?
            }
        };
        Ok(value)
    }

    /// `&&` and `||`: the right operand is only evaluated when it decides
    /// the result.
    fn short_circuit(&mut self, op: BinaryOp, l: &Node, r: &Node) -> Result<Value, CodegenError> {
        let lhs = self.emit(l)?;
        let lhs_true = self.truthy(lhs);

        let rhs_block = self.builder.create_block();
        let done = self.builder.create_block();
        self.builder.append_block_param(done, F64);

        if op == BinaryOp::And {
            let zero = self.builder.ins().f64const(0.0);
            self.builder
                .ins()
                .brif(lhs_true, rhs_block, &[], done, &[zero]);
        } else {
            let one = self.builder.ins().f64const(1.0);
            self.builder
                .ins()
                .brif(lhs_true, done, &[one], rhs_block, &[]);
        }

        self.builder.switch_to_block(rhs_block);
        let rhs = self.emit(r)?;
        let rhs_true = self.truthy(rhs);
        let result = self.bool_value(rhs_true);
        self.builder.ins().jump(done, &[result]);

        self.builder.switch_to_block(done);
        Ok(self.builder.block_params(done)[0])
    }

    fn branch(
        &mut self,
        cond: &Node,
        true_expr: &Node,
        false_expr: &Node,
    ) -> Result<Value, CodegenError> {
        let c = self.emit(cond)?;
        let c = self.truthy(c);

        let then_block = self.builder.create_block();
        let else_block = self.builder.create_block();
        let merge = self.builder.create_block();
        self.builder.append_block_param(merge, F64);

        self.builder
            .ins()
            .brif(c, then_block, &[], else_block, &[]);

        self.builder.switch_to_block(then_block);
        let t = self.emit(true_expr)?;
        self.builder.ins().jump(merge, &[t]);

        self.builder.switch_to_block(else_block);
        let f = self.emit(false_expr)?;
        self.builder.ins().jump(merge, &[f]);

        self.builder.switch_to_block(merge);
        Ok(self.builder.block_params(merge)[0])
    }

    /// Ordered equality tests against each member, OR'd together.
    fn membership(&mut self, probe: Value, set: &LiteralSet) -> Value {
        let mut found = None;
        for &member in set.values() {
            let m = self.builder.ins().f64const(member);
            let eq = self.builder.ins().fcmp(FloatCC::Equal, probe, m);
            found = Some(match found {
                Some(acc) => self.builder.ins().bor(acc, eq),
                None => eq,
            });
        }
        match found {
            Some(c) => self.bool_value(c),
            None => self.builder.ins().f64const(0.0),
        }
    }

    fn compare(&mut self, cc: FloatCC, a: Value, b: Value) -> Value {
        let c = self.builder.ins().fcmp(cc, a, b);
        self.bool_value(c)
    }

    /// `if a < b { b } else { a }`; keeps `a` when either side is NaN.
    fn select_max(&mut self, a: Value, b: Value) -> Value {
        let c = self.builder.ins().fcmp(FloatCC::LessThan, a, b);
        self.builder.ins().select(c, b, a)
    }

    /// `x != 0.0` as an `i8` flag. Unordered, so NaN is true.
    fn truthy(&mut self, v: Value) -> Value {
        let zero = self.builder.ins().f64const(0.0);
        self.builder.ins().fcmp(FloatCC::NotEqual, v, zero)
    }

    fn bool_value(&mut self, flag: Value) -> Value {
        let one = self.builder.ins().f64const(1.0);
        let zero = self.builder.ins().f64const(0.0);
        self.builder.ins().select(flag, one, zero)
    }

    fn call(&mut self, name: &'static str, args: &[Value]) -> Result<Value, CodegenError> {
        let callee = match self.imports.get(name) {
            Some(callee) => *callee,
            None => {
                let mut sig = self.module.make_signature();
                sig.params
                    .extend(std::iter::repeat(AbiParam::new(F64)).take(args.len()));
                sig.returns.push(AbiParam::new(F64));
                let id = self.module.declare_function(name, Linkage::Import, &sig)?;
                let callee = self.module.declare_func_in_func(id, self.builder.func);
                self.imports.insert(name, callee);
                callee
            }
        };
        let call = self.builder.ins().call(callee, args);
        Ok(self.builder.inst_results(call)[0])
    }
}
