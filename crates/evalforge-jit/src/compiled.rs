//! Owned handles to natively compiled expressions.

use std::fmt;
use std::marker::PhantomData;

use cranelift_jit::JITModule;
use evalforge_config::JitConfig;
use evalforge_core::Function;
use tracing::debug;

use crate::compiler;
use crate::issues::detect_issues;

/// Largest parameter count supported by [`PassParams::Separate`].
pub const MAX_SEPARATE_PARAMS: usize = 10;

/// How parameters reach the compiled code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassParams {
    /// One `f64` argument per parameter, at most [`MAX_SEPARATE_PARAMS`].
    Separate,
    /// A single pointer to at least `num_params()` contiguous doubles.
    Array,
}

/// Native code generated for one expression.
///
/// The handle exclusively owns its code buffer and releases it on drop. It
/// cannot be cloned; [`take`](Self::take) moves the code out and leaves an
/// empty handle behind, on which every code accessor returns `None`.
///
/// # Examples
///
/// ```
/// use evalforge_core::Function;
/// use evalforge_jit::{CompiledFunction, PassParams};
///
/// let function = Function::parse_with_params(&["a", "b"], "if(a < b, a, b) * 2");
/// let compiled = CompiledFunction::new(&function, PassParams::Separate);
/// let min2 = compiled.get_function::<2>().unwrap();
/// assert_eq!(min2.call([3.0, 5.0]), 6.0);
/// ```
pub struct CompiledFunction {
    code: Option<NativeCode>,
    num_params: usize,
}

struct NativeCode {
    module: JITModule,
    entry: *const u8,
    pass_params: PassParams,
    ir: String,
}

// SAFETY: the module is never mutated after finalization and the entry point
// is plain machine code valid for the module's lifetime.
unsafe impl Send for CompiledFunction {}
unsafe impl Sync for CompiledFunction {}

impl CompiledFunction {
    /// Compiles `function` with the default [`JitConfig`].
    ///
    /// # Panics
    ///
    /// Panics if `function` has a parse error, if `Separate` is requested for
    /// more than [`MAX_SEPARATE_PARAMS`] parameters, or if code generation
    /// fails. In debug builds, also panics if `function` has capability issues.
    pub fn new(function: &Function, pass_params: PassParams) -> Self {
        Self::with_config(function, pass_params, &JitConfig::default())
    }

    /// Compiles `function` with an explicit optimization level and verifier
    /// setting.
    pub fn with_config(function: &Function, pass_params: PassParams, config: &JitConfig) -> Self {
        assert!(
            !function.has_error(),
            "cannot compile a function with a parse error: {:?}",
            function.error()
        );
        debug_assert!(
            !detect_issues(function).has_issues(),
            "cannot compile an unsupported function: {}",
            detect_issues(function)
        );
        let num_params = function.num_params();
        if pass_params == PassParams::Separate {
            assert!(
                num_params <= MAX_SEPARATE_PARAMS,
                "Separate supports at most {MAX_SEPARATE_PARAMS} parameters, got {num_params}"
            );
        }

        debug!(num_params, ?pass_params, opt_level = ?config.opt_level, "compiling function");
        let compiled = compiler::compile(function, pass_params, config).unwrap_or_else(|e| {
            panic!(
                "JIT compile of '{}' ({pass_params:?}) failed: {e}",
                function.dump()
            )
        });

        Self {
            code: Some(NativeCode {
                module: compiled.module,
                entry: compiled.code,
                pass_params,
                ir: compiled.ir,
            }),
            num_params,
        }
    }

    /// Number of parameters the code expects.
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    /// Calling convention, or `None` for an empty handle.
    pub fn pass_params(&self) -> Option<PassParams> {
        self.code.as_ref().map(|code| code.pass_params)
    }

    /// True if the code has been moved out with [`take`](Self::take).
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
    }

    /// Moves the code into a new handle, leaving this one empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Typed entry point for the `Separate` convention.
    ///
    /// Only arities `0..=MAX_SEPARATE_PARAMS` exist at the type level.
    ///
    /// # Panics
    ///
    /// Panics if the code was compiled for `Array`, or if `N` differs from
    /// [`num_params`](Self::num_params).
    pub fn get_function<const N: usize>(&self) -> Option<SeparateFn<'_, N>>
    where
        Params<N>: SeparateArity,
    {
        let code = self.code.as_ref()?;
        assert_eq!(
            code.pass_params,
            PassParams::Separate,
            "get_function requires PassParams::Separate"
        );
        assert_eq!(
            N, self.num_params,
            "get_function::<{N}> on a function with {} parameters",
            self.num_params
        );
        Some(SeparateFn {
            entry: code.entry,
            _owner: PhantomData,
        })
    }

    /// Entry point for the `Array` convention.
    ///
    /// # Panics
    ///
    /// Panics if the code was compiled for `Separate`.
    pub fn get_array_function(&self) -> Option<ArrayFn<'_>> {
        let code = self.code.as_ref()?;
        assert_eq!(
            code.pass_params,
            PassParams::Array,
            "get_array_function requires PassParams::Array"
        );
        Some(ArrayFn {
            entry: code.entry,
            num_params: self.num_params,
            _owner: PhantomData,
        })
    }

    /// Cranelift IR captured when the function was compiled.
    pub fn dump(&self) -> Option<&str> {
        self.code.as_ref().map(|code| code.ir.as_str())
    }
}

impl Default for CompiledFunction {
    /// An empty handle.
    fn default() -> Self {
        Self {
            code: None,
            num_params: 0,
        }
    }
}

impl Drop for CompiledFunction {
    fn drop(&mut self) {
        if let Some(code) = self.code.take() {
            // SAFETY: no SeparateFn or ArrayFn can outlive the borrow of
            // `self`, so nothing points into the module any more.
            unsafe { code.module.free_memory() };
        }
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("num_params", &self.num_params)
            .field("pass_params", &self.pass_params())
            .field("entry", &self.code.as_ref().map(|code| code.entry))
            .finish()
    }
}

/// Type-level parameter count for [`CompiledFunction::get_function`].
pub struct Params<const N: usize>;

mod sealed {
    pub trait Sealed {}
}

/// Arities for which a `Separate` signature exists.
///
/// Implemented for `Params<0>` through `Params<10>`; sealed.
pub trait SeparateArity: sealed::Sealed {
    #[doc(hidden)]
    /// # Safety
    ///
    /// `entry` must be `Separate` code taking exactly `args.len()` doubles.
    unsafe fn invoke(entry: *const u8, args: &[f64]) -> f64;
}

macro_rules! separate_arity {
    (@f64 $arg:ident) => { f64 };
    ($($n:literal => ($($arg:ident),*)),* $(,)?) => {$(
        impl sealed::Sealed for Params<$n> {}

        impl SeparateArity for Params<$n> {
            unsafe fn invoke(entry: *const u8, args: &[f64]) -> f64 {
                let &[$($arg),*] = args else {
                    unreachable!("argument count is fixed by the array type")
                };
                // SAFETY: guaranteed by the caller.
                unsafe {
                    let f: extern "C" fn($(separate_arity!(@f64 $arg)),*) -> f64 =
                        std::mem::transmute(entry);
                    f($($arg),*)
                }
            }
        }
    )*};
}

separate_arity! {
    0 => (),
    1 => (a0),
    2 => (a0, a1),
    3 => (a0, a1, a2),
    4 => (a0, a1, a2, a3),
    5 => (a0, a1, a2, a3, a4),
    6 => (a0, a1, a2, a3, a4, a5),
    7 => (a0, a1, a2, a3, a4, a5, a6),
    8 => (a0, a1, a2, a3, a4, a5, a6, a7),
    9 => (a0, a1, a2, a3, a4, a5, a6, a7, a8),
    10 => (a0, a1, a2, a3, a4, a5, a6, a7, a8, a9),
}

/// Borrowed `Separate` entry point taking `N` doubles.
#[derive(Clone, Copy)]
pub struct SeparateFn<'a, const N: usize> {
    entry: *const u8,
    _owner: PhantomData<&'a CompiledFunction>,
}

impl<const N: usize> SeparateFn<'_, N>
where
    Params<N>: SeparateArity,
{
    #[inline]
    pub fn call(&self, args: [f64; N]) -> f64 {
        // SAFETY: `get_function` checked the convention and that N matches
        // the compiled parameter count.
        unsafe { <Params<N> as SeparateArity>::invoke(self.entry, &args) }
    }

    /// Raw address of the machine code.
    pub fn addr(&self) -> *const u8 {
        self.entry
    }
}

/// Borrowed `Array` entry point.
#[derive(Clone, Copy)]
pub struct ArrayFn<'a> {
    entry: *const u8,
    num_params: usize,
    _owner: PhantomData<&'a CompiledFunction>,
}

impl ArrayFn<'_> {
    /// Evaluates with `args[i]` bound to parameter `i`.
    ///
    /// # Panics
    ///
    /// Panics if `args` holds fewer than `num_params` values.
    #[inline]
    pub fn call(&self, args: &[f64]) -> f64 {
        assert!(
            args.len() >= self.num_params,
            "expected at least {} arguments, got {}",
            self.num_params,
            args.len()
        );
        // SAFETY: the code reads exactly `num_params` doubles from the
        // pointer, all of which are in bounds.
        unsafe {
            let f: extern "C" fn(*const f64) -> f64 = std::mem::transmute(self.entry);
            f(args.as_ptr())
        }
    }

    /// Raw address of the machine code.
    pub fn addr(&self) -> *const u8 {
        self.entry
    }
}
