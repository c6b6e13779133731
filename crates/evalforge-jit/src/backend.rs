//! Process-wide code generation state.
//!
//! Target ISAs are built once per [`JitConfig`] and shared. Cranelift
//! contexts are pooled and reused across compilations. Both live behind a
//! single mutex that is held only while an ISA is looked up or a context is
//! checked in or out, never while code is generated.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::FunctionBuilderContext;
use evalforge_config::JitConfig;

/// Upper bound on idle contexts kept for reuse.
const MAX_POOLED_CONTEXTS: usize = 32;

#[derive(Default)]
struct Backend {
    isas: HashMap<JitConfig, OwnedTargetIsa>,
    contexts: Vec<CodegenContext>,
}

static BACKEND: OnceLock<Mutex<Backend>> = OnceLock::new();

fn backend() -> MutexGuard<'static, Backend> {
    BACKEND
        .get_or_init(|| Mutex::new(Backend::default()))
        .lock()
        // The guarded state is always left consistent; a panic elsewhere
        // while holding the lock does not invalidate it.
        .unwrap_or_else(PoisonError::into_inner)
}

/// Reusable Cranelift state for building and compiling one function.
pub(crate) struct CodegenContext {
    pub ctx: Context,
    pub builder_ctx: FunctionBuilderContext,
}

impl CodegenContext {
    fn new() -> Self {
        Self {
            ctx: Context::new(),
            builder_ctx: FunctionBuilderContext::new(),
        }
    }
}

/// A context checked out of the pool; returned on drop.
pub(crate) struct PooledContext(Option<CodegenContext>);

impl Deref for PooledContext {
    type Target = CodegenContext;

    fn deref(&self) -> &CodegenContext {
        self.0.as_ref().expect("pooled context present until drop")
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut CodegenContext {
        self.0.as_mut().expect("pooled context present until drop")
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(mut context) = self.0.take() {
            context.ctx.clear();
            // An aborted build can leave the builder context populated.
            context.builder_ctx = FunctionBuilderContext::new();
            let mut backend = backend();
            if backend.contexts.len() < MAX_POOLED_CONTEXTS {
                backend.contexts.push(context);
            }
        }
    }
}

/// Checks a context out of the shared pool, creating one if none is idle.
pub(crate) fn context() -> PooledContext {
    let pooled = backend().contexts.pop();
    PooledContext(Some(pooled.unwrap_or_else(CodegenContext::new)))
}

/// Returns the host ISA for `config`, building it on first use.
///
/// # Panics
///
/// Panics if the host is not supported by Cranelift.
pub(crate) fn isa(config: &JitConfig) -> OwnedTargetIsa {
    let mut backend = backend();
    backend
        .isas
        .entry(*config)
        .or_insert_with(|| make_isa(config))
        .clone()
}

fn make_isa(config: &JitConfig) -> OwnedTargetIsa {
    let mut flag_builder = settings::builder();
    flag_builder
        .set("use_colocated_libcalls", "false")
        .expect("cranelift setting");
    flag_builder
        .set("is_pic", "false")
        .expect("cranelift setting");
    flag_builder
        .set("opt_level", config.opt_level.as_cranelift_str())
        .expect("cranelift setting");
    flag_builder
        .set("enable_verifier", if config.verify { "true" } else { "false" })
        .expect("cranelift setting");
    let isa_builder =
        cranelift_native::builder().unwrap_or_else(|e| panic!("cranelift ISA builder: {e}"));
    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .unwrap_or_else(|e| panic!("cranelift ISA finish: {e}"))
}

#[cfg(test)]
pub(crate) fn pooled_context_count() -> usize {
    backend().contexts.len()
}
