//! Cranelift JIT compile pipeline.
//!
//! Consumes an [`IrModule`], optimizes every defined function, and hands the
//! result to a freshly built `JITModule`:
//!
//! ```text
//! native ISA -> verify + pipeline per function -> JITBuilder (+ symbols, host resolver)
//!            -> declare all -> check imports -> define all -> finalize
//! ```

use std::collections::{HashMap, HashSet};

use cranelift_codegen::Context;
use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::print_errors::pretty_error;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::verifier::verify_function;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module, ModuleError, default_libcall_names};

use crate::config::SessionConfig;
use crate::engine::Engine;
use crate::error::SessionError;
use crate::module::IrModule;
use crate::target::HostTarget;

/// Compile `module` into a new execution engine.
///
/// The module is consumed whether or not compilation succeeds.
pub(crate) fn compile(
    module: IrModule,
    config: &SessionConfig,
    symbols: &HashMap<String, *const u8>,
    host: &'static HostTarget,
) -> Result<Engine, SessionError> {
    let isa = build_isa(config)?;

    let linkages: Vec<(FuncId, Linkage)> = module
        .functions()
        .map(|(id, _)| (id, module.linkage(id)))
        .collect();
    let IrModule { decls, mut bodies, .. } = module;

    // Callees that generated code actually references.
    let referenced: HashSet<FuncId> = bodies
        .values()
        .flat_map(|body| body.imports.keys().copied())
        .collect();

    let mut contexts: Vec<(FuncId, Context)> = Vec::with_capacity(bodies.len());
    for (id, decl) in decls.iter() {
        let Some(body) = bodies.remove(&id) else {
            continue;
        };
        // Passes and code generation assume well-formed IR and may panic on
        // anything else, so this check ignores `enable_verifier`.
        verify_function(&body.func, &*isa).map_err(|errors| SessionError::Verification {
            function: decl.name().to_string(),
            message: errors.to_string(),
        })?;
        let mut ctx = Context::for_function(body.func);
        tracing::trace!(function = %decl.name(), ir = %ctx.func.display(), "IR before optimization");
        config
            .pipeline
            .run(&mut ctx, &*isa)
            .map_err(|err| SessionError::Optimization {
                function: decl.name().to_string(),
                message: pretty_error(&ctx.func, err),
            })?;
        tracing::trace!(function = %decl.name(), ir = %ctx.func.display(), "IR after optimization");
        contexts.push((id, ctx));
    }

    let mut builder = JITBuilder::with_isa(isa, default_libcall_names());
    for (name, address) in symbols {
        builder.symbol(name.clone(), *address);
    }
    builder.symbol_lookup_fn(Box::new(move |name: &str| host.resolve(name)));
    let mut jit = JITModule::new(builder);

    for &(id, linkage) in &linkages {
        let decl = &decls[id];
        let declared = jit
            .declare_function(decl.name(), linkage, decl.signature())
            .map_err(|err| {
                SessionError::ModuleSubmission(format!("declaring `{}`: {err}", decl.name()))
            })?;
        if declared != id {
            return Err(SessionError::ModuleSubmission(format!(
                "duplicate symbol `{}`",
                decl.name()
            )));
        }
    }

    // Unresolvable imports would otherwise abort inside relocation.
    for &id in &referenced {
        let name = decls[id].name();
        let imported = linkages
            .iter()
            .any(|&(other, linkage)| other == id && linkage == Linkage::Import);
        if imported && !symbols.contains_key(name) && host.resolve(name).is_none() {
            return Err(SessionError::unresolved(
                name,
                "called by generated code but not defined, registered, or loaded in the host process",
            ));
        }
    }

    let mut defined = HashMap::with_capacity(contexts.len());
    for (id, mut ctx) in contexts {
        let name = decls[id].name().to_string();
        jit.define_function(id, &mut ctx).map_err(|err| {
            let detail = match err {
                ModuleError::Compilation(err) => pretty_error(&ctx.func, err),
                other => other.to_string(),
            };
            SessionError::ModuleSubmission(format!("defining `{name}`: {detail}"))
        })?;
        defined.entry(name).or_insert(id);
    }

    jit.finalize_definitions()
        .map_err(|err| SessionError::ModuleSubmission(format!("finalizing: {err}")))?;

    Ok(Engine::new(jit, decls, defined, symbols.clone(), host))
}

/// Build the native ISA with the session's codegen settings.
fn build_isa(config: &SessionConfig) -> Result<OwnedTargetIsa, SessionError> {
    let mut flag_builder = settings::builder();
    let verifier = if config.enable_verifier { "true" } else { "false" };
    let defaults = [
        ("use_colocated_libcalls", "false"),
        ("is_pic", "false"),
        ("opt_level", config.opt_level.as_str()),
        ("enable_verifier", verifier),
    ];
    let overrides = config
        .flags
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()));

    for (name, value) in defaults.into_iter().chain(overrides) {
        flag_builder.set(name, value).map_err(|err| {
            SessionError::EngineConstruction(format!("setting {name}={value}: {err}"))
        })?;
    }

    let isa_builder = cranelift_native::builder().map_err(|msg| {
        SessionError::EngineConstruction(format!("host machine is not supported: {msg}"))
    })?;
    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|err| SessionError::EngineConstruction(format!("creating ISA: {err}")))
}
