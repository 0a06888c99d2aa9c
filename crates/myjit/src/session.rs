//! The compilation session.
//!
//! A [`Session`] owns one [`IrModule`] and drives it through
//! build → verify → compile → lookup:
//!
//! ```text
//! Building ──compile ok──▶ Compiled   (engine live, module consumed)
//!     └─────compile err──▶ Discarded  (module consumed, no engine)
//! ```
//!
//! Both end states are terminal. Every failing operation returns an error
//! and also overwrites the session's last-error string.

use std::collections::HashMap;

use cranelift_codegen::ir::{AbiParam, Signature, Type, Value};
use cranelift_codegen::settings;
use cranelift_module::FuncId;
use target_lexicon::Triple;

use crate::compiler;
use crate::config::SessionConfig;
use crate::cursor::InsertCursor;
use crate::engine::Engine;
use crate::error::SessionError;
use crate::module::{BlockRef, IrModule};
use crate::target::{self, HostTarget};

/// Observable lifecycle stage of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Functions and blocks can still be added.
    Building,
    /// The module was compiled; symbols can be looked up.
    Compiled,
    /// Compilation failed; the session must be rebuilt.
    Discarded,
}

enum Stage {
    Building(IrModule),
    Compiled(Engine),
    Discarded,
}

/// A symbol to look up: a name, or a function of the session's module.
#[derive(Debug, Clone, Copy)]
pub enum Symbol<'a> {
    Name(&'a str),
    Function(FuncId),
}

impl<'a> From<&'a str> for Symbol<'a> {
    fn from(name: &'a str) -> Self {
        Symbol::Name(name)
    }
}

impl<'a> From<&'a String> for Symbol<'a> {
    fn from(name: &'a String) -> Self {
        Symbol::Name(name)
    }
}

impl From<FuncId> for Symbol<'_> {
    fn from(id: FuncId) -> Self {
        Symbol::Function(id)
    }
}

/// Single-threaded JIT compilation session.
pub struct Session {
    config: SessionConfig,
    host: &'static HostTarget,
    verifier_flags: settings::Flags,
    stage: Stage,
    current_block: Option<BlockRef>,
    symbols: HashMap<String, *const u8>,
    last_error: Option<String>,
}

impl Session {
    /// Create a session with an empty module named `module_name`.
    pub fn new(module_name: impl Into<String>) -> Self {
        Self::with_config(module_name, SessionConfig::default())
    }

    /// Create a session whose compile step uses `config`.
    pub fn with_config(module_name: impl Into<String>, config: SessionConfig) -> Self {
        let host = target::init();
        Self {
            config,
            host,
            verifier_flags: settings::Flags::new(settings::builder()),
            stage: Stage::Building(IrModule::new(module_name)),
            current_block: None,
            symbols: HashMap::new(),
            last_error: None,
        }
    }

    /// Configuration applied at compile time.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Where the session is in its lifecycle.
    pub fn stage(&self) -> SessionStage {
        match self.stage {
            Stage::Building(_) => SessionStage::Building,
            Stage::Compiled(_) => SessionStage::Compiled,
            Stage::Discarded => SessionStage::Discarded,
        }
    }

    /// The most recent diagnostic, if any operation has failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn triple(&self) -> &Triple {
        self.host.triple()
    }

    pub fn pointer_type(&self) -> Type {
        self.host.pointer_type()
    }

    /// Build a signature using the host's default calling convention.
    pub fn make_signature(&self, params: &[Type], returns: &[Type]) -> Signature {
        let mut signature = Signature::new(self.host.default_call_conv());
        signature.params.extend(params.iter().copied().map(AbiParam::new));
        signature.returns.extend(returns.iter().copied().map(AbiParam::new));
        signature
    }

    /// The module under construction.
    pub fn module(&self) -> Result<&IrModule, SessionError> {
        match &self.stage {
            Stage::Building(module) => Ok(module),
            Stage::Compiled(_) => Err(SessionError::ModuleConsumed),
            Stage::Discarded => Err(SessionError::Discarded),
        }
    }

    /// The execution engine, once compiled.
    pub fn engine(&self) -> Result<&Engine, SessionError> {
        match &self.stage {
            Stage::Compiled(engine) => Ok(engine),
            Stage::Building(_) => Err(SessionError::NotCompiled),
            Stage::Discarded => Err(SessionError::Discarded),
        }
    }

    // ─── Building ────────────────────────────────────────────────────

    /// Declare a function. It becomes a definition once it has a block;
    /// otherwise it is resolved as an external symbol at compile time.
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
    ) -> Result<FuncId, SessionError> {
        let result = self.module_mut().map(|module| module.declare_function(name, signature));
        self.record(result)
    }

    /// Append an empty block named `name` to `func`.
    pub fn create_block(&mut self, name: impl Into<String>, func: FuncId) -> Result<BlockRef, SessionError> {
        let result = self
            .module_mut()
            .and_then(|module| module.create_block(name, func));
        self.record(result)
    }

    pub fn append_block_param(&mut self, block: BlockRef, ty: Type) -> Result<Value, SessionError> {
        let result = self
            .module_mut()
            .and_then(|module| module.append_block_param(block, ty));
        self.record(result)
    }

    /// Move the insertion point to the end of `block` and return a cursor
    /// positioned there. Replaces any previous insertion point.
    pub fn enter_block(&mut self, block: BlockRef) -> Result<InsertCursor<'_>, SessionError> {
        let checked = self.module().and_then(|module| module.check_block(block));
        self.record(checked)?;
        self.current_block = Some(block);
        self.open_cursor(block)
    }

    /// Reopen a cursor at the current insertion point.
    pub fn cursor(&mut self) -> Result<InsertCursor<'_>, SessionError> {
        let block = self.current_block.ok_or(SessionError::NoInsertionPoint);
        let block = self.record(block)?;
        let checked = self.module().map(|_| ());
        self.record(checked)?;
        self.open_cursor(block)
    }

    /// The block the next [`cursor`](Self::cursor) call appends to.
    pub fn current_block(&self) -> Option<BlockRef> {
        self.current_block
    }

    /// Register `address` under `name` for resolution by generated code and
    /// by [`lookup`](Self::lookup). Must happen before compiling.
    pub fn define_symbol(&mut self, name: impl Into<String>, address: *const u8) -> Result<(), SessionError> {
        let name = name.into();
        let result = self.module().map(|_| ()).and_then(|()| {
            if address.is_null() {
                Err(SessionError::unresolved(name.as_str(), "registered address is null"))
            } else {
                Ok(())
            }
        });
        if result.is_ok() {
            tracing::debug!(symbol = %name, "Registered symbol");
            self.symbols.insert(name, address);
        }
        self.record(result)
    }

    /// Run the structural verifier over `func`.
    pub fn verify(&mut self, func: FuncId) -> Result<(), SessionError> {
        let result = self
            .module()
            .and_then(|module| module.verify(func, &self.verifier_flags));
        if result.is_ok() {
            tracing::debug!(%func, "Verified function");
        }
        self.record(result)
    }

    /// Textual IR of `func`.
    pub fn display_function(&mut self, func: FuncId) -> Result<String, SessionError> {
        let result = self.module().and_then(|module| module.display(func));
        self.record(result)
    }

    // ─── Compiling ───────────────────────────────────────────────────

    /// Optimize the module and hand it to a new execution engine.
    ///
    /// The module is consumed on the first call whatever the outcome; later
    /// calls fail with [`SessionError::ModuleConsumed`] (after success) or
    /// [`SessionError::Discarded`] (after failure).
    pub fn compile(&mut self) -> Result<(), SessionError> {
        let module = match std::mem::replace(&mut self.stage, Stage::Discarded) {
            Stage::Building(module) => module,
            compiled @ Stage::Compiled(_) => {
                self.stage = compiled;
                return self.record(Err(SessionError::ModuleConsumed));
            }
            Stage::Discarded => return self.record(Err(SessionError::Discarded)),
        };
        self.current_block = None;

        let module_name = module.name().to_string();
        let functions = module.functions().count();
        match compiler::compile(module, &self.config, &self.symbols, self.host) {
            Ok(engine) => {
                tracing::info!(
                    module = %module_name,
                    functions,
                    defined = engine.defined_count(),
                    pipeline = %self.config.pipeline,
                    "JIT compiled module"
                );
                self.stage = Stage::Compiled(engine);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(module = %module_name, %err, "JIT compilation failed");
                self.record(Err(err))
            }
        }
    }

    /// Resolve a name or function to a callable address.
    ///
    /// The address must be transmuted to the function's real `extern "C"`
    /// type before calling, and must not outlive the session.
    pub fn lookup<'a>(&mut self, symbol: impl Into<Symbol<'a>>) -> Result<*const u8, SessionError> {
        let result = self.engine().and_then(|engine| match symbol.into() {
            Symbol::Name(name) => engine.lookup(name),
            Symbol::Function(id) => engine.lookup_function(id),
        });
        self.record(result)
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn module_mut(&mut self) -> Result<&mut IrModule, SessionError> {
        match &mut self.stage {
            Stage::Building(module) => Ok(module),
            Stage::Compiled(_) => Err(SessionError::ModuleConsumed),
            Stage::Discarded => Err(SessionError::Discarded),
        }
    }

    fn open_cursor(&mut self, block: BlockRef) -> Result<InsertCursor<'_>, SessionError> {
        self.module_mut()?.cursor(block)
    }

    /// Store the error of a failed operation as the last error.
    fn record<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(err) = &result {
            tracing::debug!(%err, "Session operation failed");
            self.last_error = Some(err.to_string());
        }
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Session");
        match &self.stage {
            Stage::Building(module) => s.field("module", module),
            Stage::Compiled(engine) => s.field("engine", engine),
            Stage::Discarded => s.field("stage", &SessionStage::Discarded),
        };
        s.field("current_block", &self.current_block)
            .field("last_error", &self.last_error)
            .finish()
    }
}
