//! Execution engine: the finalized JIT module and its symbol resolver chain.

use std::collections::HashMap;
use std::fmt;
use std::mem::ManuallyDrop;

use cranelift_codegen::entity::PrimaryMap;
use cranelift_jit::JITModule;
use cranelift_module::FuncId;

use crate::error::SessionError;
use crate::module::FunctionDecl;
use crate::target::HostTarget;

/// Owns the machine code of a compiled module.
///
/// Names resolve in this order: functions defined in the module, symbols
/// registered on the session, then symbols already loaded in the host
/// process. Machine code stays mapped for as long as the engine is alive
/// and is unmapped when it is dropped.
pub struct Engine {
    jit: ManuallyDrop<JITModule>,
    decls: PrimaryMap<FuncId, FunctionDecl>,
    defined: HashMap<String, FuncId>,
    symbols: HashMap<String, *const u8>,
    host: &'static HostTarget,
}

impl Engine {
    pub(crate) fn new(
        jit: JITModule,
        decls: PrimaryMap<FuncId, FunctionDecl>,
        defined: HashMap<String, FuncId>,
        symbols: HashMap<String, *const u8>,
        host: &'static HostTarget,
    ) -> Self {
        Self {
            jit: ManuallyDrop::new(jit),
            decls,
            defined,
            symbols,
            host,
        }
    }

    /// Declaration of a function that was part of the compiled module.
    pub fn function(&self, id: FuncId) -> Option<&FunctionDecl> {
        self.decls.get(id)
    }

    /// Number of functions with machine code in this engine.
    pub fn defined_count(&self) -> usize {
        self.defined.len()
    }

    /// Resolve `name` to an address.
    pub fn lookup(&self, name: &str) -> Result<*const u8, SessionError> {
        if let Some(&id) = self.defined.get(name) {
            return Ok(self.jit.get_finalized_function(id));
        }
        if let Some(&address) = self.symbols.get(name) {
            return Ok(address);
        }
        self.host.resolve(name).ok_or_else(|| {
            SessionError::unresolved(
                name,
                "not defined in the module, registered on the session, or loaded in the host process",
            )
        })
    }

    /// Resolve the function `id` by its declared name.
    pub fn lookup_function(&self, id: FuncId) -> Result<*const u8, SessionError> {
        let decl = self.decls.get(id).ok_or(SessionError::UnknownFunction(id))?;
        self.lookup(decl.name())
    }
}

impl Drop for Engine {
    #[expect(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: `jit` is taken exactly once, here. Addresses handed out by
        // `lookup` are documented not to outlive the session that owns this
        // engine, so no caller can still be running the code being freed.
        unsafe { ManuallyDrop::take(&mut self.jit).free_memory() };
        tracing::debug!(defined = self.defined.len(), "Released JIT memory");
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("functions", &self.decls.len())
            .field("defined", &self.defined.len())
            .field("registered_symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}
