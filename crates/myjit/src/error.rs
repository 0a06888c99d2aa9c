//! Error types for the JIT session crate.

use cranelift_module::FuncId;

/// Errors that can occur while building, compiling or resolving a session.
///
/// Every variant is also rendered into the session's last-error string
/// when it is returned from a [`Session`](crate::Session) operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The structural verifier rejected a function body.
    #[error("while verifying {function} - {message}")]
    Verification {
        /// Name of the function that failed verification.
        function: String,
        /// Verifier output.
        message: String,
    },

    /// The execution engine could not be built for the host target.
    #[error("failed to construct execution engine: {0}")]
    EngineConstruction(String),

    /// The execution engine rejected the optimized module.
    #[error("module rejected by execution engine: {0}")]
    ModuleSubmission(String),

    /// A symbol has no resolvable address.
    #[error("symbol `{name}` could not be resolved: {reason}")]
    SymbolResolution {
        /// The requested symbol name.
        name: String,
        /// Why resolution failed.
        reason: String,
    },

    /// An optimization pass reported a codegen error.
    #[error("optimizing {function} failed: {message}")]
    Optimization {
        /// Name of the function being optimized.
        function: String,
        /// Codegen error text.
        message: String,
    },

    /// The function handle does not belong to this module.
    #[error("unknown function {0}")]
    UnknownFunction(FuncId),

    /// The block handle does not belong to this module, or crosses functions.
    #[error("unknown block {0}")]
    UnknownBlock(String),

    /// No block has been entered yet.
    #[error("no insertion block has been entered")]
    NoInsertionPoint,

    /// The module was already handed to the execution engine.
    #[error("module has already been handed to the execution engine; create a new session")]
    ModuleConsumed,

    /// Symbols can only be looked up after a successful compile.
    #[error("session has not been compiled")]
    NotCompiled,

    /// A previous compile failed; the session is unusable.
    #[error("session failed to compile and must be discarded")]
    Discarded,

    /// Unknown optimization pass name.
    #[error("unknown optimization pass `{0}`")]
    UnknownPass(String),

    /// Unknown optimization level name.
    #[error("unknown optimization level `{0}` (expected none, speed or speed_and_size)")]
    UnknownOptLevel(String),
}

impl SessionError {
    pub(crate) fn unresolved(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SymbolResolution {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
