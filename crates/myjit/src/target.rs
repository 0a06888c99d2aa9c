//! Process-wide host target state.
//!
//! Holds what every session needs to know about the machine it runs on:
//! the host triple, its default calling convention, and a handle on the
//! symbols already loaded into this process (libc and friends). The state is
//! created once on first use and shared by all sessions.

use std::sync::OnceLock;

use cranelift_codegen::ir::Type;
use cranelift_codegen::isa::CallConv;
use libloading::Library;
use target_lexicon::Triple;

static HOST: OnceLock<HostTarget> = OnceLock::new();

/// Initialize the process-wide target state.
///
/// Idempotent and thread-safe: concurrent callers block until the first
/// initialization completes and then all observe the same instance.
/// [`Session::new`](crate::Session::new) calls this implicitly.
pub fn init() -> &'static HostTarget {
    HOST.get_or_init(HostTarget::detect)
}

/// Description of the host machine shared by all sessions.
#[derive(Debug)]
pub struct HostTarget {
    triple: Triple,
    symbols: HostSymbols,
}

impl HostTarget {
    fn detect() -> Self {
        let triple = Triple::host();
        let symbols = HostSymbols::open();
        tracing::debug!(triple = %triple, host_symbols = symbols.is_available(), "Initialized host target");
        Self { triple, symbols }
    }

    /// The host target triple.
    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    /// Calling convention used for every signature built by a session.
    pub fn default_call_conv(&self) -> CallConv {
        CallConv::triple_default(&self.triple)
    }

    /// Pointer-sized integer type of the host.
    pub fn pointer_type(&self) -> Type {
        Type::triple_pointer_type(&self.triple)
    }

    /// Resolve `name` against the symbols already loaded into this process.
    pub fn resolve(&self, name: &str) -> Option<*const u8> {
        self.symbols.resolve(name)
    }
}

/// The host process's own dynamic symbol table.
struct HostSymbols {
    library: Option<Library>,
}

impl HostSymbols {
    fn open() -> Self {
        match open_self() {
            Ok(library) => Self {
                library: Some(library),
            },
            Err(err) => {
                tracing::warn!(%err, "Host symbol table unavailable; only registered symbols will resolve");
                Self { library: None }
            }
        }
    }

    fn is_available(&self) -> bool {
        self.library.is_some()
    }

    fn resolve(&self, name: &str) -> Option<*const u8> {
        let library = self.library.as_ref()?;
        // SAFETY: the symbol is only read as an address, never dereferenced
        // here. `Library::this` stays loaded for the lifetime of the process.
        #[expect(unsafe_code)]
        let symbol = unsafe { library.get::<*const u8>(name.as_bytes()) }.ok()?;
        let address = *symbol;
        (!address.is_null()).then_some(address)
    }
}

impl std::fmt::Debug for HostSymbols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSymbols")
            .field("available", &self.is_available())
            .finish()
    }
}

#[cfg(unix)]
fn open_self() -> Result<Library, libloading::Error> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn open_self() -> Result<Library, libloading::Error> {
    libloading::os::windows::Library::this().map(Into::into)
}
