//! myjit: a small JIT compilation session over Cranelift.
//!
//! This crate wraps Cranelift's module/build/execute workflow behind a
//! single [`Session`]: declare functions, append blocks and instructions,
//! verify, run a configurable optimization pipeline, hand the module to a JIT, and
//! look up compiled entry points by name.
//!
//! # Architecture
//!
//! ```text
//! myjit
//!   ├── session  : lifecycle, last-error state, public entry point
//!   ├── module   : declarations, bodies, blocks, verification
//!   ├── cursor   : instruction insertion at the end of a block
//!   ├── optimizer: named pass pipeline lowered onto Cranelift's mid-end
//!   ├── compiler : ISA + JITModule construction, declare/define/finalize
//!   ├── engine   : finalized code and the symbol resolver chain
//!   └── target   : process-wide host triple and host symbol table
//! ```
//!
//! # Example
//!
//! ```no_run
//! use myjit::ir::{InstBuilder, types};
//! use myjit::Session;
//!
//! let mut session = Session::new("demo");
//! let sig = session.make_signature(&[types::I64], &[types::I64]);
//! let double = session.declare_function("double", sig)?;
//! let entry = session.create_block("entry", double)?;
//! {
//!     let mut cursor = session.enter_block(entry)?;
//!     let x = cursor.params()[0];
//!     let y = cursor.ins().iadd(x, x);
//!     cursor.return_(&[y]);
//! }
//! session.verify(double)?;
//! session.compile()?;
//! let address = session.lookup(double)?;
//! let double: extern "C" fn(i64) -> i64 = unsafe { std::mem::transmute(address) };
//! assert_eq!(double(21), 42);
//! # Ok::<(), myjit::SessionError>(())
//! ```

mod compiler;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod module;
pub mod optimizer;
pub mod session;
pub mod target;

pub use config::{OptLevel, SessionConfig};
pub use cursor::InsertCursor;
pub use engine::Engine;
pub use error::SessionError;
pub use module::{BlockRef, FunctionDecl, IrModule};
pub use optimizer::{Pass, Pipeline};
pub use session::{Session, SessionStage, Symbol};
pub use target::{HostTarget, init};

pub use cranelift_codegen::ir;
pub use cranelift_module::FuncId;

#[cfg(test)]
mod tests;
