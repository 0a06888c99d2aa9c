//! The hello program: IR that writes a message through `putchar`.

use myjit::ir::types;
use myjit::{FuncId, Session, SessionError};
use tracing::{debug, info};

use crate::cli::Options;

/// Name of the generated entry point.
pub const ENTRY: &str = "hello";

/// Declare `sink(i32) -> i32` and define `hello()` calling it once per byte
/// of `message`, in order.
pub fn build_hello(session: &mut Session, sink: &str, message: &str) -> Result<FuncId, SessionError> {
    let sink_sig = session.make_signature(&[types::I32], &[types::I32]);
    let sink = session.declare_function(sink, sink_sig)?;

    let sig = session.make_signature(&[], &[]);
    let hello = session.declare_function(ENTRY, sig)?;
    let entry = session.create_block("entry", hello)?;

    let mut cursor = session.enter_block(entry)?;
    for byte in message.bytes() {
        let ch = cursor.iconst(types::I32, i64::from(byte));
        cursor.call(sink, &[ch])?;
    }
    cursor.return_(&[]);
    Ok(hello)
}

/// Build, verify, compile and run the hello program against host `putchar`,
/// then flush the C stdio buffers.
#[expect(unsafe_code)]
pub fn run(session: &mut Session, opts: &Options) -> Result<(), SessionError> {
    let output = opts.output();
    let hello = build_hello(session, "putchar", &output)?;
    if opts.print_ir {
        eprint!("{}", session.display_function(hello)?);
    }
    session.verify(hello)?;
    session.compile()?;

    let hello = session.lookup(hello)?;
    let fflush = session.lookup("fflush")?;
    debug!(?hello, ?fflush, "Resolved entry points");

    // SAFETY: `hello` was built above with signature `() -> ()` under the
    // host calling convention; `fflush` is the C library's `int fflush(FILE*)`
    // and NULL flushes every open stream. Both addresses stay valid while
    // `session` is alive.
    unsafe {
        let hello: extern "C" fn() = std::mem::transmute(hello);
        let fflush: extern "C" fn(*mut std::ffi::c_void) -> i32 = std::mem::transmute(fflush);
        hello();
        fflush(std::ptr::null_mut());
    }
    info!(bytes = output.len(), "Ran {ENTRY}");
    Ok(())
}
