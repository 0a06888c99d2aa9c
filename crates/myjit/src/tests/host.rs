//! Host target initialization and host-process symbol fallback.

use target_lexicon::Triple;

use crate::session::Session;
use crate::target;

#[test]
fn init_is_idempotent_across_threads() {
    let first = target::init();
    let handles: Vec<_> = (0..8).map(|_| std::thread::spawn(target::init)).collect();
    for handle in handles {
        let other = handle.join().expect("init thread panicked");
        assert!(std::ptr::eq(first, other));
    }
}

#[test]
fn host_target_matches_the_running_process() {
    let host = target::init();
    assert_eq!(host.triple(), &Triple::host());
    assert_eq!(host.pointer_type().bits(), usize::BITS);

    let session = Session::new("host");
    assert_eq!(session.triple(), &Triple::host());
    assert_eq!(session.pointer_type(), host.pointer_type());
}

#[cfg(unix)]
#[test]
fn libc_symbol_resolves_and_is_callable() {
    let mut session = Session::new("host");
    session.compile().expect("compile");

    let address = session.lookup("strlen").expect("strlen is loaded in every unix process");
    assert!(!address.is_null());
    let strlen: unsafe extern "C" fn(*const std::ffi::c_char) -> usize =
        unsafe { crate::tests::test_helpers::as_fn(address) };
    assert_eq!(unsafe { strlen(c"hello".as_ptr()) }, 5);
}

#[cfg(unix)]
#[test]
fn generated_code_calls_host_function() {
    let mut session = Session::new("host");
    let ptr = session.pointer_type();

    let strlen_sig = session.make_signature(&[ptr], &[ptr]);
    let strlen = session.declare_function("strlen", strlen_sig).expect("declare strlen");
    let sig = session.make_signature(&[ptr], &[ptr]);
    let measure = session.declare_function("measure", sig).expect("declare measure");
    let entry = session.create_block("entry", measure).expect("entry");
    {
        let mut cursor = session.enter_block(entry).expect("enter");
        let text = cursor.params()[0];
        let call = cursor.call(strlen, &[text]).expect("call strlen");
        let len = cursor.inst_results(call)[0];
        cursor.return_(&[len]);
    }
    session.verify(measure).expect("verify");
    session.compile().expect("compile");

    let measure: extern "C" fn(*const std::ffi::c_char) -> usize =
        unsafe { crate::tests::test_helpers::as_fn(session.lookup(measure).expect("lookup")) };
    assert_eq!(measure(c"myjit".as_ptr()), 5);
}
