//! End-to-end: build a function that emits a string one character at a
//! time through an external callback, compile it, and run it.

use serial_test::serial;

use crate::config::SessionConfig;
use crate::optimizer::Pipeline;
use crate::session::{Session, SessionStage};
use crate::tests::test_helpers::{as_fn, build_char_printer, capture_char_address, take_captured};

fn run_printer(config: SessionConfig, text: &str) -> Vec<u8> {
    let mut session = Session::with_config("myjit", config);
    session
        .define_symbol("capture_char", capture_char_address())
        .expect("register callback");
    let (hello, _) = build_char_printer(&mut session, "hello", "capture_char", text);
    session.verify(hello).expect("verify");
    session.compile().expect("compile");
    assert_eq!(session.stage(), SessionStage::Compiled);

    take_captured();
    let hello: extern "C" fn() = unsafe { as_fn(session.lookup("hello").expect("lookup")) };
    hello();
    take_captured()
}

#[test]
#[serial]
fn hello_emits_each_character_once() {
    let captured = run_printer(SessionConfig::default(), "hello\n");
    assert_eq!(captured, b"hello\n");
}

#[test]
#[serial]
fn hello_output_is_independent_of_pipeline() {
    let text = "Hello, world!";
    let optimized = run_printer(SessionConfig::default(), text);
    let plain = run_printer(
        SessionConfig {
            pipeline: Pipeline::none(),
            ..SessionConfig::default()
        },
        text,
    );
    assert_eq!(optimized, text.as_bytes());
    assert_eq!(plain, optimized);
}

#[test]
#[serial]
fn empty_message_emits_nothing() {
    assert!(run_printer(SessionConfig::default(), "").is_empty());
}

#[test]
#[serial]
fn repeated_calls_repeat_the_output() {
    let mut session = Session::new("myjit");
    session
        .define_symbol("capture_char", capture_char_address())
        .expect("register callback");
    let (hello, _) = build_char_printer(&mut session, "hello", "capture_char", "ab");
    session.compile().expect("compile");

    take_captured();
    let hello: extern "C" fn() = unsafe { as_fn(session.lookup(hello).expect("lookup")) };
    hello();
    hello();
    assert_eq!(take_captured(), b"abab");
}
