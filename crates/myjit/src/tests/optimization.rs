//! Optimized and unoptimized builds of the same IR must agree.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{InstBuilder, types};
use cranelift_module::FuncId;

use crate::config::{OptLevel, SessionConfig};
use crate::optimizer::{Pass, Pipeline};
use crate::session::Session;
use crate::tests::test_helpers::as_fn;

fn configs() -> Vec<(&'static str, SessionConfig)> {
    vec![
        ("default", SessionConfig::default()),
        (
            "unoptimized",
            SessionConfig {
                opt_level: OptLevel::None,
                pipeline: Pipeline::none(),
                ..SessionConfig::default()
            },
        ),
        (
            "cfg-only",
            SessionConfig {
                pipeline: Pipeline::new(vec![Pass::SimplifyCfg, Pass::AggressiveDce]),
                ..SessionConfig::default()
            },
        ),
        (
            "size",
            SessionConfig {
                opt_level: OptLevel::SpeedAndSize,
                ..SessionConfig::default()
            },
        ),
    ]
}

/// `sum_below(n) = 0 + 1 + ... + (n - 1)` as a loop over block parameters.
fn build_sum_below(session: &mut Session) -> FuncId {
    let sig = session.make_signature(&[types::I64], &[types::I64]);
    let func = session.declare_function("sum_below", sig).expect("declare");
    let entry = session.create_block("entry", func).expect("entry");
    let header = session.create_block("header", func).expect("header");
    let body = session.create_block("body", func).expect("body");
    let exit = session.create_block("exit", func).expect("exit");

    let i = session.append_block_param(header, types::I64).expect("i");
    let acc = session.append_block_param(header, types::I64).expect("acc");
    let result = session.append_block_param(exit, types::I64).expect("result");

    let n = {
        let mut cursor = session.enter_block(entry).expect("enter entry");
        let n = cursor.params()[0];
        let zero = cursor.iconst(types::I64, 0);
        cursor.jump(header, &[zero, zero]).expect("jump header");
        n
    };
    {
        let mut cursor = session.enter_block(header).expect("enter header");
        let more = cursor.ins().icmp(IntCC::SignedLessThan, i, n);
        cursor.brif(more, body, &[], exit, &[acc]).expect("brif");
    }
    {
        let mut cursor = session.enter_block(body).expect("enter body");
        let next_acc = cursor.ins().iadd(acc, i);
        let next_i = cursor.ins().iadd_imm(i, 1);
        cursor.jump(header, &[next_i, next_acc]).expect("jump back");
    }
    {
        let mut cursor = session.enter_block(exit).expect("enter exit");
        cursor.return_(&[result]);
    }
    func
}

/// Redundant arithmetic, a store/load pair and an unreachable block.
fn build_redundant(session: &mut Session) -> FuncId {
    let sig = session.make_signature(&[types::I64, types::I64], &[types::I64]);
    let func = session.declare_function("redundant", sig).expect("declare");
    let entry = session.create_block("entry", func).expect("entry");
    let dead = session.create_block("dead", func).expect("dead");
    {
        let mut cursor = session.enter_block(entry).expect("enter entry");
        let (a, b) = (cursor.params()[0], cursor.params()[1]);
        let slot = cursor.create_stack_slot(8, 3);
        let first = cursor.ins().imul(a, b);
        let second = cursor.ins().imul(a, b);
        cursor.ins().stack_store(first, slot, 0);
        let reloaded = cursor.ins().stack_load(types::I64, slot, 0);
        let zero = cursor.iconst(types::I64, 0);
        let plus_zero = cursor.ins().iadd(second, zero);
        let _unused = cursor.ins().isub(a, b);
        let sum = cursor.ins().iadd(reloaded, plus_zero);
        cursor.return_(&[sum]);
    }
    {
        let mut cursor = session.enter_block(dead).expect("enter dead");
        let junk = cursor.iconst(types::I64, -1);
        cursor.return_(&[junk]);
    }
    func
}

/// `square(x)` and `sum_of_squares(a, b)` which calls it twice.
fn build_sum_of_squares(session: &mut Session) -> FuncId {
    let unary = session.make_signature(&[types::I64], &[types::I64]);
    let square = session.declare_function("square", unary).expect("declare square");
    let binary = session.make_signature(&[types::I64, types::I64], &[types::I64]);
    let sum = session.declare_function("sum_of_squares", binary).expect("declare sum");

    let square_entry = session.create_block("entry", square).expect("entry");
    {
        let mut cursor = session.enter_block(square_entry).expect("enter");
        let x = cursor.params()[0];
        let squared = cursor.ins().imul(x, x);
        cursor.return_(&[squared]);
    }
    let sum_entry = session.create_block("entry", sum).expect("entry");
    {
        let mut cursor = session.enter_block(sum_entry).expect("enter");
        let (a, b) = (cursor.params()[0], cursor.params()[1]);
        let call_a = cursor.call(square, &[a]).expect("call");
        let a2 = cursor.inst_results(call_a)[0];
        let call_b = cursor.call(square, &[b]).expect("call");
        let b2 = cursor.inst_results(call_b)[0];
        let total = cursor.ins().iadd(a2, b2);
        cursor.return_(&[total]);
    }
    sum
}

#[test]
fn loop_agrees_across_pipelines() {
    for (label, config) in configs() {
        let mut session = Session::with_config("loop", config);
        let func = build_sum_below(&mut session);
        session.verify(func).unwrap_or_else(|e| panic!("[{label}] verify: {e}"));
        session.compile().unwrap_or_else(|e| panic!("[{label}] compile: {e}"));

        let sum_below: extern "C" fn(i64) -> i64 = unsafe { as_fn(session.lookup(func).expect("lookup")) };
        assert_eq!(sum_below(0), 0, "[{label}]");
        assert_eq!(sum_below(1), 0, "[{label}]");
        assert_eq!(sum_below(10), 45, "[{label}]");
        assert_eq!(sum_below(1000), 499_500, "[{label}]");
        assert_eq!(sum_below(-3), 0, "[{label}]");
    }
}

#[test]
fn redundant_code_agrees_across_pipelines() {
    for (label, config) in configs() {
        let mut session = Session::with_config("redundant", config);
        let func = build_redundant(&mut session);
        session.verify(func).unwrap_or_else(|e| panic!("[{label}] verify: {e}"));
        session.compile().unwrap_or_else(|e| panic!("[{label}] compile: {e}"));

        let redundant: extern "C" fn(i64, i64) -> i64 = unsafe { as_fn(session.lookup(func).expect("lookup")) };
        assert_eq!(redundant(3, 4), 24, "[{label}]");
        assert_eq!(redundant(-7, 6), -84, "[{label}]");
    }
}

#[test]
fn jit_to_jit_calls_agree_across_pipelines() {
    for (label, config) in configs() {
        let mut session = Session::with_config("calls", config);
        let func = build_sum_of_squares(&mut session);
        session.compile().unwrap_or_else(|e| panic!("[{label}] compile: {e}"));

        let sum_of_squares: extern "C" fn(i64, i64) -> i64 =
            unsafe { as_fn(session.lookup(func).expect("lookup")) };
        assert_eq!(sum_of_squares(3, 4), 25, "[{label}]");
        assert_eq!(session.engine().expect("engine").defined_count(), 2, "[{label}]");
    }
}

#[test]
fn verifier_can_be_disabled_for_valid_code() {
    let config = SessionConfig {
        enable_verifier: false,
        ..SessionConfig::default()
    };
    let mut session = Session::with_config("no-verifier", config);
    let func = build_sum_below(&mut session);
    session.compile().expect("compile");

    let sum_below: extern "C" fn(i64) -> i64 = unsafe { as_fn(session.lookup(func).expect("lookup")) };
    assert_eq!(sum_below(5), 10);
}

#[test]
fn every_single_pass_pipeline_compiles_and_runs() {
    for pass in Pass::ALL {
        let config = SessionConfig {
            pipeline: Pipeline::new([pass]),
            ..SessionConfig::default()
        };
        let mut session = Session::with_config("single-pass", config);
        let sum_below = build_sum_below(&mut session);
        let redundant = build_redundant(&mut session);
        session.compile().unwrap_or_else(|e| panic!("[{pass}] compile: {e}"));

        let sum_below: extern "C" fn(i64) -> i64 = unsafe { as_fn(session.lookup(sum_below).expect("lookup")) };
        let redundant: extern "C" fn(i64, i64) -> i64 = unsafe { as_fn(session.lookup(redundant).expect("lookup")) };
        assert_eq!(sum_below(10), 45, "[{pass}]");
        assert_eq!(redundant(3, 4), 24, "[{pass}]");
    }
}
