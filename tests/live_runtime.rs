//! Smoke tests for the thread-backed runtime.

mod common;

use common::*;
use fibrous::services::now;
use fibrous::{Effect, Exit, Runtime, RuntimeBuilder};
use std::time::Duration;

#[test]
fn runs_forks_and_sleeps_on_the_host_thread() {
    init_test_logging();
    test_phase!("runs_forks_and_sleeps_on_the_host_thread");
    let runtime = RuntimeBuilder::new().thread_name("fibrous-it").build().unwrap();
    let program = Effect::<u32, String>::succeed(20)
        .delay(Duration::from_millis(10))
        .zip_par(Effect::succeed(22))
        .map(|(a, b)| a + b);
    assert_eq!(runtime.block_on(program).unwrap(), Exit::succeed(42));
    test_complete!("runs_forks_and_sleeps_on_the_host_thread");
}

#[test]
fn clock_moves_forward() {
    init_test_logging();
    let runtime = Runtime::new().unwrap();
    let program = now()
        .zip_left(Effect::sleep(Duration::from_millis(15)))
        .zip(now())
        .map(|(a, b)| b.duration_since(a));
    let elapsed = runtime.block_on(program).unwrap().unwrap();
    assert!(elapsed >= Duration::from_millis(15), "elapsed {elapsed:?}");
}

#[test]
fn timeout_on_the_live_runtime() {
    init_test_logging();
    let runtime = Runtime::new().unwrap();
    let exit = runtime
        .block_on(Effect::<u8, String>::never().timeout(Duration::from_millis(20)))
        .unwrap();
    assert_eq!(exit, Exit::succeed(None));
}
