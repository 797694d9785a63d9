//! Fiber-local state across fork and join.

mod common;

use common::*;
use fibrous::{Effect, Exit, FiberRef};

#[test]
fn join_inherits_child_value() {
    init_test_logging();
    let program = FiberRef::make(1_u32).flat_map(|r| {
        let child = r.set(5);
        let read = r.get();
        child.fork().flat_map(|f| f.join()).zip_right(read)
    });
    assert_eq!(run(program), Exit::succeed(5));
}

#[test]
fn await_exit_does_not_inherit() {
    init_test_logging();
    let program = FiberRef::make(1_u32).flat_map(|r| {
        let child = r.set(5);
        let read = r.get();
        child.fork().flat_map(|f| f.await_exit()).zip_right(read)
    });
    assert_eq!(run(program), Exit::succeed(1));
}

#[test]
fn children_start_from_the_parent_value() {
    init_test_logging();
    let program = FiberRef::make(String::from("root")).flat_map(|r| {
        let set = r.set("parent".into());
        let child_read = r.get();
        set.zip_right(child_read.fork()).flat_map(|f| f.join())
    });
    assert_eq!(run(program), Exit::succeed("parent".to_string()));
}

#[test]
fn custom_join_combines_values() {
    init_test_logging();
    let program = FiberRef::make_with(10_u64, |v| *v, |parent, child| parent + child).flat_map(|r| {
        let child = r.update(|v| v * 2);
        let read = r.get();
        child.fork().flat_map(|f| f.join()).zip_right(read)
    });
    assert_eq!(run(program), Exit::succeed(30));
}

#[test]
fn locally_restores_after_failure() {
    init_test_logging();
    let program = FiberRef::make(0_i32).widen::<String>().flat_map(|r| {
        let inner = r.get().widen::<String>().flat_map(|v| Effect::<i32, String>::fail(format!("saw {v}")));
        let read = r.get().widen::<String>();
        r.locally(9, inner).either().widen().zip(read)
    });
    assert_eq!(run(program), Exit::succeed((Err("saw 9".to_string()), 0)));
}

#[test]
fn get_ref_reads_a_finished_child() {
    init_test_logging();
    let program = FiberRef::make(0_u8).flat_map(|r| {
        let child = r.set(3);
        let r2 = r.clone();
        child
            .fork()
            .flat_map(move |f| f.await_exit().zip_right(f.get_ref(&r2)))
            .zip(r.get())
    });
    assert_eq!(run(program), Exit::succeed((3, 0)));
}
