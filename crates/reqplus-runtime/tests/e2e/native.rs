//! Native module tests
//!
//! Modules are compiled from C with the system `cc`; tests that need one
//! return early when it is missing.

use super::harness::{build_native, is_empty_dir, loader_in, MemVfs, ToyRuntime, ToyValue, HOOK_STATE_C};
use reqplus_runtime::{LoadError, RequireError, StageError};

const COUNTER_C: &str = r#"
void reqplus_counter_init(struct hook_state *s) { s->init_calls++; }
void reqplus_counter_final(struct hook_state *s) { s->final_calls++; }
const char reqplus_counter_bytecode[] =
    "RITE" "0300" "\0\0" "\0\0\0\x1d" "TOY0" "0000" "ret 42\n";
"#;

const BYTECODE_ONLY_C: &str = r#"
const char reqplus_pure_bytecode[] =
    "RITE" "0300" "\0\0" "\0\0\0\x1c" "TOY0" "0000" "ret 7\n";
"#;

const RAISING_C: &str = r#"
void reqplus_boom_init(struct hook_state *s) { s->init_calls++; s->raise = 1; }
void reqplus_boom_final(struct hook_state *s) { s->final_calls++; }
"#;

const FIRST_C: &str = r#"
void reqplus_first_init(struct hook_state *s) { s->init_calls++; }
void reqplus_first_final(struct hook_state *s) { s->trace = s->trace * 10 + 1; }
"#;

const SECOND_C: &str = r#"
void reqplus_second_init(struct hook_state *s) { s->init_calls++; }
void reqplus_second_final(struct hook_state *s) { s->trace = s->trace * 10 + 2; }
"#;

const NO_ENTRY_C: &str = r#"
int unrelated_symbol(void) { return 0; }
"#;

fn module(body: &str) -> Option<Vec<u8>> {
    let workdir = tempfile::tempdir().unwrap();
    let image = build_native(workdir.path(), &format!("{HOOK_STATE_C}{body}"));
    if image.is_none() {
        eprintln!("skipping: no C compiler available");
    }
    image
}

fn stage_error(err: RequireError) -> StageError {
    match err {
        RequireError::Load(LoadError::FailedLoad { cause, .. }) => cause,
        other => panic!("Expected FailedLoad error, got {:?}", other),
    }
}

#[test]
fn test_garbage_image_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let mut loader = loader_in(ToyRuntime::new(), tmp.path());

    let err = loader
        .load_native(&MemVfs("mem"), "garbage.so", "mem/garbage.so", b"\x7fELF but not really")
        .unwrap_err();
    assert_eq!(err.to_string(), "failed load garbage.so (in mem)");
    assert!(matches!(stage_error(err), StageError::Link(_)));

    assert!(loader.registry().is_empty());
    assert!(is_empty_dir(tmp.path()));
}

#[test]
fn test_missing_temp_root_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("does-not-exist");
    let mut loader = loader_in(ToyRuntime::new(), &missing);

    let err = loader
        .load_native(&MemVfs("mem"), "x.so", "mem/x.so", b"whatever")
        .unwrap_err();
    assert!(matches!(stage_error(err), StageError::TempDir { .. }));
}

#[test]
fn test_init_bytecode_and_final() {
    let Some(image) = module(COUNTER_C) else { return };
    let tmp = tempfile::tempdir().unwrap();
    let mut loader = loader_in(ToyRuntime::new(), tmp.path());

    loader
        .load_native(&MemVfs("mem"), "counter.so", "mem/counter.so", &image)
        .unwrap();

    assert_eq!(loader.runtime().hooks.init_calls, 1);
    assert_eq!(loader.runtime().results, vec![ToyValue::Int(42)]);
    assert_eq!(loader.registry().len(), 1);
    assert!(is_empty_dir(tmp.path()));

    let module = loader.registry().iter().next().unwrap();
    assert_eq!(module.name(), "counter.so");
    assert!(module.has_finalizer());

    assert_eq!(loader.shutdown(), 1);
    assert_eq!(loader.runtime().hooks.final_calls, 1);
    assert_eq!(loader.shutdown(), 0);
    assert_eq!(loader.runtime().hooks.final_calls, 1);
}

#[test]
fn test_bytecode_only_module() {
    let Some(image) = module(BYTECODE_ONLY_C) else { return };
    let tmp = tempfile::tempdir().unwrap();
    let mut loader = loader_in(ToyRuntime::new(), tmp.path());

    loader
        .load_native(&MemVfs("mem"), "pure.so", "mem/pure.so", &image)
        .unwrap();

    assert_eq!(loader.runtime().hooks.init_calls, 0);
    assert_eq!(loader.runtime().results, vec![ToyValue::Int(7)]);
    assert_eq!(loader.registry().len(), 1);
    assert!(!loader.registry().iter().next().unwrap().has_finalizer());
    assert!(is_empty_dir(tmp.path()));

    assert_eq!(loader.shutdown(), 1);
    assert_eq!(loader.runtime().hooks.final_calls, 0);
}

#[test]
fn test_raising_init_still_registers() {
    let Some(image) = module(RAISING_C) else { return };
    let tmp = tempfile::tempdir().unwrap();
    let mut loader = loader_in(ToyRuntime::new(), tmp.path());

    let err = loader
        .load_native(&MemVfs("mem"), "boom.so", "mem/boom.so", &image)
        .unwrap_err();
    assert!(matches!(err, RequireError::Script(_)));
    assert_eq!(loader.registry().len(), 1);

    loader.shutdown();
    assert_eq!(loader.runtime().hooks.final_calls, 1);
}

#[test]
fn test_teardown_newest_first() {
    let (Some(first), Some(second)) = (module(FIRST_C), module(SECOND_C)) else {
        return;
    };
    let tmp = tempfile::tempdir().unwrap();
    let mut loader = loader_in(ToyRuntime::new(), tmp.path());

    loader
        .load_native(&MemVfs("mem"), "first.so", "mem/first.so", &first)
        .unwrap();
    loader
        .load_native(&MemVfs("mem"), "second.so", "mem/second.so", &second)
        .unwrap();

    let names: Vec<_> = loader.registry().iter().map(|m| m.name()).collect();
    assert_eq!(names, vec!["second.so", "first.so"]);

    assert_eq!(loader.shutdown(), 2);
    assert_eq!(loader.runtime().hooks.trace, 21);
}

#[test]
fn test_missing_entry_points() {
    let Some(image) = module(NO_ENTRY_C) else { return };
    let tmp = tempfile::tempdir().unwrap();
    let mut loader = loader_in(ToyRuntime::new(), tmp.path());

    let err = loader
        .load_native(&MemVfs("mem"), "plain.so", "mem/plain.so", &image)
        .unwrap_err();
    match stage_error(err) {
        StageError::NoEntryPoint { init, bytecode } => {
            assert_eq!(init, "reqplus_plain_init");
            assert_eq!(bytecode, "reqplus_plain_bytecode");
        }
        other => panic!("Expected NoEntryPoint, got {:?}", other),
    }
    assert!(loader.registry().is_empty());
    assert!(is_empty_dir(tmp.path()));
}
