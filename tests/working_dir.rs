use std::env;
use std::fs;
use std::panic;

use shellpm::plugin::workdir::with_working_dir;

// Single test in this binary: it observes the process-wide working
// directory outside the scoped lock.
#[test]
fn working_dir_is_restored_on_every_exit_path() {
    let before = env::current_dir().expect("cwd");
    let target = tempfile::tempdir().expect("tempdir");
    let canonical = fs::canonicalize(target.path()).expect("canonical");

    let seen = with_working_dir(target.path(), || env::current_dir().expect("cwd"))
        .expect("enter target");
    assert_eq!(seen, canonical);
    assert_eq!(env::current_dir().expect("cwd"), before);

    let failed: Result<(), String> =
        with_working_dir(target.path(), || Err("clone failed".to_string())).expect("enter");
    assert!(failed.is_err());
    assert_eq!(env::current_dir().expect("cwd"), before);

    let panicked = panic::catch_unwind(|| {
        with_working_dir(target.path(), || panic!("vcs collaborator blew up"))
    });
    assert!(panicked.is_err());
    assert_eq!(env::current_dir().expect("cwd"), before);

    let missing = target.path().join("missing");
    let mut ran = false;
    assert!(with_working_dir(&missing, || ran = true).is_err());
    assert!(!ran);
    assert_eq!(env::current_dir().expect("cwd"), before);
}
