//! Integration tests for the script registry.

use std::fs;

use flowgate::{ConfigError, RateLimitError, RateLimiter, ScriptKind, ScriptRegistry};

#[test]
fn test_load_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let bundled = ScriptRegistry::bundled();

    for kind in ScriptKind::ALL {
        fs::write(dir.path().join(kind.file_name()), bundled.source(kind)).unwrap();
    }

    let registry = ScriptRegistry::load(dir.path()).unwrap();
    for kind in ScriptKind::ALL {
        assert_eq!(registry.source(kind), bundled.source(kind));
    }
}

#[test]
fn test_missing_script_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bundled = ScriptRegistry::bundled();

    for kind in ScriptKind::ALL {
        if kind == ScriptKind::LeakyBucket {
            continue;
        }
        fs::write(dir.path().join(kind.file_name()), bundled.source(kind)).unwrap();
    }

    let err = ScriptRegistry::load(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        RateLimitError::Config(ConfigError::MissingScript {
            name: "leaky-bucket",
            ..
        })
    ));
}

#[test]
fn test_builder_fails_on_empty_script_dir() {
    let dir = tempfile::tempdir().unwrap();

    let err = RateLimiter::builder()
        .script_dir(dir.path())
        .build()
        .unwrap_err();

    assert!(matches!(err, RateLimitError::Config(_)));
}

#[test]
fn test_repo_scripts_match_bundled() {
    // The bundled sources are compiled from scripts/; loading that directory
    // must agree with them.
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/scripts");
    let registry = ScriptRegistry::load(dir).unwrap();
    let bundled = ScriptRegistry::bundled();

    for kind in ScriptKind::ALL {
        assert_eq!(registry.source(kind), bundled.source(kind));
    }
}
