//! nilprobe IR - the typed SSA program consumed by the nil analysis.
//!
//! The IR is built by an external Go frontend (go/ssa) and handed over as
//! JSON. This crate provides:
//! - Owned IR types matching the bridge output
//! - Loading and structural validation
//! - CFG navigation helpers
//! - Type system helpers
//! - A program-wide index of functions and values

pub mod cfg; // CFG navigation helpers
pub mod ir; // High-level IR types
pub mod program; // Function and value lookup
pub mod types; // Type system helpers

use std::path::{Path, PathBuf};

/// Errors raised while reading a bridge document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid IR JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed function `{function}`: {reason}")]
    Malformed { function: String, reason: String },
}

/// Read, parse and validate a bridge JSON file.
pub fn load_json_file(path: &Path) -> Result<ir::AnalysisInput, LoadError> {
    let data = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let input = ir::AnalysisInput::from_json(&data)?;
    input.validate()?;
    tracing::debug!(
        path = %path.display(),
        packages = input.packages.len(),
        functions = input.function_count(),
        "loaded IR"
    );
    Ok(input)
}

/// Path of a fixture under the workspace `tests/fixtures/` directory.
#[cfg(any(test, feature = "test-fixtures"))]
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(format!("{name}.json"))
}

/// Load a fixture file from `tests/fixtures/` by name (without extension).
///
/// This is available in test builds and when the `test-fixtures` feature is enabled.
#[cfg(any(test, feature = "test-fixtures"))]
pub fn load_fixture(name: &str) -> ir::AnalysisInput {
    load_json_file(&fixture_path(name))
        .unwrap_or_else(|e| panic!("failed to load fixture {name}: {e}"))
}

#[cfg(test)]
mod fixture_tests {
    use super::*;

    const FIXTURES: &[&str] = &["testdata", "interproc", "recursion", "closure", "maps"];

    #[test]
    fn test_load_all_fixtures() {
        for name in FIXTURES {
            let ir = load_fixture(name);
            assert!(
                !ir.packages.is_empty(),
                "fixture {name} should have at least one package"
            );
            assert!(
                ir.function_count() > 0,
                "fixture {name} should have at least one function"
            );
            assert!(
                !ir.go_version.is_empty(),
                "fixture {name} should have a go_version"
            );
        }
    }

    #[test]
    fn test_testdata_fixture_functions() {
        let ir = load_fixture("testdata");
        let pkg = &ir.packages[0];
        assert_eq!(pkg.name, "testdata");

        let func_names: Vec<&str> = pkg
            .functions
            .iter()
            .map(|f| f.short_name.as_str())
            .collect();
        for expected in ["npd", "canReturnNil", "expectNonNilParam", "interproc", "guarded", "nilArg"] {
            assert!(
                func_names.contains(&expected),
                "should contain {expected}, found: {:?}",
                func_names
            );
        }

        let guarded = pkg
            .functions
            .iter()
            .find(|f| f.short_name == "guarded")
            .unwrap();
        assert!(
            guarded.blocks.len() >= 4,
            "guarded should have >= 4 blocks (two ifs), got {}",
            guarded.blocks.len()
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_json_file(Path::new("/nonexistent/nilprobe/input.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/nilprobe/input.json"));
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"packages": [{"import_path": "p", "name": "p", "functions": [{
                "name": "p.f", "short_name": "f",
                "blocks": [{"id": 0, "instructions": [{"id": 1, "kind": "Alloc"}]}]
            }]}]}"#,
        )
        .unwrap();
        let err = load_json_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }), "got: {err}");
        assert!(err.to_string().contains("p.f"));
    }
}
