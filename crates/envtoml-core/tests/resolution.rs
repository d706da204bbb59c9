use envtoml_core::{
    resolve, resolve_file, validate, CoreError, ResolveError, Resolver, ValidationErrorKind,
    DEFAULT_ENVIRONMENT,
};
use envtoml_schema::{parse_document_str, DocumentError, Document, Platform};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

fn write_document(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("envtoml.toml");
    fs::write(&path, content).unwrap();
    path
}

fn document(content: &str) -> Document {
    let doc = parse_document_str(content).unwrap();
    validate(&doc).unwrap();
    doc
}

const GPU_DOC: &str = r#"
version = 1

[about]
name = "trainer"
license = "Apache-2.0"

[config]
channels = ["conda-forge"]
platforms = ["linux-64", "osx-arm64", "win-64"]

[groups.main.dependencies]
python = ">=3.10"

[groups.gpu.dependencies]
cuda = ">=12.0"

[groups.run.platform.win-64.dependencies]
pywin32 = "*"

[environments]
default = ["main"]
gpu = ["main", "gpu"]
run = ["run"]
nothing = []
"#;

#[test]
fn gpu_environment_unions_group_dependencies() {
    let doc = document(GPU_DOC);
    let env = resolve(&doc, "gpu", None).unwrap();
    let deps: Vec<(&str, &str)> = env
        .dependencies
        .iter()
        .map(|(k, v)| (k.as_str(), v.version.as_str()))
        .collect();
    assert_eq!(deps, vec![("python", ">=3.10"), ("cuda", ">=12.0")]);
    assert_eq!(env.channels, vec!["conda-forge"]);
}

#[test]
fn platform_only_dependencies_follow_target() {
    let doc = document(GPU_DOC);

    let win = resolve(&doc, "run", Some(Platform::Win64)).unwrap();
    assert_eq!(win.dependencies.len(), 1);
    assert_eq!(win.dependencies["pywin32"].version, "*");

    let linux = resolve(&doc, "run", Some(Platform::Linux64)).unwrap();
    assert!(linux.dependencies.is_empty());
}

#[test]
fn empty_group_list_resolves_to_base_layer_only() {
    let doc = document(GPU_DOC);
    let env = resolve(&doc, "nothing", Some(Platform::Linux64)).unwrap();
    assert!(env.dependencies.is_empty());
    assert!(env.pypi_dependencies.is_empty());
    assert!(env.system_requirements.is_empty());
    assert_eq!(env.platforms.len(), 3);
}

#[test]
fn empty_group_list_without_base_layer_is_empty() {
    let doc = document(
        r#"
[about]
name = "bare"
[groups.main.dependencies]
python = "*"
[environments]
main = ["main"]
nothing = []
"#,
    );
    for target in [None, Some(Platform::Linux64)] {
        let env = resolve(&doc, "nothing", target).unwrap();
        assert!(env.is_empty());
    }
}

#[test]
fn resolution_is_idempotent() {
    let doc = document(GPU_DOC);
    for platform in Platform::ALL {
        let a = resolve(&doc, "gpu", Some(*platform)).unwrap();
        let b = resolve(&doc, "gpu", Some(*platform)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}

#[test]
fn every_declared_environment_resolves() {
    let doc = document(GPU_DOC);
    let resolver = Resolver::new(&doc).unwrap();
    for name in resolver.environment_names() {
        let env = resolver.resolve(name, Some(Platform::OsxArm64)).unwrap();
        for group in doc.environment(name).unwrap() {
            for dep in doc.group(group).unwrap().spec.dependencies.keys() {
                assert!(env.dependencies.contains_key(dep.as_str()));
            }
        }
    }
}

#[test]
fn dangling_reference_stops_before_resolution() {
    let doc = parse_document_str(
        r#"
[about]
name = "dangling"
[groups.main]
[environments]
dev = ["main", "lint", "docs"]
"#,
    )
    .unwrap();
    let errors = Resolver::new(&doc).unwrap_err();
    let found: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert_eq!(
        found,
        vec![
            "environments.dev[1]: environment references undefined group 'lint'",
            "environments.dev[2]: environment references undefined group 'docs'",
        ]
    );
}

#[test]
fn version_mismatch_is_reported_alone() {
    let doc = parse_document_str(
        r#"
version = 3
[about]
name = ""
license = "not a license"
"#,
    )
    .unwrap();
    let errors = validate(&doc).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors.as_slice()[0].kind,
        ValidationErrorKind::UnsupportedVersion { found: 3, expected: 1 }
    ));
}

#[test]
fn concurrent_resolution_shares_one_document() {
    let doc = document(GPU_DOC);
    let resolver = Resolver::new(&doc).unwrap();
    let expected = resolver.resolve_all(Some(Platform::Win64)).unwrap();

    thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| resolver.resolve_all(Some(Platform::Win64)).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn resolve_file_loads_validates_and_resolves() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_document(dir.path(), GPU_DOC);

    let env = resolve_file(&path, Some("gpu"), Some(Platform::Linux64)).unwrap();
    assert_eq!(env.name, "gpu");
    assert!(env.dependencies.contains_key("cuda"));

    let base = resolve_file(&path, None, None).unwrap();
    assert_eq!(base.name, DEFAULT_ENVIRONMENT);
    assert!(base.dependencies.is_empty());
}

#[test]
fn resolve_file_reports_each_failure_kind() {
    let dir = tempfile::tempdir().unwrap();

    let missing = resolve_file(dir.path().join("absent.toml"), None, None).unwrap_err();
    assert!(matches!(missing, CoreError::Document(DocumentError::Io(_))));

    let bad_toml = write_document(dir.path(), "[about\nname = 1");
    let err = resolve_file(&bad_toml, None, None).unwrap_err();
    assert!(matches!(err, CoreError::Document(DocumentError::ParseToml(_))));

    let invalid = write_document(
        dir.path(),
        "[about]\nname = \"x\"\n[config]\nplatforms = [\"amiga-68k\"]\n",
    );
    let err = resolve_file(&invalid, None, None).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(err.to_string().contains("config.platforms[0]: unknown platform 'amiga-68k'"));

    let valid = write_document(dir.path(), GPU_DOC);
    let err = resolve_file(&valid, Some("cpu"), None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Resolve(ResolveError::UnknownEnvironment { .. })
    ));
}

#[test]
fn json_and_toml_inputs_resolve_identically() {
    let json = serde_json::json!({
        "version": 1,
        "about": { "name": "trainer", "license": "Apache-2.0" },
        "config": {
            "channels": ["conda-forge"],
            "platforms": ["linux-64", "osx-arm64", "win-64"]
        },
        "groups": {
            "main": { "dependencies": { "python": ">=3.10" } },
            "gpu": { "dependencies": { "cuda": ">=12.0" } },
            "run": { "platform": { "win-64": { "dependencies": { "pywin32": "*" } } } }
        },
        "environments": {
            "default": ["main"],
            "gpu": ["main", "gpu"],
            "run": ["run"],
            "nothing": []
        }
    });
    let from_json = Document::from_json(&json).unwrap();
    let from_toml = document(GPU_DOC);
    assert_eq!(from_json, from_toml);
    assert_eq!(
        resolve(&from_json, "gpu", Some(Platform::Win64))
            .unwrap()
            .fingerprint(),
        resolve(&from_toml, "gpu", Some(Platform::Win64))
            .unwrap()
            .fingerprint()
    );
}

#[test]
fn json_input_keeps_declaration_order() {
    let json: serde_json::Value = serde_json::from_str(
        r#"{
            "about": { "name": "ordered" },
            "groups": {
                "zeta": { "dependencies": { "zlib": "*", "abc": "*" } },
                "alpha": { "dependencies": { "mid": "*" } }
            },
            "environments": { "all": ["zeta", "alpha"] }
        }"#,
    )
    .unwrap();
    let from_json = Document::from_json(&json).unwrap();
    let from_toml = document(
        r#"
[about]
name = "ordered"
[groups.zeta.dependencies]
zlib = "*"
abc = "*"
[groups.alpha.dependencies]
mid = "*"
[environments]
all = ["zeta", "alpha"]
"#,
    );

    let group_order = |doc: &Document| -> Vec<String> {
        doc.groups.keys().map(ToString::to_string).collect()
    };
    assert_eq!(group_order(&from_json), vec!["zeta", "alpha"]);
    assert_eq!(group_order(&from_json), group_order(&from_toml));

    let dep_order = |doc: &Document| -> Vec<String> {
        resolve(doc, "all", None)
            .unwrap()
            .dependencies
            .keys()
            .map(ToString::to_string)
            .collect()
    };
    assert_eq!(dep_order(&from_json), vec!["zlib", "abc", "mid"]);
    assert_eq!(dep_order(&from_json), dep_order(&from_toml));
}
