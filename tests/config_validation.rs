// tests/config_validation.rs

mod common;

use std::io::Write;
use std::path::Path;

use reprodag::config::{load_and_validate, parse_pipeline};
use reprodag::errors::ReprodagError;
use reprodag::fs::mock::MockFileSystem;
use reprodag::fs::RealFileSystem;
use reprodag::types::OutputKind;
use tempfile::NamedTempFile;

#[test]
fn cycle_between_stages_returns_structured_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[stage.a]
cmd = "make a"
deps = ["b.txt"]
outs = [{{ path = "a.txt" }}]

[stage.b]
cmd = "make b"
deps = ["a.txt"]
outs = [{{ path = "b.txt" }}]
"#
    )
    .unwrap();

    match load_and_validate(&RealFileSystem, file.path()) {
        Err(ReprodagError::CyclicGraph(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('a') || msg.contains('b'));
        }
        other => panic!("expected CyclicGraph, got {other:?}"),
    }
}

#[test]
fn declarations_are_read_through_the_filesystem() {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/repo/reprodag.toml",
        "[stage.a]\ncmd = \"make a\"\nouts = [{ path = \"a.txt\" }]\n",
    );

    let file = load_and_validate(&fs, Path::new("/repo/reprodag.toml")).unwrap();
    assert_eq!(file.find_output("a.txt").map(|(stage, _)| stage), Some("a"));

    assert!(matches!(
        load_and_validate(&fs, Path::new("/repo/missing.toml")),
        Err(ReprodagError::ConfigError(_))
    ));
}

#[test]
fn stage_consuming_its_own_output_is_a_cycle() {
    let result = parse_pipeline(
        r#"
[stage.loop]
cmd = "touch out.txt"
deps = ["out.txt"]
outs = [{ path = "out.txt" }]
"#,
    );
    assert!(matches!(result, Err(ReprodagError::CyclicGraph(_))));
}

#[test]
fn same_output_in_two_stages_is_ambiguous() {
    let result = parse_pipeline(
        r#"
[stage.one]
cmd = "echo 1 > out.txt"
outs = [{ path = "out.txt" }]

[stage.two]
cmd = "echo 2 > out.txt"
outs = [{ path = "./out.txt" }]
"#,
    );
    match result {
        Err(ReprodagError::AmbiguousOutput { path, first, second }) => {
            assert_eq!(path, "out.txt");
            assert_eq!((first.as_str(), second.as_str()), ("one", "two"));
        }
        other => panic!("expected AmbiguousOutput, got {other:?}"),
    }
}

#[test]
fn nested_outputs_across_stages_are_ambiguous() {
    let result = parse_pipeline(
        r#"
[stage.dir]
cmd = "mkdir -p data"
outs = [{ path = "data" }]

[stage.file]
cmd = "touch data/x.csv"
outs = [{ path = "data/x.csv" }]
"#,
    );
    assert!(matches!(result, Err(ReprodagError::AmbiguousOutput { .. })));
}

#[test]
fn malformed_declarations_are_config_errors() {
    let cases = [
        // no stages
        "[config]\njobs = 2\n",
        // jobs must be positive
        "[config]\njobs = 0\n[stage.a]\ncmd = \"x\"\n",
        // empty command
        "[stage.a]\ncmd = \"  \"\n",
        // output escaping the root
        "[stage.a]\ncmd = \"x\"\nouts = [{ path = \"../out\" }]\n",
        // duplicate output within a stage
        "[stage.a]\ncmd = \"x\"\nouts = [{ path = \"o\" }, { path = \"./o\" }]\n",
        // malformed param key
        "[stage.a]\ncmd = \"x\"\nparams = [\"train..lr\"]\n",
    ];

    for src in cases {
        match parse_pipeline(src) {
            Err(ReprodagError::ConfigError(_)) => {}
            other => panic!("expected ConfigError for {src:?}, got {other:?}"),
        }
    }
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let result = parse_pipeline("[stage.a\ncmd = 1");
    assert!(matches!(result, Err(ReprodagError::TomlError(_))));
}

#[test]
fn outputs_accept_inline_and_table_array_forms() {
    let file = parse_pipeline(
        r#"
[config]
jobs = 3

[stage.train]
cmd = "python train.py"
deps = ["data.csv"]
params = ["train.lr"]

[[stage.train.outs]]
path = "model.bin"

[[stage.train.outs]]
path = "scores.json"
cache = false
kind = "metric"
props = { title = "Scores" }

[stage.plot]
cmd = "python plot.py"
deps = ["scores.json"]
outs = [{ path = "plots", kind = "plot", persist = true }]
"#,
    )
    .unwrap();

    assert_eq!(file.config.jobs, 3);
    assert_eq!(file.config.params_file, "params.toml");

    let (stage, scores) = file.find_output("scores.json").unwrap();
    assert_eq!(stage, "train");
    assert!(!scores.cache);
    assert_eq!(scores.kind, OutputKind::Metric);
    assert_eq!(scores.props["title"].as_str(), Some("Scores"));

    let (_, model) = file.find_output("./model.bin").unwrap();
    assert!(model.cache);
    assert_eq!(model.kind, OutputKind::Plain);

    let (_, plots) = file.find_output("plots").unwrap();
    assert!(plots.persist);
}
