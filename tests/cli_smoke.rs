use std::path::PathBuf;
use std::process::Command;

use fragmix::{BlendOperator, ComposeBehavior, NodeSpec};

fn bin_exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_fragmix")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) { "fragmix.exe" } else { "fragmix" });
            p
        })
}

fn write_graph(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);

    let spec = NodeSpec::Blend {
        src: Some(Box::new(NodeSpec::Const {
            color: [0.25, 0.0, 0.0, 0.5],
        })),
        dst: Some(Box::new(NodeSpec::Passthrough)),
        operator: BlendOperator::SourceOver,
        behavior: ComposeBehavior::Default,
    };
    let f = std::fs::File::create(&path).unwrap();
    serde_json::to_writer_pretty(f, &spec).unwrap();
    path
}

#[test]
fn cli_emit_prints_shader_text() {
    let graph = write_graph("emit.json");
    let out = Command::new(bin_exe())
        .args(["emit", "--in"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("compose_fragment"));
    assert!(text.contains("blend_source_over"));
}

#[test]
fn cli_fold_prints_a_color() {
    let graph = write_graph("fold.json");
    let out = Command::new(bin_exe())
        .args(["fold", "--in"])
        .arg(&graph)
        .args(["--input", "0.2,0.4,0.6,1"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.starts_with('['), "unexpected output: {text}");
}

#[test]
fn cli_inspect_reports_flags_and_key() {
    let graph = write_graph("inspect.json");
    let out = Command::new(bin_exe())
        .args(["inspect", "--in"])
        .arg(&graph)
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("preserves_opaque_input: true"));
    assert!(text.contains("program_key: 03000000"));
}
