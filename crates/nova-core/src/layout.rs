//! Source Layout Writer (C4): projects a function's file map into an
//! on-disk work directory suitable for a builder container, synthesizing
//! wrapper scaffolding for compiled runtimes the user did not supply
//! themselves.

use std::collections::HashMap;
use std::path::Path;

use nova_schema::RuntimeId;

use crate::error::NovaError;
use crate::runtime;

/// Write `files` into `work_dir`, then fill in any wrapper files the
/// runtime family requires that the user did not already provide.
pub async fn write_layout(
    work_dir: &Path,
    rt: &RuntimeId,
    files: &HashMap<String, Vec<u8>>,
) -> Result<(), NovaError> {
    for (relpath, bytes) in files {
        write_file(work_dir, relpath, bytes).await?;
    }

    if !runtime::needs_compilation(rt) {
        return Ok(());
    }

    for (relpath, contents) in wrapper_files(rt) {
        if !files.contains_key(relpath) {
            write_file(work_dir, relpath, contents.as_bytes()).await?;
        }
    }

    Ok(())
}

async fn write_file(work_dir: &Path, relpath: &str, bytes: &[u8]) -> Result<(), NovaError> {
    let target = work_dir.join(relpath);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| NovaError::Internal(format!("create layout dir {relpath}: {e}")))?;
    }
    tokio::fs::write(&target, bytes)
        .await
        .map_err(|e| NovaError::Internal(format!("write layout file {relpath}: {e}")))
}

/// The wrapper file set synthesized for a runtime family, keyed by path
/// relative to the work directory. Every wrapper reads the event from
/// `argv[1]`, builds a context from the `NOVA_*` environment variables, calls
/// the user handler, and prints the JSON result on success or a diagnostic
/// on stderr followed by a non-zero exit on failure.
fn wrapper_files(rt: &RuntimeId) -> Vec<(&'static str, String)> {
    match runtime::family(rt).as_str() {
        "go" => vec![
            ("main.go", GO_MAIN.to_string()),
            ("context.go", GO_CONTEXT.to_string()),
            ("go.mod", "module handler\n\ngo 1.23\n".to_string()),
        ],
        "rust" => vec![
            ("src/main.rs", RUST_MAIN.to_string()),
            ("src/context.rs", RUST_CONTEXT.to_string()),
            ("Cargo.toml", RUST_CARGO_TOML.to_string()),
            (".cargo/config.toml", RUST_CARGO_CONFIG.to_string()),
        ],
        "java" => vec![("Main.java", jvm_main("Main", "java"))],
        "kotlin" => vec![("Main.kt", jvm_main("Main", "kotlin"))],
        "scala" => vec![("Main.scala", jvm_main("Main", "scala"))],
        "swift" => vec![("main.swift", SWIFT_MAIN.to_string())],
        "zig" => vec![("main.zig", ZIG_MAIN.to_string())],
        _ => Vec::new(),
    }
}

fn jvm_main(class_name: &str, _family: &str) -> String {
    format!(
        "// generated wrapper; invokes Handler.handler(input, context)\n\
         import java.nio.file.Files;\n\
         import java.nio.file.Paths;\n\n\
         public class {class_name} {{\n\
         \x20\x20public static void main(String[] args) throws Exception {{\n\
         \x20\x20\x20\x20String input = new String(Files.readAllBytes(Paths.get(args[0])));\n\
         \x20\x20\x20\x20java.util.Map<String, String> ctx = new java.util.HashMap<>();\n\
         \x20\x20\x20\x20ctx.put(\"request_id\", System.getenv(\"NOVA_REQUEST_ID\"));\n\
         \x20\x20\x20\x20ctx.put(\"function_name\", System.getenv(\"NOVA_FUNCTION_NAME\"));\n\
         \x20\x20\x20\x20ctx.put(\"function_version\", System.getenv(\"NOVA_FUNCTION_VERSION\"));\n\
         \x20\x20\x20\x20ctx.put(\"memory_limit_mb\", System.getenv(\"NOVA_MEMORY_LIMIT_MB\"));\n\
         \x20\x20\x20\x20ctx.put(\"timeout_s\", System.getenv(\"NOVA_TIMEOUT_S\"));\n\
         \x20\x20\x20\x20ctx.put(\"runtime\", System.getenv(\"NOVA_RUNTIME\"));\n\
         \x20\x20\x20\x20try {{\n\
         \x20\x20\x20\x20\x20\x20Object result = Handler.handler(input, ctx);\n\
         \x20\x20\x20\x20\x20\x20System.out.println(result);\n\
         \x20\x20\x20\x20}} catch (Exception e) {{\n\
         \x20\x20\x20\x20\x20\x20System.err.println(e.getMessage());\n\
         \x20\x20\x20\x20\x20\x20System.exit(1);\n\
         \x20\x20\x20\x20}}\n\
         \x20\x20}}\n\
         }}\n"
    )
}

const GO_MAIN: &str = r#"// generated wrapper; invokes Handler(event, ctx)
package main

import (
	"encoding/json"
	"fmt"
	"os"
)

func main() {
	raw, err := os.ReadFile(os.Args[1])
	if err != nil {
		fmt.Fprintln(os.Stderr, err)
		os.Exit(1)
	}
	var event map[string]interface{}
	if err := json.Unmarshal(raw, &event); err != nil {
		fmt.Fprintln(os.Stderr, err)
		os.Exit(1)
	}
	ctx := NewContextFromEnv()
	result, err := Handler(event, ctx)
	if err != nil {
		fmt.Fprintln(os.Stderr, err)
		os.Exit(1)
	}
	out, err := json.Marshal(result)
	if err != nil {
		fmt.Fprintln(os.Stderr, err)
		os.Exit(1)
	}
	fmt.Println(string(out))
}
"#;

const GO_CONTEXT: &str = r#"package main

import (
	"os"
	"strconv"
)

type Context struct {
	RequestID       string
	FunctionName    string
	FunctionVersion string
	MemoryLimitMB   int
	TimeoutS        int
	Runtime         string
}

func NewContextFromEnv() Context {
	memory, _ := strconv.Atoi(os.Getenv("NOVA_MEMORY_LIMIT_MB"))
	timeout, _ := strconv.Atoi(os.Getenv("NOVA_TIMEOUT_S"))
	return Context{
		RequestID:       os.Getenv("NOVA_REQUEST_ID"),
		FunctionName:    os.Getenv("NOVA_FUNCTION_NAME"),
		FunctionVersion: os.Getenv("NOVA_FUNCTION_VERSION"),
		MemoryLimitMB:   memory,
		TimeoutS:        timeout,
		Runtime:         os.Getenv("NOVA_RUNTIME"),
	}
}
"#;

const RUST_MAIN: &str = r#"// generated wrapper; invokes handler(event, ctx)
mod context;
mod handler;

use context::Context;
use std::env;
use std::fs;
use std::process::ExitCode;

fn main() -> ExitCode {
    let path = env::args().nth(1).expect("missing input path argument");
    let raw = fs::read_to_string(&path).expect("read input file");
    let event: serde_json::Value = serde_json::from_str(&raw).expect("parse input json");
    let ctx = Context::from_env();
    match handler::handler(event, ctx) {
        Ok(result) => {
            println!("{}", serde_json::to_string(&result).expect("serialize result"));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
"#;

const RUST_CONTEXT: &str = r#"pub struct Context {
    pub request_id: String,
    pub function_name: String,
    pub function_version: String,
    pub memory_limit_mb: u32,
    pub timeout_s: u32,
    pub runtime: String,
}

impl Context {
    pub fn from_env() -> Self {
        Self {
            request_id: std::env::var("NOVA_REQUEST_ID").unwrap_or_default(),
            function_name: std::env::var("NOVA_FUNCTION_NAME").unwrap_or_default(),
            function_version: std::env::var("NOVA_FUNCTION_VERSION").unwrap_or_default(),
            memory_limit_mb: std::env::var("NOVA_MEMORY_LIMIT_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            timeout_s: std::env::var("NOVA_TIMEOUT_S")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            runtime: std::env::var("NOVA_RUNTIME").unwrap_or_default(),
        }
    }
}
"#;

const RUST_CARGO_TOML: &str = r#"[package]
name = "handler"
version = "0.1.0"
edition = "2021"

[[bin]]
name = "handler"
path = "src/main.rs"

[dependencies]
serde = { version = "1", features = ["derive"] }
serde_json = "1"

[profile.release]
lto = true
strip = true
"#;

const RUST_CARGO_CONFIG: &str = r#"[target.x86_64-unknown-linux-musl]
rustflags = ["-C", "target-feature=+crt-static"]
"#;

const SWIFT_MAIN: &str = r#"// generated wrapper; invokes handler(event, ctx)
import Foundation

let inputPath = CommandLine.arguments[1]
let raw = try! String(contentsOfFile: inputPath, encoding: .utf8)
let event = try! JSONSerialization.jsonObject(with: Data(raw.utf8))
let env = ProcessInfo.processInfo.environment
let ctx: [String: String] = [
    "request_id": env["NOVA_REQUEST_ID"] ?? "",
    "function_name": env["NOVA_FUNCTION_NAME"] ?? "",
    "function_version": env["NOVA_FUNCTION_VERSION"] ?? "",
    "memory_limit_mb": env["NOVA_MEMORY_LIMIT_MB"] ?? "",
    "timeout_s": env["NOVA_TIMEOUT_S"] ?? "",
    "runtime": env["NOVA_RUNTIME"] ?? "",
]

do {
    let result = try handler(event, ctx)
    let out = try JSONSerialization.data(withJSONObject: result)
    print(String(data: out, encoding: .utf8)!)
} catch {
    FileHandle.standardError.write("\(error)\n".data(using: .utf8)!)
    exit(1)
}
"#;

const ZIG_MAIN: &str = r#"// generated wrapper; invokes handler(event, ctx)
const std = @import("std");
const handler = @import("handler.zig");

pub fn main() !void {
    var gpa = std.heap.GeneralPurposeAllocator(.{}){};
    const allocator = gpa.allocator();
    const args = try std.process.argsAlloc(allocator);
    const input_path = args[1];
    const raw = try std.fs.cwd().readFileAlloc(allocator, input_path, 10 * 1024 * 1024);
    const result = handler.handle(allocator, raw) catch |err| {
        std.debug.print("{}\n", .{err});
        std.process.exit(1);
    };
    try std.io.getStdOut().writer().print("{s}\n", .{result});
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_user_files_and_go_wrappers() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = HashMap::new();
        files.insert("handler.go".to_string(), b"package main".to_vec());
        write_layout(dir.path(), &RuntimeId::new("go1.23"), &files)
            .await
            .unwrap();
        assert!(dir.path().join("handler.go").exists());
        assert!(dir.path().join("main.go").exists());
        assert!(dir.path().join("go.mod").exists());
    }

    #[tokio::test]
    async fn does_not_overwrite_user_supplied_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = HashMap::new();
        files.insert("handler.go".to_string(), b"package main".to_vec());
        files.insert("main.go".to_string(), b"// custom entry point".to_vec());
        write_layout(dir.path(), &RuntimeId::new("go1.23"), &files)
            .await
            .unwrap();
        let contents = tokio::fs::read_to_string(dir.path().join("main.go"))
            .await
            .unwrap();
        assert_eq!(contents, "// custom entry point");
    }

    #[tokio::test]
    async fn interpreted_runtime_gets_no_wrapper_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = HashMap::new();
        files.insert("main.py".to_string(), b"def handler(e, c): return e".to_vec());
        write_layout(dir.path(), &RuntimeId::new("python3.12"), &files)
            .await
            .unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
