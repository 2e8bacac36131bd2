//! Runtime Registry (C1): maps runtime identifiers to their family, builder
//! image, and compilation requirements.

use nova_schema::RuntimeId;

/// A builder container descriptor: the image to run the build in, and the
/// shell command that produces `/work/handler` inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderSpec {
    pub image: String,
    pub shell_command: String,
}

/// Strip a trailing version suffix from a runtime id: `python3.11 -> python`,
/// `go1.24 -> go`, `node20 -> node`. Runtimes with no recognized family
/// prefix pass through unchanged.
pub fn family(rt: &RuntimeId) -> String {
    let s = rt.as_str();
    let prefix_end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    if prefix_end == 0 {
        s.to_string()
    } else {
        s[..prefix_end].to_string()
    }
}

/// Source file extension for a runtime family, e.g. `.py`, `.go`, `.rs`.
pub fn extension(rt: &RuntimeId) -> &'static str {
    match family(rt).as_str() {
        "python" => ".py",
        "node" => ".js",
        "ruby" => ".rb",
        "php" => ".php",
        "go" => ".go",
        "rust" => ".rs",
        "java" => ".java",
        "kotlin" => ".kt",
        "scala" => ".scala",
        "swift" => ".swift",
        "zig" => ".zig",
        "dotnet" => ".cs",
        _ => ".txt",
    }
}

/// The default handler entry point for a runtime, used when a `FunctionSpec`
/// omits one.
pub fn default_handler(rt: &RuntimeId) -> &'static str {
    match family(rt).as_str() {
        "python" => "main.handler",
        "node" => "index.handler",
        "ruby" => "main.handler",
        "php" => "index.php",
        "go" | "rust" | "zig" => "handler",
        "java" => "Handler.handler",
        "kotlin" => "Handler.handler",
        "scala" => "Handler.handler",
        "swift" => "Handler.handler",
        "dotnet" => "Handler::Handler",
        _ => "handler",
    }
}

/// The on-disk filename the user's handler source should be written to
/// before wrapper generation.
pub fn source_filename(rt: &RuntimeId) -> String {
    match family(rt).as_str() {
        "go" => "handler.go".to_string(),
        "rust" => "src/handler.rs".to_string(),
        "java" => "Handler.java".to_string(),
        "kotlin" => "Handler.kt".to_string(),
        "scala" => "Handler.scala".to_string(),
        "swift" => "handler.swift".to_string(),
        "zig" => "handler.zig".to_string(),
        "dotnet" => "Handler.cs".to_string(),
        _ => format!("main{}", extension(rt)),
    }
}

/// Whether a runtime family requires compilation before it produces an
/// executable artifact.
pub fn needs_compilation(rt: &RuntimeId) -> bool {
    matches!(
        family(rt).as_str(),
        "go" | "rust" | "java" | "kotlin" | "scala" | "swift" | "zig" | "dotnet"
    )
}

/// The builder image and shell command for a compiled runtime family.
/// Static linking is mandatory: Rust targets `x86_64-unknown-linux-musl`
/// with `+crt-static`; Go builds with `CGO_ENABLED=0`; Swift links
/// `-static-executable`; .NET publishes single-file `linux-musl-x64`. The
/// platform is pinned to `linux/amd64` for every family.
///
/// Returns `None` for interpreted runtimes, which never enter C5.
pub fn builder(rt: &RuntimeId) -> Option<BuilderSpec> {
    let spec = match family(rt).as_str() {
        "go" => BuilderSpec {
            image: "golang:1.23-bullseye".to_string(),
            shell_command:
                "cd /work && CGO_ENABLED=0 GOOS=linux GOARCH=amd64 go build -o /work/handler ."
                    .to_string(),
        },
        "rust" => BuilderSpec {
            image: "rust:1.80-slim".to_string(),
            shell_command: "cd /work && rustup target add x86_64-unknown-linux-musl && \
                 RUSTFLAGS='-C target-feature=+crt-static' cargo build --release \
                 --target x86_64-unknown-linux-musl && \
                 cp target/x86_64-unknown-linux-musl/release/handler /work/handler"
                .to_string(),
        },
        "java" => BuilderSpec {
            image: "eclipse-temurin:21-jdk".to_string(),
            shell_command: "cd /work && javac *.java && \
                 echo '#!/bin/sh\\nexec java -cp /work Main \"$@\"' > /work/handler && \
                 chmod +x /work/handler"
                .to_string(),
        },
        "kotlin" => BuilderSpec {
            image: "zenika/kotlin:1.9-jdk21".to_string(),
            shell_command: "cd /work && kotlinc *.kt -include-runtime -d handler.jar && \
                 echo '#!/bin/sh\\nexec java -jar /work/handler.jar \"$@\"' > /work/handler && \
                 chmod +x /work/handler"
                .to_string(),
        },
        "scala" => BuilderSpec {
            image: "sbtscala/scala-sbt:eclipse-temurin-21_1.9.7_3.3.1".to_string(),
            shell_command: "cd /work && scalac *.scala -d handler.jar && \
                 echo '#!/bin/sh\\nexec scala -cp /work/handler.jar Main \"$@\"' > /work/handler && \
                 chmod +x /work/handler"
                .to_string(),
        },
        "swift" => BuilderSpec {
            image: "swift:5.10-jammy".to_string(),
            shell_command: "cd /work && swiftc -static-executable -o /work/handler *.swift"
                .to_string(),
        },
        "zig" => BuilderSpec {
            image: "euantorano/zig:0.13.0".to_string(),
            shell_command: "cd /work && zig build-exe -target x86_64-linux-musl \
                 -femit-bin=/work/handler *.zig"
                .to_string(),
        },
        "dotnet" => BuilderSpec {
            image: "mcr.microsoft.com/dotnet/sdk:8.0".to_string(),
            shell_command: "cd /work && dotnet publish -c Release -r linux-musl-x64 \
                 --self-contained true -p:PublishSingleFile=true -o /work/out && \
                 cp /work/out/handler /work/handler"
                .to_string(),
        },
        _ => return None,
    };
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_strips_version_suffix() {
        assert_eq!(family(&RuntimeId::new("python3.11")), "python");
        assert_eq!(family(&RuntimeId::new("go1.24")), "go");
        assert_eq!(family(&RuntimeId::new("node20")), "node");
    }

    #[test]
    fn family_passes_through_unknown_runtimes() {
        assert_eq!(family(&RuntimeId::new("cobol")), "cobol");
    }

    #[test]
    fn needs_compilation_matches_compiled_families() {
        assert!(needs_compilation(&RuntimeId::new("go1.23")));
        assert!(needs_compilation(&RuntimeId::new("rust1.80")));
        assert!(!needs_compilation(&RuntimeId::new("python3.12")));
        assert!(!needs_compilation(&RuntimeId::new("node20")));
    }

    #[test]
    fn builder_is_none_for_interpreted_runtimes() {
        assert!(builder(&RuntimeId::new("python3.12")).is_none());
    }

    #[test]
    fn builder_pins_musl_static_linking_for_rust() {
        let spec = builder(&RuntimeId::new("rust1.80")).unwrap();
        assert!(spec.shell_command.contains("x86_64-unknown-linux-musl"));
        assert!(spec.shell_command.contains("+crt-static"));
    }

    #[test]
    fn builder_disables_cgo_for_go() {
        let spec = builder(&RuntimeId::new("go1.23")).unwrap();
        assert!(spec.shell_command.contains("CGO_ENABLED=0"));
    }
}
