use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{BundleKey, MemoryMb, TimeoutSeconds};

/// Top-level bundle manifest, serialized as `manifest.yaml` at the root of a
/// bundle archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: BundleType,
    #[serde(default)]
    pub description: String,
    pub functions: Vec<FunctionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowSpec>,
}

/// Whether a bundle carries only functions, or functions plus a workflow DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Function,
    Workflow,
}

/// A single function's declaration within a bundle manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub key: BundleKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub runtime: String,
    pub handler: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub memory_mb: MemoryMb,
    #[serde(default)]
    pub timeout_s: TimeoutSeconds,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    #[serde(default)]
    pub description: String,
}

/// The optional workflow carried alongside a bundle's functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub definition: WorkflowDefinition,
}

/// The DAG body of a workflow: nodes and directed edges between node keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub nodes: Vec<BundleNode>,
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
}

/// A single workflow DAG node, referencing a function by its bundle key.
///
/// `function_ref` must equal some `FunctionSpec.key` in the same manifest
/// (the closure invariant checked by bundle validation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleNode {
    pub node_key: String,
    pub function_ref: BundleKey,
    #[serde(default)]
    pub input_mapping: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_s: Option<u32>,
}

/// Retry policy attached to a workflow node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_s: u32,
}

/// A directed edge between two workflow node keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub from: String,
    pub to: String,
}

impl BundleManifest {
    /// Parse a manifest from its YAML-on-wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not valid YAML or does not match the
    /// manifest shape (missing required fields, wrong types).
    pub fn from_yaml(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_yml::from_slice(bytes)?)
    }

    /// Serialize the manifest back to its YAML-on-wire representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized (should not
    /// happen for a well-formed value).
    pub fn to_yaml(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_yml::to_string(self)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
name: hello
version: 0.1.0
type: workflow
description: Demo
functions:
  - key: greet
    runtime: python3.12
    handler: main.handler
    files: [functions/greet/handler.py]
    memory_mb: 128
    timeout_s: 30
workflow:
  description: Greeting flow
  definition:
    nodes:
      - node_key: start
        function_ref: greet
        input_mapping: {name: "$.input.name"}
    edges: []
"#;

    #[test]
    fn parses_illustrative_manifest() {
        let manifest = BundleManifest::from_yaml(EXAMPLE.as_bytes()).unwrap();
        assert_eq!(manifest.name, "hello");
        assert_eq!(manifest.functions.len(), 1);
        assert_eq!(manifest.functions[0].key.as_str(), "greet");
        let workflow = manifest.workflow.unwrap();
        assert_eq!(workflow.definition.nodes.len(), 1);
        assert_eq!(workflow.definition.nodes[0].function_ref.as_str(), "greet");
        assert!(workflow.definition.edges.is_empty());
    }

    #[test]
    fn applies_defaults_when_memory_and_timeout_omitted() {
        let yaml = r#"
name: tiny
version: 0.1.0
type: function
functions:
  - key: noop
    runtime: python3.12
    handler: main.handler
    files: [functions/noop/handler.py]
"#;
        let manifest = BundleManifest::from_yaml(yaml.as_bytes()).unwrap();
        assert_eq!(manifest.functions[0].memory_mb.get(), 128);
        assert_eq!(manifest.functions[0].timeout_s.get(), 30);
    }

    #[test]
    fn rejects_memory_mb_out_of_range() {
        let yaml = EXAMPLE.replace("memory_mb: 128", "memory_mb: 10241");
        assert!(BundleManifest::from_yaml(yaml.as_bytes()).is_err());
    }

    #[test]
    fn maps_timeout_s_zero_to_default() {
        let yaml = EXAMPLE.replace("timeout_s: 30", "timeout_s: 0");
        let manifest = BundleManifest::from_yaml(yaml.as_bytes()).unwrap();
        assert_eq!(manifest.functions[0].timeout_s.get(), TimeoutSeconds::DEFAULT);
    }

    #[test]
    fn rejects_timeout_s_above_max() {
        let yaml = EXAMPLE.replace("timeout_s: 30", "timeout_s: 901");
        assert!(BundleManifest::from_yaml(yaml.as_bytes()).is_err());
    }

    #[test]
    fn round_trips_through_yaml() {
        let manifest = BundleManifest::from_yaml(EXAMPLE.as_bytes()).unwrap();
        let bytes = manifest.to_yaml().unwrap();
        let reparsed = BundleManifest::from_yaml(&bytes).unwrap();
        assert_eq!(reparsed.name, manifest.name);
        assert_eq!(reparsed.functions.len(), manifest.functions.len());
    }

    #[test]
    fn rejects_function_with_uppercase_key() {
        let yaml = EXAMPLE.replace("key: greet", "key: Greet");
        assert!(BundleManifest::from_yaml(yaml.as_bytes()).is_err());
    }
}
