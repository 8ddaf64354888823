//! Workflow templates with an `x-params` injection block.
//!
//! A template is a ComfyUI API-format workflow (`{node_id: {class_type,
//! inputs}}`) plus a reserved `x-params` object:
//!
//! ```json
//! "x-params": {
//!     "prompt": "6",
//!     "negative_prompt": "7",
//!     "seed": "3.noise_seed",
//!     "width": "5",
//!     "output": "9"
//! }
//! ```
//!
//! Each entry targets `"<node>"` or `"<node>.<input>"`. Text fields go to
//! the node's `text` input unless an input is named; every other parameter
//! goes to the input named after the parameter. `output` names the node
//! whose result is downloaded. The block is removed before submission.

use std::collections::BTreeMap;
use std::path::Path;

use atelier_core::backend::BackendError;
use atelier_core::params::{ParameterSet, KEY_NEGATIVE_PROMPT, KEY_PROMPT, KEY_SEED};

/// Reserved top-level key holding the injection map.
pub const X_PARAMS_KEY: &str = "x-params";

/// Key inside `x-params` naming the output node.
pub const OUTPUT_KEY: &str = "output";

/// Default input for text parameters.
const TEXT_INPUT: &str = "text";

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Workflow '{0}' not found")]
    NotFound(String),

    #[error("Invalid workflow name '{0}'")]
    InvalidName(String),

    #[error("Failed to read workflow: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workflow is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workflow has no 'x-params' block")]
    MissingParams,

    #[error("Workflow 'x-params' block has no 'output' node")]
    MissingOutput,

    #[error("Invalid target for '{param}': {reason}")]
    InvalidTarget { param: String, reason: String },

    #[error("Parameter '{param}' targets missing node '{node}'")]
    UnknownNode { param: String, node: String },
}

impl From<WorkflowError> for BackendError {
    fn from(err: WorkflowError) -> Self {
        BackendError::Template(err.to_string())
    }
}

/// Injection point for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTarget {
    pub node: String,
    /// Explicit input name, if the mapping used `node.input`.
    pub input: Option<String>,
}

impl ParamTarget {
    fn parse(param: &str, raw: &serde_json::Value) -> Result<Self, WorkflowError> {
        let invalid = |reason: &str| WorkflowError::InvalidTarget {
            param: param.to_string(),
            reason: reason.to_string(),
        };
        let raw = match raw {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return Err(invalid("expected \"<node>\" or \"<node>.<input>\"")),
        };
        let (node, input) = match raw.split_once('.') {
            Some((node, input)) => (node.trim(), Some(input.trim())),
            None => (raw.trim(), None),
        };
        if node.is_empty() || input.is_some_and(str::is_empty) {
            return Err(invalid("empty node or input name"));
        }
        Ok(Self {
            node: node.to_string(),
            input: input.map(str::to_string),
        })
    }

    fn input_for(&self, param: &str) -> String {
        match &self.input {
            Some(input) => input.clone(),
            None if param == KEY_PROMPT || param == KEY_NEGATIVE_PROMPT => TEXT_INPUT.to_string(),
            None => param.to_string(),
        }
    }
}

/// A parsed template, ready to be materialized per request.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    document: serde_json::Map<String, serde_json::Value>,
    params: BTreeMap<String, ParamTarget>,
    output_node: String,
}

impl WorkflowTemplate {
    /// Parse a template document, validating the `x-params` block.
    pub fn parse(value: serde_json::Value) -> Result<Self, WorkflowError> {
        let serde_json::Value::Object(mut document) = value else {
            return Err(WorkflowError::MissingParams);
        };
        let Some(serde_json::Value::Object(block)) = document.remove(X_PARAMS_KEY) else {
            return Err(WorkflowError::MissingParams);
        };

        let output_node = match block.get(OUTPUT_KEY) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(WorkflowError::MissingOutput),
        };
        if !document.contains_key(&output_node) {
            return Err(WorkflowError::UnknownNode {
                param: OUTPUT_KEY.to_string(),
                node: output_node,
            });
        }

        let mut params = BTreeMap::new();
        for (param, raw) in block.iter().filter(|(k, _)| k.as_str() != OUTPUT_KEY) {
            let target = ParamTarget::parse(param, raw)?;
            if !document.contains_key(&target.node) {
                return Err(WorkflowError::UnknownNode {
                    param: param.clone(),
                    node: target.node,
                });
            }
            params.insert(param.clone(), target);
        }

        Ok(Self {
            document,
            params,
            output_node,
        })
    }

    /// Load `<dir>/<name>.json`.
    pub async fn load(dir: &Path, name: &str) -> Result<Self, WorkflowError> {
        if !is_valid_name(name) {
            return Err(WorkflowError::InvalidName(name.to_string()));
        }
        let path = dir.join(format!("{name}.json"));
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(serde_json::from_slice(&raw)?)
    }

    pub fn output_node(&self) -> &str {
        &self.output_node
    }

    pub fn targets(&self) -> &BTreeMap<String, ParamTarget> {
        &self.params
    }

    /// Produce the submission document for `params`.
    ///
    /// Mapped parameters without a value are left at the template's value,
    /// except `seed`, which receives a random seed.
    pub fn materialize(&self, params: &ParameterSet) -> Result<serde_json::Value, WorkflowError> {
        let mut document = self.document.clone();

        for (param, target) in &self.params {
            let value = if param == KEY_PROMPT {
                Some(serde_json::Value::from(params.prompt.as_str()))
            } else if let Some(v) = params.get(param) {
                Some(v.to_json())
            } else if param == KEY_SEED {
                let seed = random_seed();
                tracing::debug!(seed, "No seed given, using random seed");
                Some(serde_json::Value::from(seed))
            } else {
                None
            };
            let Some(value) = value else { continue };

            let inputs = document
                .get_mut(&target.node)
                .and_then(|node| node.as_object_mut())
                .map(|node| {
                    node.entry("inputs")
                        .or_insert_with(|| serde_json::Value::Object(Default::default()))
                })
                .and_then(|inputs| inputs.as_object_mut())
                .ok_or_else(|| WorkflowError::UnknownNode {
                    param: param.clone(),
                    node: target.node.clone(),
                })?;
            inputs.insert(target.input_for(param), value);
        }

        Ok(serde_json::Value::Object(document))
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn random_seed() -> u64 {
    // Stay within the exact integer range of a JSON double.
    rand::random::<u64>() & ((1 << 53) - 1)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use atelier_core::params::{ParamValue, KEY_STEPS, KEY_WIDTH};
    use serde_json::json;

    use super::*;

    fn template() -> serde_json::Value {
        json!({
            "3": {"class_type": "KSampler", "inputs": {"seed": 0, "steps": 20}},
            "5": {"class_type": "EmptyLatentImage", "inputs": {"width": 512, "height": 512}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": ""}},
            "7": {"class_type": "CLIPTextEncode", "inputs": {"text": ""}},
            "9": {"class_type": "SaveImage", "inputs": {}},
            "x-params": {
                "prompt": "6",
                "negative_prompt": "7",
                "seed": "3.seed",
                "steps": "3",
                "width": "5",
                "height": "5",
                "output": "9"
            }
        })
    }

    #[test]
    fn injects_typed_values_and_strips_block() {
        let tpl = WorkflowTemplate::parse(template()).unwrap();
        let mut params = ParameterSet::new("a cat");
        params.set(KEY_STEPS, ParamValue::Int(10));
        params.set(KEY_WIDTH, ParamValue::Int(1216));
        params.set(KEY_SEED, ParamValue::Int(42));
        params.set(KEY_NEGATIVE_PROMPT, ParamValue::Text("blurry".into()));

        let doc = tpl.materialize(&params).unwrap();

        assert!(doc.get(X_PARAMS_KEY).is_none());
        assert_eq!(doc["6"]["inputs"]["text"], "a cat");
        assert_eq!(doc["7"]["inputs"]["text"], "blurry");
        assert_eq!(doc["3"]["inputs"]["steps"], 10);
        assert_eq!(doc["3"]["inputs"]["seed"], 42);
        assert_eq!(doc["5"]["inputs"]["width"], 1216);
        // unset height keeps the template value
        assert_eq!(doc["5"]["inputs"]["height"], 512);
        assert_eq!(tpl.output_node(), "9");
    }

    #[test]
    fn missing_seed_gets_random_value() {
        let tpl = WorkflowTemplate::parse(template()).unwrap();
        let doc = tpl.materialize(&ParameterSet::new("a cat")).unwrap();
        assert!(doc["3"]["inputs"]["seed"].is_u64());
    }

    #[test]
    fn missing_block_fails() {
        let mut doc = template();
        doc.as_object_mut().unwrap().remove(X_PARAMS_KEY);
        assert_matches!(WorkflowTemplate::parse(doc), Err(WorkflowError::MissingParams));
    }

    #[test]
    fn missing_output_fails() {
        let mut doc = template();
        doc[X_PARAMS_KEY].as_object_mut().unwrap().remove(OUTPUT_KEY);
        assert_matches!(WorkflowTemplate::parse(doc), Err(WorkflowError::MissingOutput));
    }

    #[test]
    fn unknown_node_fails() {
        let mut doc = template();
        doc[X_PARAMS_KEY]["steps"] = json!("42");
        assert_matches!(
            WorkflowTemplate::parse(doc),
            Err(WorkflowError::UnknownNode { ref node, .. }) if node == "42"
        );
    }

    #[tokio::test]
    async fn load_reads_named_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("flux.json"), template().to_string()).unwrap();

        let tpl = WorkflowTemplate::load(dir.path(), "flux").await.unwrap();
        assert_eq!(tpl.targets().len(), 6);

        assert_matches!(
            WorkflowTemplate::load(dir.path(), "hidream").await,
            Err(WorkflowError::NotFound(_))
        );
        assert_matches!(
            WorkflowTemplate::load(dir.path(), "../flux").await,
            Err(WorkflowError::InvalidName(_))
        );
    }
}
