//! Prompt parameter parsing.
//!
//! Turns free text such as `"a cat --ar 3:2 --steps 10"` into a canonical
//! [`ParameterSet`] (or a slash [`Command`](crate::command::Command)).
//! Flag synonyms live in [`flags::FLAG_SPECS`], model defaults in
//! [`profiles::MODEL_PROFILES`], and aspect-ratio sizes in
//! [`aspect::ASPECT_RATIO_TABLE`].

pub mod aspect;
pub mod flags;
pub mod parser;
pub mod profiles;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use aspect::aspect_ratio_to_dimensions;
pub use parser::{parse, ParseError, ParsedInput};

// ---------------------------------------------------------------------------
// Canonical keys
// ---------------------------------------------------------------------------

pub const KEY_MODEL: &str = "model";
pub const KEY_WIDTH: &str = "width";
pub const KEY_HEIGHT: &str = "height";
pub const KEY_STEPS: &str = "steps";
pub const KEY_SEED: &str = "seed";
pub const KEY_SHIFT: &str = "shift";
pub const KEY_BASESIZE: &str = "basesize";
pub const KEY_ASPECT_RATIO: &str = "aspect_ratio";
pub const KEY_NEGATIVE_PROMPT: &str = "negative_prompt";
pub const KEY_TASK_ID: &str = "task_id";
pub const KEY_IMAGES: &str = "images";

/// Key under which the clean prompt appears in the serialized form.
pub const KEY_PROMPT: &str = "prompt";

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl ParamValue {
    /// Convert to a JSON value suitable for injecting into a backend document.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Int(v) => serde_json::Value::from(*v),
            ParamValue::Float(v) => serde_json::Value::from(*v),
            ParamValue::Text(v) => serde_json::Value::from(v.as_str()),
            ParamValue::List(v) => serde_json::Value::from(v.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// ParameterSet
// ---------------------------------------------------------------------------

/// Canonical parameters for one generation request plus the clean prompt.
///
/// Serializes as a flat JSON object: every canonical key alongside
/// `"prompt"`. This is the shape stored in a job record's `parameters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub prompt: String,
    #[serde(flatten)]
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: ParamValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Integer value of `key`. Floats are not coerced.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Float value of `key`; integers are widened.
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(ParamValue::Float(v)) => Some(*v),
            Some(ParamValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParamValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.values.get(key) {
            Some(ParamValue::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.text(KEY_MODEL)
    }

    pub fn width(&self) -> Option<i64> {
        self.int(KEY_WIDTH)
    }

    pub fn height(&self) -> Option<i64> {
        self.int(KEY_HEIGHT)
    }

    pub fn steps(&self) -> Option<i64> {
        self.int(KEY_STEPS)
    }

    pub fn seed(&self) -> Option<i64> {
        self.int(KEY_SEED)
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        self.text(KEY_NEGATIVE_PROMPT)
    }

    /// Serialize to the flat JSON object stored on the job record.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Rebuild from the flat JSON object produced by [`to_json`](Self::to_json).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}
