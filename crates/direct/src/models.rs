//! Per-model request defaults and body construction.

use atelier_core::params::{
    ParameterSet, KEY_HEIGHT, KEY_NEGATIVE_PROMPT, KEY_SEED, KEY_STEPS, KEY_WIDTH,
};

/// Defaults for one model served by the direct service.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectModel {
    pub name: &'static str,
    pub guidance_scale: f64,
    pub steps: i64,
}

/// Models the direct service serves. The first entry supplies defaults for
/// unknown names.
pub const DIRECT_MODELS: &[DirectModel] = &[
    DirectModel {
        name: "sd35",
        guidance_scale: 4.5,
        steps: 40,
    },
    DirectModel {
        name: "kolors",
        guidance_scale: 5.0,
        steps: 25,
    },
];

const DEFAULT_DIMENSION: i64 = 1024;

pub fn is_direct_model(name: &str) -> bool {
    DIRECT_MODELS.iter().any(|m| m.name == name)
}

pub fn model_defaults(name: &str) -> &'static DirectModel {
    DIRECT_MODELS
        .iter()
        .find(|m| m.name == name)
        .unwrap_or(&DIRECT_MODELS[0])
}

/// Build the `POST /generate` body for `model`.
///
/// Values present in `params` win over the model defaults; the model name
/// is sent as given even when its defaults come from the fallback entry.
pub fn build_request_body(model: &str, params: &ParameterSet) -> serde_json::Value {
    let defaults = model_defaults(model);
    let mut body = serde_json::json!({
        "model": model,
        "prompt": params.prompt,
        "steps": params.int(KEY_STEPS).unwrap_or(defaults.steps),
        "guidance_scale": defaults.guidance_scale,
        "width": params.int(KEY_WIDTH).unwrap_or(DEFAULT_DIMENSION),
        "height": params.int(KEY_HEIGHT).unwrap_or(DEFAULT_DIMENSION),
    });
    if let Some(negative) = params.text(KEY_NEGATIVE_PROMPT) {
        body["negative_prompt"] = serde_json::Value::from(negative);
    }
    if let Some(seed) = params.int(KEY_SEED) {
        body["seed"] = serde_json::Value::from(seed);
    }
    body
}

#[cfg(test)]
mod tests {
    use atelier_core::params::ParamValue;

    use super::*;

    #[test]
    fn kolors_defaults_apply() {
        let body = build_request_body("kolors", &ParameterSet::new("a fox"));
        assert_eq!(body["model"], "kolors");
        assert_eq!(body["prompt"], "a fox");
        assert_eq!(body["guidance_scale"], 5.0);
        assert_eq!(body["steps"], 25);
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn unknown_model_keeps_name_with_sd35_defaults() {
        let body = build_request_body("sd4", &ParameterSet::new("x"));
        assert_eq!(body["model"], "sd4");
        assert_eq!(body["guidance_scale"], 4.5);
        assert_eq!(body["steps"], 40);
        assert!(!is_direct_model("sd4"));
    }

    #[test]
    fn explicit_params_win() {
        let mut params = ParameterSet::new("x");
        params.set(KEY_STEPS, ParamValue::Int(12));
        params.set(KEY_WIDTH, ParamValue::Int(768));
        params.set(KEY_SEED, ParamValue::Int(7));
        params.set(KEY_NEGATIVE_PROMPT, ParamValue::Text("blur".into()));

        let body = build_request_body("sd35", &params);
        assert_eq!(body["steps"], 12);
        assert_eq!(body["width"], 768);
        assert_eq!(body["height"], 1024);
        assert_eq!(body["seed"], 7);
        assert_eq!(body["negative_prompt"], "blur");
    }
}
