//! Per-model default parameter profiles and model-name aliases.

use super::{ParamValue, ParameterSet, KEY_BASESIZE, KEY_HEIGHT, KEY_SHIFT, KEY_STEPS, KEY_WIDTH};

/// Model whose profile applies when the requested model is unknown.
pub const DEFAULT_MODEL: &str = "flux";

/// Baseline parameter values for one model family.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub name: &'static str,
    pub steps: i64,
    pub width: i64,
    pub height: i64,
    /// Base size used for aspect-ratio resolution, if the model has a fixed one.
    pub basesize: Option<i64>,
    /// Sampling shift tuning parameter.
    pub shift: Option<f64>,
}

/// All known model profiles. The first entry is [`DEFAULT_MODEL`].
pub const MODEL_PROFILES: &[ModelProfile] = &[
    ModelProfile {
        name: "flux",
        steps: 8,
        width: 1024,
        height: 1024,
        basesize: None,
        shift: None,
    },
    ModelProfile {
        name: "hidream",
        steps: 30,
        width: 1024,
        height: 1024,
        basesize: Some(1024),
        shift: Some(3.0),
    },
    ModelProfile {
        name: "sd35",
        steps: 40,
        width: 1024,
        height: 1024,
        basesize: None,
        shift: None,
    },
    ModelProfile {
        name: "kolors",
        steps: 25,
        width: 1024,
        height: 1024,
        basesize: None,
        shift: None,
    },
];

/// Shorthand model names accepted in `--model`.
pub const MODEL_ALIASES: &[(&str, &str)] = &[
    ("f", "flux"),
    ("schnell", "flux"),
    ("hd", "hidream"),
    ("hi", "hidream"),
];

/// Normalize a user-supplied model name: lowercase and resolve aliases.
///
/// Unknown names are returned lowercased and otherwise untouched.
pub fn resolve_model_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, target)| (*target).to_string())
        .unwrap_or(lowered)
}

/// Profile for a resolved model name, falling back to [`DEFAULT_MODEL`].
pub fn profile_for(model: &str) -> &'static ModelProfile {
    MODEL_PROFILES
        .iter()
        .find(|p| p.name == model)
        .unwrap_or(&MODEL_PROFILES[0])
}

impl ModelProfile {
    /// Write this profile's defaults into `params`, overwriting existing values.
    pub fn apply(&self, params: &mut ParameterSet) {
        params.set(KEY_STEPS, ParamValue::Int(self.steps));
        params.set(KEY_WIDTH, ParamValue::Int(self.width));
        params.set(KEY_HEIGHT, ParamValue::Int(self.height));
        if let Some(basesize) = self.basesize {
            params.set(KEY_BASESIZE, ParamValue::Int(basesize));
        }
        if let Some(shift) = self.shift {
            params.set(KEY_SHIFT, ParamValue::Float(shift));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::aspect::DIMENSION_ALIGNMENT;

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(resolve_model_name("HD"), "hidream");
        assert_eq!(resolve_model_name(" schnell "), "flux");
        assert_eq!(resolve_model_name("flux"), "flux");
    }

    #[test]
    fn unknown_model_keeps_its_name_but_uses_default_profile() {
        assert_eq!(resolve_model_name("Mystery-XL"), "mystery-xl");
        assert_eq!(profile_for("mystery-xl").name, DEFAULT_MODEL);
        assert_eq!(profile_for("sd35").steps, 40);
    }

    #[test]
    fn default_model_is_first_profile() {
        assert_eq!(MODEL_PROFILES[0].name, DEFAULT_MODEL);
    }

    #[test]
    fn profile_dimensions_are_aligned() {
        for profile in MODEL_PROFILES {
            assert_eq!(profile.width as u32 % DIMENSION_ALIGNMENT, 0, "{}", profile.name);
            assert_eq!(profile.height as u32 % DIMENSION_ALIGNMENT, 0, "{}", profile.name);
        }
    }

    #[test]
    fn hidream_profile_carries_shift_and_basesize() {
        let mut params = ParameterSet::new("x");
        profile_for("hidream").apply(&mut params);
        assert_eq!(params.int(KEY_STEPS), Some(30));
        assert_eq!(params.int(KEY_BASESIZE), Some(1024));
        assert_eq!(params.float(KEY_SHIFT), Some(3.0));
    }
}
