//! Free-text prompt parser.
//!
//! Precedence when building the final parameter set:
//!
//! 1. defaults from the resolved model's profile;
//! 2. explicit flags from the text, merged on top;
//! 3. an aspect-ratio flag, if present, resolved last. It overwrites
//!    width/height even when they were given explicitly.

use super::aspect::{align_down, aspect_ratio_to_dimensions, REFERENCE_BASE_SIZE};
use super::flags::{is_flag, match_flag, FlagKind, FlagSpec, FLAG_SPECS};
use super::profiles::{profile_for, resolve_model_name};
use super::{
    ParamValue, ParameterSet, KEY_ASPECT_RATIO, KEY_BASESIZE, KEY_HEIGHT, KEY_MODEL, KEY_SEED,
    KEY_SHIFT, KEY_STEPS, KEY_WIDTH,
};
use crate::command::{parse_command, Command, COMMAND_MARKER};

/// Smallest accepted width/height after alignment.
pub const MIN_DIMENSION: i64 = 64;

/// Largest accepted width/height and base size.
pub const MAX_DIMENSION: i64 = 4096;

/// Smallest accepted base size.
pub const MIN_BASESIZE: i64 = 256;

/// Largest accepted step count.
pub const MAX_STEPS: i64 = 150;

/// Result of parsing user text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedInput {
    /// A generation request.
    Generate(ParameterSet),
    /// A slash command.
    Command(Command),
}

/// User-facing parse failure. The `Display` output is shown to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{flag} requires a value")]
    MissingValue { flag: &'static str },

    #[error("Invalid value for {flag}: '{value}' (expected {expected})")]
    InvalidValue {
        flag: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{flag} must be between {min} and {max} (got {value})")]
    OutOfRange {
        flag: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("{0}")]
    Usage(String),
}

/// Parse user text into generation parameters or a command.
///
/// `default_model` applies when the text has no `--model` flag.
pub fn parse(text: &str, default_model: &str) -> Result<ParsedInput, ParseError> {
    let trimmed = text.trim();
    if trimmed.starts_with(COMMAND_MARKER) {
        return parse_command(trimmed).map(ParsedInput::Command);
    }
    parse_generation(trimmed, default_model).map(ParsedInput::Generate)
}

/// Parse generation text (no command routing).
pub fn parse_generation(text: &str, default_model: &str) -> Result<ParameterSet, ParseError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut consumed = vec![false; tokens.len()];
    let mut explicit = ParameterSet::default();

    for spec in FLAG_SPECS {
        scan_flag(spec, &tokens, &mut consumed, &mut explicit)?;
    }

    let prompt = tokens
        .iter()
        .zip(&consumed)
        .filter(|(_, used)| !**used)
        .map(|(token, _)| *token)
        .collect::<Vec<_>>()
        .join(" ");
    if prompt.is_empty() {
        return Err(ParseError::EmptyPrompt);
    }

    validate_explicit(&mut explicit)?;

    let model = resolve_model_name(explicit.model().unwrap_or(default_model));

    let mut params = ParameterSet::new(prompt);
    profile_for(&model).apply(&mut params);
    for (key, value) in explicit.iter() {
        params.set(key, value.clone());
    }
    params.set(KEY_MODEL, ParamValue::Text(model));

    if let Some(ratio) = params.text(KEY_ASPECT_RATIO).map(str::to_owned) {
        let base = params
            .int(KEY_BASESIZE)
            .map(|b| b as u32)
            .unwrap_or(REFERENCE_BASE_SIZE);
        let (width, height) = aspect_ratio_to_dimensions(&ratio, base);
        params.set(KEY_WIDTH, ParamValue::Int(width as i64));
        params.set(KEY_HEIGHT, ParamValue::Int(height as i64));
    }

    Ok(params)
}

/// Consume every occurrence of `spec` in `tokens`, recording values in `out`.
fn scan_flag(
    spec: &'static FlagSpec,
    tokens: &[&str],
    consumed: &mut [bool],
    out: &mut ParameterSet,
) -> Result<(), ParseError> {
    let mut i = 0;
    while i < tokens.len() {
        let inline = match match_flag(tokens[i]) {
            Some((matched, inline)) if !consumed[i] && matched.key == spec.key => inline,
            _ => {
                i += 1;
                continue;
            }
        };
        consumed[i] = true;

        let raw = if spec.kind == FlagKind::TextRun {
            let mut parts: Vec<&str> = inline.filter(|v| !v.is_empty()).into_iter().collect();
            let mut j = i + 1;
            while j < tokens.len() && !consumed[j] && !is_flag(tokens[j]) {
                parts.push(tokens[j]);
                consumed[j] = true;
                j += 1;
            }
            i = j;
            parts.join(" ")
        } else if let Some(inline) = inline {
            i += 1;
            inline.to_string()
        } else {
            match tokens.get(i + 1) {
                Some(next) if !consumed[i + 1] && !is_flag(next) => {
                    consumed[i + 1] = true;
                    i += 2;
                    (*next).to_string()
                }
                _ => {
                    return Err(ParseError::MissingValue {
                        flag: spec.display_name(),
                    })
                }
            }
        };

        if raw.is_empty() {
            return Err(ParseError::MissingValue {
                flag: spec.display_name(),
            });
        }
        store_value(spec, &raw, out)?;
    }
    Ok(())
}

fn store_value(spec: &FlagSpec, raw: &str, out: &mut ParameterSet) -> Result<(), ParseError> {
    let value = match spec.kind {
        FlagKind::Int => ParamValue::Int(raw.parse().map_err(|_| ParseError::InvalidValue {
            flag: spec.display_name(),
            value: raw.to_string(),
            expected: "an integer",
        })?),
        FlagKind::Float => {
            let parsed: f64 = raw.parse().map_err(|_| ParseError::InvalidValue {
                flag: spec.display_name(),
                value: raw.to_string(),
                expected: "a number",
            })?;
            if !parsed.is_finite() {
                return Err(ParseError::InvalidValue {
                    flag: spec.display_name(),
                    value: raw.to_string(),
                    expected: "a finite number",
                });
            }
            ParamValue::Float(parsed)
        }
        FlagKind::Text | FlagKind::TextRun => ParamValue::Text(raw.to_string()),
        FlagKind::List => {
            let mut items = out.list(spec.key).map(<[String]>::to_vec).unwrap_or_default();
            items.extend(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
            if items.is_empty() {
                return Err(ParseError::MissingValue {
                    flag: spec.display_name(),
                });
            }
            ParamValue::List(items)
        }
    };
    out.set(spec.key, value);
    Ok(())
}

/// Range-check explicit numeric values and align explicit dimensions.
fn validate_explicit(explicit: &mut ParameterSet) -> Result<(), ParseError> {
    for (key, flag) in [(KEY_WIDTH, "--width"), (KEY_HEIGHT, "--height")] {
        if let Some(value) = explicit.int(key) {
            let aligned = if value > 0 {
                align_down(value.min(u32::MAX as i64) as u32) as i64
            } else {
                value
            };
            check_range(flag, aligned, MIN_DIMENSION, MAX_DIMENSION)?;
            explicit.set(key, ParamValue::Int(aligned));
        }
    }
    if let Some(value) = explicit.int(KEY_BASESIZE) {
        check_range("--basesize", value, MIN_BASESIZE, MAX_DIMENSION)?;
    }
    if let Some(value) = explicit.int(KEY_STEPS) {
        check_range("--steps", value, 1, MAX_STEPS)?;
    }
    if let Some(value) = explicit.int(KEY_SEED) {
        check_range("--seed", value, 0, i64::MAX)?;
    }
    if let Some(value) = explicit.float(KEY_SHIFT) {
        if value <= 0.0 {
            return Err(ParseError::InvalidValue {
                flag: "--shift",
                value: value.to_string(),
                expected: "a positive number",
            });
        }
    }
    Ok(())
}

fn check_range(flag: &'static str, value: i64, min: i64, max: i64) -> Result<(), ParseError> {
    if value < min || value > max {
        return Err(ParseError::OutOfRange {
            flag,
            value,
            min,
            max,
        });
    }
    Ok(())
}
