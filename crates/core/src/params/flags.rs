//! Declarative flag table.
//!
//! Every supported flag is one [`FlagSpec`] row: its canonical key, the
//! long and short spellings that select it, and how its value is read.

use super::{
    KEY_ASPECT_RATIO, KEY_BASESIZE, KEY_HEIGHT, KEY_IMAGES, KEY_MODEL, KEY_NEGATIVE_PROMPT,
    KEY_SEED, KEY_SHIFT, KEY_STEPS, KEY_TASK_ID, KEY_WIDTH,
};

/// How a flag's value is read from the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// One token parsed as an integer.
    Int,
    /// One token parsed as a float.
    Float,
    /// One token taken verbatim.
    Text,
    /// Every token up to the next recognized flag (or end of input).
    TextRun,
    /// One token split on commas; repeated occurrences accumulate.
    List,
}

/// One supported flag.
#[derive(Debug, Clone, Copy)]
pub struct FlagSpec {
    pub key: &'static str,
    pub long: &'static [&'static str],
    pub short: Option<&'static str>,
    pub kind: FlagKind,
}

impl FlagSpec {
    /// The spelling used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        self.long[0]
    }

    fn matches(&self, name: &str) -> bool {
        self.long.contains(&name) || self.short == Some(name)
    }
}

pub const FLAG_SPECS: &[FlagSpec] = &[
    FlagSpec {
        key: KEY_MODEL,
        long: &["--model"],
        short: Some("-m"),
        kind: FlagKind::Text,
    },
    FlagSpec {
        key: KEY_BASESIZE,
        long: &["--basesize", "--base-size"],
        short: None,
        kind: FlagKind::Int,
    },
    FlagSpec {
        key: KEY_ASPECT_RATIO,
        long: &["--ar", "--aspect-ratio"],
        short: None,
        kind: FlagKind::Text,
    },
    FlagSpec {
        key: KEY_SHIFT,
        long: &["--shift"],
        short: None,
        kind: FlagKind::Float,
    },
    FlagSpec {
        key: KEY_WIDTH,
        long: &["--width"],
        short: Some("-w"),
        kind: FlagKind::Int,
    },
    FlagSpec {
        key: KEY_HEIGHT,
        long: &["--height"],
        short: Some("-h"),
        kind: FlagKind::Int,
    },
    FlagSpec {
        key: KEY_STEPS,
        long: &["--steps"],
        short: Some("-s"),
        kind: FlagKind::Int,
    },
    FlagSpec {
        key: KEY_SEED,
        long: &["--seed"],
        short: None,
        kind: FlagKind::Int,
    },
    FlagSpec {
        key: KEY_NEGATIVE_PROMPT,
        long: &["--negative-prompt", "--neg", "--no"],
        short: Some("-n"),
        kind: FlagKind::TextRun,
    },
    FlagSpec {
        key: KEY_TASK_ID,
        long: &["--task-id"],
        short: Some("-t"),
        kind: FlagKind::Text,
    },
    FlagSpec {
        key: KEY_IMAGES,
        long: &["--image", "--images"],
        short: Some("-i"),
        kind: FlagKind::List,
    },
];

/// Match a single whitespace-delimited token against the flag table.
///
/// Returns the matching spec and, for the `--flag=value` form, the inline
/// value.
pub fn match_flag(token: &str) -> Option<(&'static FlagSpec, Option<&str>)> {
    if !token.starts_with('-') {
        return None;
    }
    let (name, inline) = match token.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (token, None),
    };
    FLAG_SPECS
        .iter()
        .find(|spec| spec.matches(name))
        .map(|spec| (spec, inline))
}

/// Whether `token` is any recognized flag.
pub fn is_flag(token: &str) -> bool {
    match_flag(token).is_some()
}
