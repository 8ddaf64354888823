//! Aspect-ratio to pixel-dimension resolution.
//!
//! Common ratios resolve through a fixed table of precomputed sizes at the
//! reference base size. Anything else (an arbitrary `W:H`, or a base size
//! other than the reference) is computed and aligned down to a multiple of
//! [`DIMENSION_ALIGNMENT`].

use std::sync::LazyLock;

use regex::Regex;

/// Base size the lookup table was computed for.
pub const REFERENCE_BASE_SIZE: u32 = 1024;

/// Generated dimensions must be multiples of this value.
pub const DIMENSION_ALIGNMENT: u32 = 8;

/// Ratio used when the requested one cannot be parsed.
pub const FALLBACK_RATIO: &str = "1:1";

/// Precomputed `(ratio, width, height)` at [`REFERENCE_BASE_SIZE`].
pub const ASPECT_RATIO_TABLE: &[(&str, u32, u32)] = &[
    ("1:1", 1024, 1024),
    ("4:3", 1152, 896),
    ("3:4", 896, 1152),
    ("3:2", 1216, 810),
    ("2:3", 810, 1216),
    ("16:9", 1344, 768),
    ("9:16", 768, 1344),
    ("21:9", 1536, 640),
    ("9:21", 640, 1536),
    ("32:9", 1792, 504),
    ("9:32", 504, 1792),
    // Cinema ratios.
    ("1.85:1", 1344, 728),
    ("2.39:1", 1536, 640),
];

static RATIO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s*:\s*(\d+(?:\.\d+)?)$").expect("valid regex")
});

/// Resolve an aspect ratio string such as `"16:9"` into `(width, height)`.
///
/// Table ratios at the reference base size return the table entry. Other
/// numeric ratios, and every ratio at a non-reference base size, are
/// computed with the longer side equal to `base_size`. Malformed input
/// falls back to a square.
pub fn aspect_ratio_to_dimensions(ratio: &str, base_size: u32) -> (u32, u32) {
    let ratio = ratio.trim();

    if base_size == REFERENCE_BASE_SIZE {
        if let Some(&(_, w, h)) = ASPECT_RATIO_TABLE.iter().find(|(r, _, _)| *r == ratio) {
            return (w, h);
        }
    }

    match parse_ratio(ratio) {
        Some((w, h)) => compute_dimensions(w, h, base_size),
        None => compute_dimensions(1.0, 1.0, base_size),
    }
}

/// Parse `"W:H"` into two positive numbers.
pub fn parse_ratio(ratio: &str) -> Option<(f64, f64)> {
    let caps = RATIO_RE.captures(ratio.trim())?;
    let w: f64 = caps[1].parse().ok()?;
    let h: f64 = caps[2].parse().ok()?;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some((w, h))
}

/// Whether `ratio` is a well-formed `W:H` value.
pub fn is_valid_ratio(ratio: &str) -> bool {
    parse_ratio(ratio).is_some()
}

/// Round `value` down to the nearest multiple of [`DIMENSION_ALIGNMENT`],
/// never below one alignment unit.
pub fn align_down(value: u32) -> u32 {
    (value / DIMENSION_ALIGNMENT * DIMENSION_ALIGNMENT).max(DIMENSION_ALIGNMENT)
}

fn compute_dimensions(w: f64, h: f64, base_size: u32) -> (u32, u32) {
    let longer = base_size;
    let shorter = (base_size as f64 * w.min(h) / w.max(h)).round() as u32;
    let (longer, shorter) = (align_down(longer), align_down(shorter));
    if w >= h {
        (longer, shorter)
    } else {
        (shorter, longer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_at_reference_size() {
        assert_eq!(aspect_ratio_to_dimensions("1:1", 1024), (1024, 1024));
    }

    #[test]
    fn widescreen_uses_table_entry() {
        assert_eq!(aspect_ratio_to_dimensions("16:9", 1024), (1344, 768));
        assert_eq!(aspect_ratio_to_dimensions("9:16", 1024), (768, 1344));
    }

    #[test]
    fn malformed_ratio_falls_back_to_square() {
        assert_eq!(aspect_ratio_to_dimensions("bogus", 1024), (1024, 1024));
        assert_eq!(aspect_ratio_to_dimensions("16:0", 1024), (1024, 1024));
        assert_eq!(aspect_ratio_to_dimensions("", 1024), (1024, 1024));
    }

    #[test]
    fn cinema_ratios_resolve() {
        assert_eq!(aspect_ratio_to_dimensions("2.39:1", 1024), (1536, 640));
        assert_eq!(aspect_ratio_to_dimensions("1.85:1", 1024), (1344, 728));
    }

    #[test]
    fn unlisted_ratio_is_computed_and_aligned() {
        // 5:4 at 1024 -> 1024 x round(819.2) = 819 -> 816.
        assert_eq!(aspect_ratio_to_dimensions("5:4", 1024), (1024, 816));
        assert_eq!(aspect_ratio_to_dimensions("4:5", 1024), (816, 1024));
    }

    #[test]
    fn non_reference_base_size_is_computed() {
        // 16:9 at 1328 -> 1328 x round(747) = 747 -> 744.
        assert_eq!(aspect_ratio_to_dimensions("16:9", 1328), (1328, 744));
        assert_eq!(aspect_ratio_to_dimensions("bogus", 1000), (1000, 1000));
    }

    #[test]
    fn computed_dimensions_are_aligned() {
        for ratio in ["7:3", "13:11", "1:3", "2.2:1", "100:99"] {
            for base in [512, 777, 1024, 1536, 2049] {
                let (w, h) = aspect_ratio_to_dimensions(ratio, base);
                assert_eq!(w % DIMENSION_ALIGNMENT, 0, "{ratio} @ {base}: width {w}");
                assert_eq!(h % DIMENSION_ALIGNMENT, 0, "{ratio} @ {base}: height {h}");
            }
        }
    }

    #[test]
    fn parse_ratio_accepts_decimals_and_spaces() {
        assert_eq!(parse_ratio("2.39:1"), Some((2.39, 1.0)));
        assert_eq!(parse_ratio(" 4 : 3 "), Some((4.0, 3.0)));
        assert!(parse_ratio("4x3").is_none());
        assert!(parse_ratio("-4:3").is_none());
    }

    #[test]
    fn align_down_never_returns_zero() {
        assert_eq!(align_down(99), 96);
        assert_eq!(align_down(3), 8);
        assert_eq!(align_down(64), 64);
    }
}
