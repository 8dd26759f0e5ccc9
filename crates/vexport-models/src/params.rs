//! Processing parameters and their validation.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Effect parameters for one processing job.
///
/// Unknown fields are ignored and missing fields take their defaults, so a
/// client may send `{}` to get an untouched re-encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct ProcessingParams {
    /// Volume multiplier for the source video's audio track
    #[validate(range(min = 0.0, max = 2.0, message = "must be between 0.0 and 2.0"))]
    pub original_audio_volume: f64,

    /// Volume multiplier for the uploaded audio track
    #[validate(range(min = 0.0, max = 2.0, message = "must be between 0.0 and 2.0"))]
    pub uploaded_audio_volume: f64,

    /// Pink noise amplitude mixed into the uploaded audio
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0.0 and 1.0"))]
    pub audio_noise: f64,

    /// Playback speed multiplier
    #[validate(range(min = 0.5, max = 2.0, message = "must be between 0.5 and 2.0"))]
    pub video_speed: f64,

    /// Zoom multiplier applied after fitting to the target frame
    #[validate(range(min = 0.5, max = 2.0, message = "must be between 0.5 and 2.0"))]
    pub zoom_factor: f64,

    /// 0.0 = black & white, 1.0 = unchanged, above 1.0 = oversaturated
    #[validate(range(min = 0.0, max = 2.0, message = "must be between 0.0 and 2.0"))]
    pub saturation: f64,

    /// Tint colour as `#RRGGBB`; an empty string means no tint
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    #[schemars(with = "Option<String>")]
    pub color_overlay: Option<String>,

    /// Tint strength
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0.0 and 1.0"))]
    pub color_overlay_opacity: f64,

    /// One of `none`, `blur_to_clear`, `fade_in`
    pub intro_animation: String,

    /// Intro length in seconds
    #[validate(range(min = 0.0, max = 5.0, message = "must be between 0.0 and 5.0"))]
    pub intro_duration: f64,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            original_audio_volume: 1.0,
            uploaded_audio_volume: 1.0,
            audio_noise: 0.0,
            video_speed: 1.0,
            zoom_factor: 1.0,
            saturation: 1.0,
            color_overlay: None,
            color_overlay_opacity: 0.0,
            intro_animation: IntroAnimation::None.as_str().to_string(),
            intro_duration: 2.0,
        }
    }
}

/// A single parameter rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    /// Offending field name
    pub field: String,
    /// Human-readable rule, e.g. "must be between 0.5 and 2.0"
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

impl ProcessingParams {
    /// Check every rule and return all violations, sorted by field name.
    ///
    /// An empty list means the parameters may be admitted.
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        if let Err(errors) = self.validate() {
            for (field, field_errors) in errors.field_errors() {
                for error in field_errors.iter() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("is invalid ({})", error.code));
                    violations.push(Violation::new(field.to_string(), message));
                }
            }
        }

        if self.intro_animation.parse::<IntroAnimation>().is_err() {
            violations.push(Violation::new(
                "intro_animation",
                "must be 'none', 'blur_to_clear', or 'fade_in'",
            ));
        }

        if let Some(color) = self.color_overlay.as_deref().filter(|c| !c.is_empty()) {
            if parse_hex_color(color).is_none() {
                violations.push(Violation::new(
                    "color_overlay",
                    "must be a hex colour like #ff0000",
                ));
            }
        }

        violations.sort_by(|a, b| a.field.cmp(&b.field));
        violations
    }

    /// Parsed intro animation; invalid values fall back to `None`.
    pub fn intro(&self) -> IntroAnimation {
        self.intro_animation.parse().unwrap_or_default()
    }

    /// Overlay colour as RGB, when set and well-formed.
    pub fn overlay_rgb(&self) -> Option<(u8, u8, u8)> {
        self.color_overlay.as_deref().and_then(parse_hex_color)
    }
}

/// Intro animation applied to the first `intro_duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntroAnimation {
    #[default]
    None,
    BlurToClear,
    FadeIn,
}

impl IntroAnimation {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntroAnimation::None => "none",
            IntroAnimation::BlurToClear => "blur_to_clear",
            IntroAnimation::FadeIn => "fade_in",
        }
    }
}

impl FromStr for IntroAnimation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(IntroAnimation::None),
            "blur_to_clear" => Ok(IntroAnimation::BlurToClear),
            "fade_in" => Ok(IntroAnimation::FadeIn),
            other => Err(format!("unknown intro animation: {}", other)),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}
