//! Built-in parameter presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::params::{IntroAnimation, ProcessingParams};

/// A named set of processing parameters a client can submit as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: String,
    pub params: ProcessingParams,
}

impl Template {
    fn new(id: &str, name: &str, description: &str, params: ProcessingParams) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            params,
        }
    }
}

fn intro(animation: IntroAnimation) -> String {
    animation.as_str().to_string()
}

fn overlay(color: &str) -> Option<String> {
    Some(color.to_string())
}

/// All built-in templates, in display order.
pub fn templates() -> Vec<Template> {
    vec![
        Template::new(
            "1",
            "Original",
            "Keep the source look, re-encoded only",
            ProcessingParams::default(),
        ),
        Template::new(
            "2",
            "Black & White",
            "Classic monochrome",
            ProcessingParams {
                saturation: 0.0,
                intro_animation: intro(IntroAnimation::None),
                ..Default::default()
            },
        ),
        Template::new(
            "3",
            "Red Tint",
            "Warm red tone",
            ProcessingParams {
                uploaded_audio_volume: 1.3,
                color_overlay: overlay("#ff6b6b"),
                color_overlay_opacity: 0.15,
                intro_animation: intro(IntroAnimation::FadeIn),
                intro_duration: 1.5,
                ..Default::default()
            },
        ),
        Template::new(
            "4",
            "Blue Tint",
            "Cool blue tone",
            ProcessingParams {
                uploaded_audio_volume: 1.2,
                color_overlay: overlay("#4dabf7"),
                color_overlay_opacity: 0.12,
                intro_animation: intro(IntroAnimation::FadeIn),
                intro_duration: 1.5,
                ..Default::default()
            },
        ),
        Template::new(
            "5",
            "Bright & Vibrant",
            "Brighter and livelier",
            ProcessingParams {
                original_audio_volume: 0.6,
                uploaded_audio_volume: 1.6,
                video_speed: 1.2,
                zoom_factor: 1.08,
                intro_animation: intro(IntroAnimation::BlurToClear),
                intro_duration: 1.0,
                ..Default::default()
            },
        ),
        Template::new(
            "6",
            "Dark & Moody",
            "Dark, slower and mysterious",
            ProcessingParams {
                original_audio_volume: 0.4,
                uploaded_audio_volume: 1.4,
                audio_noise: 0.03,
                video_speed: 0.95,
                color_overlay: overlay("#1a1a1a"),
                color_overlay_opacity: 0.25,
                intro_animation: intro(IntroAnimation::BlurToClear),
                intro_duration: 3.0,
                ..Default::default()
            },
        ),
        Template::new(
            "7",
            "Fast & Energetic",
            "Quick cuts and punchy audio",
            ProcessingParams {
                original_audio_volume: 0.5,
                uploaded_audio_volume: 1.7,
                video_speed: 1.3,
                zoom_factor: 1.1,
                color_overlay: overlay("#ffec99"),
                color_overlay_opacity: 0.08,
                intro_animation: intro(IntroAnimation::FadeIn),
                intro_duration: 0.5,
                ..Default::default()
            },
        ),
        Template::new(
            "8",
            "Slow & Smooth",
            "Slowed down and smooth",
            ProcessingParams {
                original_audio_volume: 0.7,
                uploaded_audio_volume: 1.2,
                video_speed: 0.85,
                zoom_factor: 1.05,
                intro_animation: intro(IntroAnimation::BlurToClear),
                intro_duration: 3.5,
                ..Default::default()
            },
        ),
        Template::new(
            "9",
            "Cinematic",
            "Film-style grade",
            ProcessingParams {
                original_audio_volume: 0.5,
                uploaded_audio_volume: 1.5,
                audio_noise: 0.05,
                video_speed: 1.15,
                zoom_factor: 1.05,
                color_overlay: overlay("#1a1a1a"),
                color_overlay_opacity: 0.1,
                intro_animation: intro(IntroAnimation::BlurToClear),
                intro_duration: 2.0,
                ..Default::default()
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_are_valid() {
        for template in templates() {
            assert!(
                template.params.violations().is_empty(),
                "template {} is invalid",
                template.name
            );
        }
    }

    #[test]
    fn test_template_ids_unique() {
        let mut ids: Vec<_> = templates().into_iter().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 9);
    }

    #[test]
    fn test_black_and_white_desaturates() {
        let template = &templates()[1];
        assert_eq!(template.name, "Black & White");
        assert_eq!(template.params.saturation, 0.0);
        assert_eq!(template.params.video_speed, 1.0);
    }
}
