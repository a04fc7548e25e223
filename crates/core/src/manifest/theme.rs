use serde::{Deserialize, Serialize};

use crate::render::Color;

/// Six-color palette attached to every track.
///
/// Deserialization never fails on bad colors: each missing or malformed value
/// falls back to the matching entry of [`ColorTheme::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTheme", into = "RawTheme")]
pub struct ColorTheme {
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub muted: Color,
    pub dark: Color,
    pub light: Color,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            primary: Color::rgb(0x1d, 0xb9, 0x54),
            secondary: Color::rgb(0x19, 0x14, 0x14),
            accent: Color::rgb(0x1e, 0xd7, 0x60),
            muted: Color::rgb(0x53, 0x53, 0x53),
            dark: Color::rgb(0x12, 0x12, 0x12),
            light: Color::rgb(0xff, 0xff, 0xff),
        }
    }
}

impl ColorTheme {
    /// Styling variables pushed to presentation layers, in a fixed order.
    pub fn style_variables(&self) -> [(&'static str, String); 6] {
        [
            ("--color-primary", self.primary.to_hex()),
            ("--color-secondary", self.secondary.to_hex()),
            ("--color-accent", self.accent.to_hex()),
            ("--color-muted", self.muted.to_hex()),
            ("--color-dark", self.dark.to_hex()),
            ("--color-light", self.light.to_hex()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawTheme {
    primary: Option<String>,
    secondary: Option<String>,
    accent: Option<String>,
    muted: Option<String>,
    dark: Option<String>,
    light: Option<String>,
}

impl From<RawTheme> for ColorTheme {
    fn from(raw: RawTheme) -> Self {
        let fallback = ColorTheme::default();
        let pick = |name: &str, value: Option<String>, default: Color| match value {
            Some(hex) => Color::parse_hex(&hex).unwrap_or_else(|| {
                tracing::warn!(color = name, value = %hex, "invalid theme color, using default");
                default
            }),
            None => default,
        };

        Self {
            primary: pick("primary", raw.primary, fallback.primary),
            secondary: pick("secondary", raw.secondary, fallback.secondary),
            accent: pick("accent", raw.accent, fallback.accent),
            muted: pick("muted", raw.muted, fallback.muted),
            dark: pick("dark", raw.dark, fallback.dark),
            light: pick("light", raw.light, fallback.light),
        }
    }
}

impl From<ColorTheme> for RawTheme {
    fn from(theme: ColorTheme) -> Self {
        Self {
            primary: Some(theme.primary.to_hex()),
            secondary: Some(theme.secondary.to_hex()),
            accent: Some(theme.accent.to_hex()),
            muted: Some(theme.muted.to_hex()),
            dark: Some(theme.dark.to_hex()),
            light: Some(theme.light.to_hex()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_colors_fall_back_per_entry() {
        let theme: ColorTheme = serde_json::from_str(
            r##"{ "primary": "#ff0000", "accent": "red", "light": null }"##,
        )
        .unwrap();

        let fallback = ColorTheme::default();
        assert_eq!(theme.primary, Color::rgb(255, 0, 0));
        assert_eq!(theme.accent, fallback.accent);
        assert_eq!(theme.light, fallback.light);
        assert_eq!(theme.dark, fallback.dark);
    }

    #[test]
    fn exposes_six_style_variables() {
        let vars = ColorTheme::default().style_variables();
        assert_eq!(vars[0], ("--color-primary", "#1db954".to_string()));
        assert_eq!(vars[5].0, "--color-light");
    }
}
