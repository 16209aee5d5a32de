//! Terminal colours
//!
//! Defaults follow the severity palette of the web dashboard (green, yellow,
//! orange, red). Any colour can be overridden from the `[theme]` table in
//! config.toml.

use ratatui::style::Color;

use crate::config::ThemeConfig;

/// Theme colors for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,       // Active borders, selected tab
    pub success: Color,      // Low severity, online status
    pub caution: Color,      // Moderate severity
    pub warning: Color,      // High severity, status messages
    pub danger: Color,       // Critical severity, errors
    pub text: Color,
    pub text_dim: Color,
    pub bg_selected: Color,
    pub inactive: Color,     // Inactive borders
    pub header: Color,       // Section and table headers
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(96, 165, 250),
            success: Color::Rgb(74, 222, 128),
            caution: Color::Rgb(250, 204, 21),
            warning: Color::Rgb(251, 146, 60),
            danger: Color::Rgb(248, 113, 113),
            text: Color::Rgb(229, 231, 235),
            text_dim: Color::Rgb(156, 163, 175),
            bg_selected: Color::Rgb(55, 65, 81),
            inactive: Color::Rgb(75, 85, 99),
            header: Color::Rgb(192, 132, 252),
        }
    }
}

impl Theme {
    /// Defaults with any valid overrides from config applied
    pub fn from_config(config: &ThemeConfig) -> Self {
        let mut theme = Self::default();

        let overrides = [
            ("accent", &config.accent, &mut theme.accent),
            ("success", &config.success, &mut theme.success),
            ("caution", &config.caution, &mut theme.caution),
            ("warning", &config.warning, &mut theme.warning),
            ("danger", &config.danger, &mut theme.danger),
            ("text", &config.text, &mut theme.text),
            ("text_dim", &config.text_dim, &mut theme.text_dim),
        ];

        for (name, value, slot) in overrides {
            if let Some(raw) = value {
                match Self::parse_hex_color(raw) {
                    Some(color) => *slot = color,
                    None => tracing::warn!("Ignoring invalid theme colour {} = {:?}", name, raw),
                }
            }
        }

        theme
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}
