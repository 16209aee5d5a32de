//! Severity display bands
//!
//! The backend computes a 0–100 score and, separately, a category string.
//! Bands are derived locally from the score so the colour is always consistent
//! with the number on screen, even when the category is missing.

use ratatui::style::Color;

use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityBand {
    Low,
    Moderate,
    High,
    Critical,
}

impl SeverityBand {
    /// Lower bound (inclusive) of each band, highest first
    const THRESHOLDS: [(f64, SeverityBand); 3] = [
        (85.0, SeverityBand::Critical),
        (70.0, SeverityBand::High),
        (50.0, SeverityBand::Moderate),
    ];

    /// Bucket a score. Out-of-range scores are clamped to [0, 100]; NaN has no band.
    pub fn from_score(score: f64) -> Option<Self> {
        if score.is_nan() {
            return None;
        }
        let score = score.clamp(0.0, 100.0);
        let band = Self::THRESHOLDS
            .iter()
            .find(|(min, _)| score >= *min)
            .map(|(_, band)| *band)
            .unwrap_or(SeverityBand::Low);
        Some(band)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SeverityBand::Low => "Low",
            SeverityBand::Moderate => "Moderate",
            SeverityBand::High => "High",
            SeverityBand::Critical => "Critical",
        }
    }

    pub fn color(&self, theme: &Theme) -> Color {
        match self {
            SeverityBand::Low => theme.success,
            SeverityBand::Moderate => theme.caution,
            SeverityBand::High => theme.warning,
            SeverityBand::Critical => theme.danger,
        }
    }
}

/// Category string as assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeverityCategory {
    Catastrophic,
    High,
    Medium,
    Low,
    Other(String),
}

impl SeverityCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "catastrophic" => SeverityCategory::Catastrophic,
            "high" => SeverityCategory::High,
            "medium" => SeverityCategory::Medium,
            "low" => SeverityCategory::Low,
            _ => SeverityCategory::Other(raw.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SeverityCategory::Catastrophic => "Catastrophic",
            SeverityCategory::High => "High",
            SeverityCategory::Medium => "Medium",
            SeverityCategory::Low => "Low",
            SeverityCategory::Other(s) => s,
        }
    }

    pub fn color(&self, theme: &Theme) -> Color {
        match self {
            SeverityCategory::Catastrophic => theme.danger,
            SeverityCategory::High => theme.warning,
            SeverityCategory::Medium => theme.caution,
            SeverityCategory::Low => theme.success,
            SeverityCategory::Other(_) => theme.text_dim,
        }
    }
}

/// "78.5%" or "78%" for whole numbers
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.0}%", score)
    } else {
        format!("{:.1}%", score)
    }
}
