//! Result card rendering
//!
//! Builds styled lines for an analysis result without touching the frame, so
//! what appears on screen can be checked in tests.

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

use crate::api::{AnalysisResult, Detection, GeographicInfo, TemporalInfo};
use crate::severity::{format_score, SeverityBand, SeverityCategory};
use crate::theme::Theme;

const LABEL_WIDTH: usize = 12;

fn label(name: &str, theme: &Theme) -> Span<'static> {
    Span::styled(
        format!("  {:<width$}", format!("{}:", name), width = LABEL_WIDTH),
        Style::default().fg(theme.text_dim),
    )
}

fn value(text: impl Into<String>, theme: &Theme) -> Span<'static> {
    Span::styled(text.into(), Style::default().fg(theme.text))
}

fn section(title: &str, theme: &Theme) -> Line<'static> {
    Line::from(Span::styled(
        format!("─── {} ───", title),
        Style::default().fg(theme.header).add_modifier(Modifier::BOLD),
    ))
}

/// Lines for one analysis. `image_link` is the already-resolved image URL.
///
/// A negative result is just the header and id.
pub fn result_lines(result: &AnalysisResult, image_link: Option<&str>, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (icon, title, color) = if result.disaster_detected {
        ("⚠", "Disaster Detected", theme.danger)
    } else {
        ("✔", "No Disaster Detected", theme.success)
    };
    lines.push(Line::from(vec![
        Span::styled(format!("{} ", icon), Style::default().fg(color)),
        Span::styled(title, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ]));

    if let Some(id) = &result.analysis_id {
        lines.push(Line::from(vec![label("Analysis ID", theme), value(id.to_string(), theme)]));
    }

    if !result.disaster_detected {
        return lines;
    }

    if let Some(confidence) = result.confidence_score {
        lines.push(Line::from(vec![
            label("Confidence", theme),
            value(format!("{:.1}%", confidence * 100.0), theme),
        ]));
    }

    if let Some(kind) = &result.disaster_type {
        lines.push(Line::from(vec![
            label("Type", theme),
            Span::styled(kind.clone(), Style::default().fg(theme.text).add_modifier(Modifier::BOLD)),
        ]));
    }

    if let Some(line) = severity_line(result, theme) {
        lines.push(line);
    }

    if let Some(details) = &result.extracted_details {
        let entries = details.entries();
        if !entries.is_empty() {
            lines.push(Line::from(""));
            lines.push(section("Extracted Details", theme));
            for (name, text) in entries {
                lines.push(Line::from(vec![label(&name, theme), value(text, theme)]));
            }
        }
    }

    if let Some(temporal) = &result.temporal_info {
        lines.push(Line::from(""));
        lines.push(section("Time", theme));
        lines.extend(temporal_lines(temporal, theme));
    }

    if let Some(geo) = &result.geographic_info {
        lines.push(Line::from(""));
        lines.push(section("Location", theme));
        lines.extend(geographic_lines(geo, theme));
    }

    if let Some(detections) = result.detections.as_ref().filter(|d| !d.is_empty()) {
        lines.push(Line::from(""));
        lines.push(section("Detections", theme));
        lines.extend(detections.iter().map(|d| detection_line(d, theme)));
    }

    if let Some(link) = image_link {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            label("Image", theme),
            Span::styled(link.to_string(), Style::default().fg(theme.accent)),
        ]));
    }

    lines
}

fn severity_line(result: &AnalysisResult, theme: &Theme) -> Option<Line<'static>> {
    let score = result.effective_severity();
    let category = result.severity_category.as_deref().map(SeverityCategory::parse);
    if score.is_none() && category.is_none() {
        return None;
    }

    let mut spans = vec![label("Severity", theme)];
    if let Some(score) = score {
        match SeverityBand::from_score(score) {
            Some(band) => {
                let color = band.color(theme);
                spans.push(Span::styled(
                    format_score(score),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::styled(format!(" ({})", band.label()), Style::default().fg(color)));
            }
            None => spans.push(value("Unknown", theme)),
        }
    }
    if let Some(category) = category {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{}]", category.label()),
            Style::default().fg(category.color(theme)),
        ));
    }
    Some(Line::from(spans))
}

fn temporal_lines(info: &TemporalInfo, theme: &Theme) -> Vec<Line<'static>> {
    [
        ("Day", &info.day),
        ("Date", &info.date),
        ("Month", &info.month),
        ("Year", &info.year),
    ]
    .into_iter()
    .map(|(name, part)| {
        Line::from(vec![
            label(name, theme),
            value(part.clone().unwrap_or_else(|| "Unknown".to_string()), theme),
        ])
    })
    .collect()
}

fn geographic_lines(geo: &GeographicInfo, theme: &Theme) -> Vec<Line<'static>> {
    let unknown = || "Unknown".to_string();
    let mut lines = vec![
        Line::from(vec![label("City", theme), value(geo.city.clone().unwrap_or_else(unknown), theme)]),
        Line::from(vec![
            label("Country", theme),
            value(geo.country.clone().unwrap_or_else(unknown), theme),
        ]),
    ];

    if let Some((lat, lng)) = geo.coordinates() {
        let mut spans = vec![label("Coordinates", theme), value(format!("{:.4}, {:.4}", lat, lng), theme)];
        if let Some(accuracy) = &geo.accuracy {
            spans.push(Span::styled(
                format!(" ({} accuracy)", accuracy),
                Style::default().fg(theme.text_dim),
            ));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn detection_line(detection: &Detection, theme: &Theme) -> Line<'static> {
    let mut spans = vec![
        Span::styled("  • ", Style::default().fg(theme.text_dim)),
        value(detection.class_name.replace('_', " "), theme),
    ];
    if detection.count > 1 {
        spans.push(Span::styled(
            format!(" ({} detected)", detection.count),
            Style::default().fg(theme.text_dim),
        ));
    }
    if let Some(confidence) = detection.confidence {
        spans.push(Span::styled(
            format!("  {:.1}%", confidence * 100.0),
            Style::default().fg(theme.accent),
        ));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AnalysisId, ExtractedDetails};
    use serde_json::json;

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect()
    }

    fn detected() -> AnalysisResult {
        serde_json::from_value(json!({
            "analysis_id": 7,
            "disaster_detected": true,
            "disaster_type": "Flood",
            "confidence_score": 0.876,
            "severity_score": 84.0,
            "severity_category": "High",
            "extracted_details": {"deaths": 3, "injuries": null, "evacuated": "thousands"},
            "temporal_info": {"day": "Monday", "year": 2024},
            "geographic_info": {"city": "Mumbai", "country": "India", "latitude": 19.076, "longitude": 72.8777, "accuracy": "city"}
        }))
        .unwrap()
    }

    #[test]
    fn test_negative_result_is_header_only() {
        let result = AnalysisResult {
            analysis_id: Some(AnalysisId::Number(2)),
            disaster_detected: false,
            disaster_type: Some("Flood".into()),
            severity_score: Some(91.0),
            severity_category: Some("Catastrophic".into()),
            geographic_info: Some(GeographicInfo {
                city: Some("Paris".into()),
                ..Default::default()
            }),
            extracted_details: Some(ExtractedDetails::default()),
            ..Default::default()
        };

        let text = plain(&result_lines(&result, Some("http://x/img.jpg"), &Theme::default()));
        assert_eq!(text.len(), 2);
        assert!(text[0].contains("No Disaster Detected"));
        assert!(text[1].contains("Analysis ID:"));
        for line in &text {
            assert!(!line.contains("Severity"));
            assert!(!line.contains("Type"));
            assert!(!line.contains("Paris"));
            assert!(!line.contains("Image"));
        }
    }

    #[test]
    fn test_detected_result_lines() {
        let text = plain(&result_lines(&detected(), None, &Theme::default())).join("\n");

        assert!(text.contains("Disaster Detected"));
        assert!(text.contains("87.6%"));
        assert!(text.contains("Flood"));
        assert!(text.contains("84% (High)"));
        assert!(text.contains("[High]"));
        assert!(text.contains("Deaths:"));
        assert!(!text.contains("Injuries"));
        assert!(text.contains("Evacuated:"));
        assert!(text.contains("Monday"));
        assert!(text.contains("Date:       Unknown"));
        assert!(text.contains("19.0760, 72.8777 (city accuracy)"));
    }

    #[test]
    fn test_severity_colour_follows_band() {
        let theme = Theme::default();
        let lines = result_lines(&detected(), None, &theme);
        let score_span = lines
            .iter()
            .flat_map(|l| l.spans.iter())
            .find(|s| s.content == "84%")
            .unwrap();
        assert_eq!(score_span.style.fg, Some(theme.warning));
    }

    #[test]
    fn test_detections_and_image() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "disaster_detected": true,
            "detections": [
                {"class": "collapsed_building", "count": 4, "confidence": 0.87},
                {"class": "person", "confidence": 0.64}
            ]
        }))
        .unwrap();

        let text = plain(&result_lines(&result, Some("http://localhost:8000/uploads/a.jpg"), &Theme::default()));
        assert!(text.iter().any(|l| l.contains("collapsed building (4 detected)  87.0%")));
        assert!(text.iter().any(|l| l.contains("person") && !l.contains("detected")));
        assert!(text.iter().any(|l| l.contains("http://localhost:8000/uploads/a.jpg")));
    }
}
