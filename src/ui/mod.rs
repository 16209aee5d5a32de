mod components;

use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::api::{ApiError, HealthStatus, HistoryItem, LearningStats};
use crate::app::{App, FeedbackState, HistoryTab, Page, Popup, Request, EXAMPLE_TEXTS};
use crate::severity::{format_score, SeverityBand};
use crate::theme::Theme;

use components::result_lines;

// Set once at startup from config; falls back to the default palette
static THEME: OnceLock<Theme> = OnceLock::new();

pub fn init_theme(theme: Theme) {
    let _ = THEME.set(theme);
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Length(1), // Page tabs
            Constraint::Min(6),    // Page body
            Constraint::Length(1), // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    draw_tabs(f, app, chunks[1]);
    match app.page {
        Page::Home => draw_home(f, app, chunks[2]),
        Page::Text => draw_text_page(f, app, chunks[2]),
        Page::Image => draw_image_page(f, app, chunks[2]),
        Page::Map => draw_map_page(f, app, chunks[2]),
        Page::History => draw_history_page(f, app, chunks[2]),
        Page::Learning => draw_learning_page(f, app, chunks[2]),
    }
    draw_footer(f, app, chunks[3]);

    // Draw popups on top
    match app.popup {
        Popup::None => {}
        Popup::Help => draw_help_popup(f),
        Popup::ConfirmRetrain => draw_confirm_popup(f, app),
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    // Priority: status message > backend health > base URL
    let line = if let Some(ref msg) = app.status_message {
        Line::from(vec![
            Span::styled(" 󰋼 ", Style::default().fg(warning())),
            Span::styled(msg.clone(), Style::default().fg(warning())),
        ])
    } else {
        let (label, color) = health_summary(&app.home.health);
        Line::from(vec![
            Span::styled(" disasterscope ", Style::default().fg(accent()).add_modifier(Modifier::BOLD)),
            Span::styled("│ ", Style::default().fg(inactive())),
            Span::styled(app.api().base_url().to_string(), Style::default().fg(text_dim())),
            Span::styled(" │ ", Style::default().fg(inactive())),
            Span::styled(label, Style::default().fg(color)),
        ])
    };

    f.render_widget(Paragraph::new(line), area);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let spans: Vec<Span> = Page::ALL
        .iter()
        .enumerate()
        .flat_map(|(i, page)| {
            let style = if *page == app.page {
                Style::default().fg(accent()).bg(bg_selected()).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(text_dim())
            };
            vec![
                Span::styled(format!(" F{} {} ", i + 1, page.title()), style),
                Span::styled(" ", Style::default()),
            ]
        })
        .collect();

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Bordered box, highlighted while its input has focus
fn boxed(title: String, active: bool) -> Block<'static> {
    let border_color = if active { accent() } else { inactive() };
    let title_style = if active {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(text())
    };

    Block::default()
        .title(Span::styled(title, title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
}

fn health_summary(health: &Request<HealthStatus>) -> (&'static str, Color) {
    match health {
        Request::Ready(_) => ("● Online", success()),
        Request::Failed(ApiError::Network { .. }) => ("● Network error", danger()),
        Request::Failed(ApiError::Server { .. }) => ("● Server error", warning()),
        Request::Failed(_) => ("● Unexpected response", warning()),
        Request::Idle | Request::Loading => ("○ Checking...", text_dim()),
    }
}

fn error_lines(err: &ApiError, action: &str) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled("✖ ", Style::default().fg(danger())),
        Span::styled(err.user_message(action), Style::default().fg(danger())),
    ])];
    if err.is_retryable() {
        lines.push(Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("r", Style::default().fg(accent())),
            Span::styled(" to retry", Style::default().fg(text_dim())),
        ]));
    }
    lines
}

fn loading_line(msg: &str) -> Line<'static> {
    Line::from(Span::styled(format!("󰔟 {}", msg), Style::default().fg(accent())))
}

fn input_paragraph<'a>(input: &'a str, placeholder: &'a str, editing: bool) -> Paragraph<'a> {
    let mut spans = if input.is_empty() && !editing {
        vec![Span::styled(placeholder, Style::default().fg(text_dim()))]
    } else {
        vec![Span::styled(input, Style::default().fg(text()))]
    };
    if editing {
        spans.push(Span::styled("█", Style::default().fg(accent())));
    }
    Paragraph::new(Line::from(spans)).wrap(Wrap { trim: false })
}

// ── Home ───────────────────────────────────────────────────────────────────

fn draw_home(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Length(6), Constraint::Min(4)])
        .split(area);

    let (label, color) = health_summary(&app.home.health);
    let mut backend = vec![Line::from(vec![
        Span::styled("  Status: ", Style::default().fg(text_dim())),
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])];
    match &app.home.health {
        Request::Ready(status) => {
            if let Some(s) = &status.status {
                backend.push(Line::from(vec![
                    Span::styled("  Reported: ", Style::default().fg(text_dim())),
                    Span::styled(s.clone(), Style::default().fg(text())),
                ]));
            }
        }
        Request::Failed(err) => backend.push(Line::from(Span::styled(
            format!("  {}", err),
            Style::default().fg(text_dim()),
        ))),
        _ => {}
    }
    f.render_widget(
        Paragraph::new(backend).block(boxed(" Backend ".to_string(), false)),
        chunks[0],
    );

    f.render_widget(
        Paragraph::new(stats_lines(&app.home.stats)).block(boxed(" Learning ".to_string(), false)),
        chunks[1],
    );

    let pages = [
        (Page::Text, "Detect disasters in a written report"),
        (Page::Image, "Detect damage in a photo"),
        (Page::Map, "Geocode disaster reports onto a session map"),
        (Page::History, "Browse past text and image analyses"),
        (Page::Learning, "Feedback totals and model retraining"),
    ];
    let lines: Vec<Line> = pages
        .iter()
        .map(|(page, desc)| {
            Line::from(vec![
                Span::styled(format!("  F{:<3}", page_number(*page)), Style::default().fg(accent())),
                Span::styled(format!("{:<16}", page.title()), Style::default().fg(text())),
                Span::styled(*desc, Style::default().fg(text_dim())),
            ])
        })
        .collect();
    f.render_widget(
        Paragraph::new(lines).block(boxed(" Pages ".to_string(), false)),
        chunks[2],
    );
}

fn page_number(page: Page) -> usize {
    Page::ALL.iter().position(|p| *p == page).map(|i| i + 1).unwrap_or(0)
}

fn stats_lines(stats: &Request<LearningStats>) -> Vec<Line<'static>> {
    match stats {
        Request::Ready(stats) => {
            let retrain = if stats.should_retrain {
                Span::styled("recommended", Style::default().fg(warning()))
            } else {
                Span::styled("not needed", Style::default().fg(success()))
            };
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("  Feedback collected: ", Style::default().fg(text_dim())),
                    Span::styled(stats.total_feedback.to_string(), Style::default().fg(text())),
                ]),
                Line::from(vec![
                    Span::styled("  Training runs:      ", Style::default().fg(text_dim())),
                    Span::styled(stats.training_count.to_string(), Style::default().fg(text())),
                ]),
                Line::from(vec![
                    Span::styled("  Retraining:         ", Style::default().fg(text_dim())),
                    retrain,
                ]),
            ];
            if let Some(last) = stats.extra.get("last_trained").and_then(crate::api::display_value) {
                lines.push(Line::from(vec![
                    Span::styled("  Last trained:       ", Style::default().fg(text_dim())),
                    Span::styled(crate::api::format_timestamp(&last), Style::default().fg(text())),
                ]));
            }
            lines
        }
        Request::Failed(err) => error_lines(err, "load learning stats"),
        Request::Idle | Request::Loading => vec![loading_line("Loading stats...")],
    }
}

// ── Text analysis ──────────────────────────────────────────────────────────

fn draw_text_page(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Length(1), Constraint::Min(4)])
        .split(area);

    let view = &app.text;
    let title = format!(" Report ({} chars) ", view.input.chars().count());
    f.render_widget(
        input_paragraph(&view.input, "Press e to type a report, or 1-3 for an example", app.editing)
            .block(boxed(title, app.editing)),
        chunks[0],
    );

    if let Some(err) = &view.form_error {
        f.render_widget(
            Paragraph::new(Span::styled(format!(" ✖ {}", err), Style::default().fg(danger()))),
            chunks[1],
        );
    }

    let mut lines = match &view.result {
        Request::Idle => example_lines(),
        Request::Loading => vec![loading_line("Analyzing...")],
        Request::Failed(err) => error_lines(err, "analyze text"),
        Request::Ready(result) => result_lines(result, None, theme()),
    };
    if view.result.ready().is_some() {
        lines.push(Line::from(""));
        lines.push(feedback_line(&view.feedback));
    }

    f.render_widget(
        Paragraph::new(lines)
            .block(boxed(" Result ".to_string(), false))
            .wrap(Wrap { trim: false }),
        chunks[2],
    );
}

fn example_lines() -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        "Examples",
        Style::default().fg(header()).add_modifier(Modifier::BOLD),
    ))];
    for (i, example) in EXAMPLE_TEXTS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("  {} ", i + 1), Style::default().fg(accent())),
            Span::styled(example.to_string(), Style::default().fg(text_dim())),
        ]));
    }
    lines
}

fn feedback_line(state: &FeedbackState) -> Line<'static> {
    match state {
        FeedbackState::Available => Line::from(vec![
            Span::styled("Was this right? ", Style::default().fg(text_dim())),
            Span::styled("y", Style::default().fg(accent())),
            Span::styled(" it is a disaster  ", Style::default().fg(text_dim())),
            Span::styled("n", Style::default().fg(accent())),
            Span::styled(" it is not", Style::default().fg(text_dim())),
        ]),
        FeedbackState::Sending => loading_line("Sending feedback..."),
        FeedbackState::Sent(msg) => Line::from(Span::styled(format!("✔ {}", msg), Style::default().fg(success()))),
        FeedbackState::Failed(msg) => Line::from(vec![
            Span::styled(format!("✖ {} ", msg), Style::default().fg(danger())),
            Span::styled("(y/n to resend)", Style::default().fg(text_dim())),
        ]),
    }
}

// ── Image analysis ─────────────────────────────────────────────────────────

fn draw_image_page(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(4),
        ])
        .split(area);

    let view = &app.image;
    f.render_widget(
        input_paragraph(&view.path_input, "Press e to enter an image path (JPG, PNG, WebP up to 10MB)", app.editing)
            .block(boxed(" Image path ".to_string(), app.editing)),
        chunks[0],
    );

    let summary = if view.selecting {
        vec![loading_line("Checking file...")]
    } else if let Some(err) = &view.form_error {
        vec![Line::from(Span::styled(format!("✖ {}", err), Style::default().fg(danger())))]
    } else if let Some(upload) = &view.selected {
        vec![
            Line::from(vec![
                Span::styled("  File: ", Style::default().fg(text_dim())),
                Span::styled(upload.file_name().to_string(), Style::default().fg(text())),
                Span::styled(format!("  ({})", upload.mime()), Style::default().fg(text_dim())),
            ]),
            Line::from(vec![
                Span::styled("  Size: ", Style::default().fg(text_dim())),
                Span::styled(format!("{} MB", upload.size_mb()), Style::default().fg(text())),
            ]),
        ]
    } else {
        vec![Line::from(Span::styled("  No image selected", Style::default().fg(text_dim())))]
    };
    f.render_widget(
        Paragraph::new(summary).block(boxed(" Selected ".to_string(), false)),
        chunks[1],
    );

    let lines = match &view.result {
        Request::Idle => vec![Line::from(Span::styled(
            "Select an image, then press Enter to analyze",
            Style::default().fg(text_dim()),
        ))],
        Request::Loading => vec![loading_line("Analyzing image...")],
        Request::Failed(err) => error_lines(err, "analyze image"),
        Request::Ready(result) => {
            let link = result.image_url.as_deref().map(|u| app.api().asset_url(u));
            result_lines(result, link.as_deref(), theme())
        }
    };
    f.render_widget(
        Paragraph::new(lines)
            .block(boxed(" Result ".to_string(), false))
            .wrap(Wrap { trim: false }),
        chunks[2],
    );
}

// ── Map ────────────────────────────────────────────────────────────────────

fn draw_map_page(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(5),
        ])
        .split(area);

    let view = &app.map;
    f.render_widget(
        input_paragraph(&view.input, "Press e to describe an event, e.g. \"Flooding in Chennai\"", app.editing)
            .block(boxed(" Report ".to_string(), app.editing)),
        chunks[0],
    );

    let status = if view.loading {
        loading_line("Locating...")
    } else if let Some(msg) = &view.message {
        Line::from(Span::styled(format!(" {}", msg), Style::default().fg(warning())))
    } else {
        Line::from("")
    };
    f.render_widget(Paragraph::new(status), chunks[1]);

    let rows: Vec<Row> = view
        .pins
        .iter()
        .enumerate()
        .map(|(i, pin)| {
            let style = if i == view.selected {
                Style::default().fg(text()).bg(bg_selected())
            } else {
                Style::default().fg(text())
            };
            Row::new(vec![
                pin.location.clone(),
                pin.disaster_type.clone().unwrap_or_else(|| "Unknown".to_string()),
                pin.confidence
                    .map(|c| format!("{:.1}%", c * 100.0))
                    .unwrap_or_else(|| "-".to_string()),
                format!("{:.4}, {:.4}", pin.lat, pin.lng),
                pin.timestamp.clone(),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(25),
            Constraint::Percentage(15),
            Constraint::Length(11),
            Constraint::Length(20),
            Constraint::Min(19),
        ],
    )
    .header(
        Row::new(vec!["Location", "Type", "Confidence", "Coordinates", "Added"])
            .style(Style::default().fg(header()).add_modifier(Modifier::BOLD)),
    )
    .block(boxed(format!(" Pins ({}) ", view.pins.len()), false));
    f.render_widget(table, chunks[2]);

    let detail = match view.pins.get(view.selected) {
        Some(pin) => vec![
            Line::from(vec![
                Span::styled("  Address: ", Style::default().fg(text_dim())),
                Span::styled(
                    pin.address.clone().unwrap_or_else(|| pin.location.clone()),
                    Style::default().fg(text()),
                ),
            ]),
            Line::from(vec![
                Span::styled("  Report:  ", Style::default().fg(text_dim())),
                Span::styled(pin.text.clone(), Style::default().fg(text())),
            ]),
        ],
        None => vec![Line::from(Span::styled(
            "  Pins added this session appear here",
            Style::default().fg(text_dim()),
        ))],
    };
    f.render_widget(
        Paragraph::new(detail)
            .block(boxed(" Selected pin ".to_string(), false))
            .wrap(Wrap { trim: true }),
        chunks[3],
    );
}

// ── History ────────────────────────────────────────────────────────────────

fn draw_history_page(f: &mut Frame, app: &App, area: Rect) {
    let view = &app.history;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(4)])
        .split(area);

    let tab = |label: &str, count: usize, active: bool| {
        let style = if active {
            Style::default().fg(accent()).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(text_dim())
        };
        Span::styled(format!(" {} ({}) ", label, count), style)
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            tab("Text", view.text_rows.len(), view.tab == HistoryTab::Text),
            Span::styled("│", Style::default().fg(inactive())),
            tab("Image", view.image_rows.len(), view.tab == HistoryTab::Image),
        ])),
        chunks[0],
    );

    let block = boxed(" History ".to_string(), false);
    if view.loading {
        f.render_widget(Paragraph::new(loading_line("Loading history...")).block(block), chunks[1]);
        return;
    }
    if let Some(err) = &view.error {
        let lines = vec![
            Line::from(Span::styled(format!("✖ {}", err), Style::default().fg(danger()))),
            Line::from(vec![
                Span::styled("  Press ", Style::default().fg(text_dim())),
                Span::styled("r", Style::default().fg(accent())),
                Span::styled(" to retry", Style::default().fg(text_dim())),
            ]),
        ];
        f.render_widget(Paragraph::new(lines).block(block), chunks[1]);
        return;
    }
    if view.rows().is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled("No analyses yet", Style::default().fg(text_dim()))).block(block),
            chunks[1],
        );
        return;
    }

    let rows: Vec<Row> = view
        .rows()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let style = if i == view.selected {
                Style::default().fg(text()).bg(bg_selected())
            } else {
                Style::default().fg(text())
            };
            history_row(item, view.tab, app).style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(22),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Min(20),
        ],
    )
    .header(
        Row::new(vec!["ID", "When", "Result", "Severity", "Source"])
            .style(Style::default().fg(header()).add_modifier(Modifier::BOLD)),
    )
    .block(block);
    f.render_widget(table, chunks[1]);
}

fn history_row(item: &HistoryItem, tab: HistoryTab, app: &App) -> Row<'static> {
    let result = &item.result;
    let outcome = if result.disaster_detected {
        Span::styled(
            result.disaster_type.clone().unwrap_or_else(|| "Disaster".to_string()),
            Style::default().fg(danger()),
        )
    } else {
        Span::styled("Not a disaster", Style::default().fg(success()))
    };

    // Only detected rows with a score get a severity
    let severity = match result.effective_severity().and_then(|s| SeverityBand::from_score(s).map(|b| (s, b))) {
        Some((score, band)) => Span::styled(
            format!("{} {}", format_score(score), band.label()),
            Style::default().fg(band.color(theme())),
        ),
        None => Span::raw(""),
    };

    let source = match tab {
        HistoryTab::Text => result.text.clone().unwrap_or_default(),
        HistoryTab::Image => result
            .image_url
            .as_deref()
            .map(|u| app.api().asset_url(u))
            .unwrap_or_default(),
    };

    Row::new(vec![
        Line::from(item.display_id().map(|id| id.to_string()).unwrap_or_default()),
        Line::from(item.created_at_display().unwrap_or_default()),
        Line::from(outcome),
        Line::from(severity),
        Line::from(source),
    ])
}

// ── Learning ───────────────────────────────────────────────────────────────

fn draw_learning_page(f: &mut Frame, app: &App, area: Rect) {
    let view = &app.learning;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Length(4), Constraint::Min(4)])
        .split(area);

    f.render_widget(
        Paragraph::new(stats_lines(&view.stats)).block(boxed(" Stats ".to_string(), false)),
        chunks[0],
    );

    let force = if view.force {
        Span::styled("on", Style::default().fg(warning()).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("off", Style::default().fg(text_dim()))
    };
    let mut retrain = vec![Line::from(vec![
        Span::styled("  Force: ", Style::default().fg(text_dim())),
        force,
    ])];
    retrain.push(match &view.retrain {
        Request::Idle => Line::from(Span::styled("  Press t to retrain", Style::default().fg(text_dim()))),
        Request::Loading => loading_line("Requesting retraining..."),
        Request::Ready(status) => Line::from(Span::styled(
            format!(
                "  ✔ {}",
                status.message.clone().or_else(|| status.status.clone()).unwrap_or_default()
            ),
            Style::default().fg(success()),
        )),
        Request::Failed(err) => Line::from(Span::styled(
            format!("  ✖ {}", err.user_message("start retraining")),
            Style::default().fg(danger()),
        )),
    });
    f.render_widget(
        Paragraph::new(retrain).block(boxed(" Retraining ".to_string(), false)),
        chunks[1],
    );

    match &view.recent {
        Request::Ready(entries) => {
            let rows: Vec<Row> = entries
                .iter()
                .map(|entry| {
                    let label = match entry.is_disaster {
                        Some(true) => Span::styled("Disaster", Style::default().fg(danger())),
                        Some(false) => Span::styled("Not disaster", Style::default().fg(success())),
                        None => Span::styled("?", Style::default().fg(text_dim())),
                    };
                    Row::new(vec![
                        Line::from(label),
                        Line::from(entry.created_at.as_deref().map(crate::api::format_timestamp).unwrap_or_default()),
                        Line::from(entry.user_id.clone().unwrap_or_default()),
                        Line::from(entry.text.clone()),
                    ])
                })
                .collect();
            let table = Table::new(
                rows,
                [
                    Constraint::Length(13),
                    Constraint::Length(22),
                    Constraint::Length(12),
                    Constraint::Min(20),
                ],
            )
            .header(
                Row::new(vec!["Label", "When", "User", "Text"])
                    .style(Style::default().fg(header()).add_modifier(Modifier::BOLD)),
            )
            .block(boxed(format!(" Recent feedback ({}) ", entries.len()), false));
            f.render_widget(table, chunks[2]);
        }
        other => {
            let lines = match other {
                Request::Failed(err) => error_lines(err, "load recent feedback"),
                _ => vec![loading_line("Loading feedback...")],
            };
            f.render_widget(
                Paragraph::new(lines).block(boxed(" Recent feedback ".to_string(), false)),
                chunks[2],
            );
        }
    }
}

// ── Chrome ─────────────────────────────────────────────────────────────────

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hints: Vec<(&str, &str)> = if app.editing {
        vec![("Enter", "Submit"), ("Esc", "Stop editing"), ("Ctrl-u", "Clear")]
    } else {
        match app.page {
            Page::Home => vec![("r", "Refresh"), ("Tab", "Next"), ("h", "Help"), ("q", "Quit")],
            Page::Text => vec![
                ("e", "Edit"),
                ("1-3", "Example"),
                ("Enter", "Analyze"),
                ("y/n", "Feedback"),
                ("c", "Clear"),
                ("Tab", "Next"),
            ],
            Page::Image => vec![("e", "Path"), ("Enter", "Analyze"), ("c", "Clear"), ("Tab", "Next"), ("h", "Help")],
            Page::Map => vec![("e", "Edit"), ("Enter", "Locate"), ("↑↓", "Pins"), ("c", "Clear"), ("Tab", "Next")],
            Page::History => vec![("←→", "Text/Image"), ("↑↓", "Nav"), ("r", "Reload"), ("Tab", "Next")],
            Page::Learning => vec![("t", "Retrain"), ("f", "Force"), ("r", "Refresh"), ("Tab", "Next")],
        }
    };

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 80 { 5 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans))
        .alignment(Alignment::Center);

    f.render_widget(footer, area);
}

fn help_key(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), Style::default().fg(accent())),
        Span::raw(desc),
    ])
}

fn help_section(title: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        format!("═══ {} ═══", title),
        Style::default().fg(header()).add_modifier(Modifier::BOLD),
    ))
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 70 },
        if area.height < 40 { 95 } else { 85 },
        area
    );

    f.render_widget(Clear, popup_area);

    let help_text = vec![
        help_section("Navigation"),
        help_key("Tab", "Next page (Shift-Tab for previous)"),
        help_key("F1-F6", "Jump to a page"),
        help_key("↑/↓ j/k", "Move in lists"),
        help_key("q", "Quit"),
        Line::from(""),
        help_section("Input"),
        help_key("e / i", "Edit the page's input field"),
        help_key("Enter", "Submit (while editing or not)"),
        help_key("Esc", "Stop editing"),
        Line::from(""),
        help_section("Text Analysis"),
        help_key("1 2 3", "Load an example report"),
        help_key("y", "Feedback: this is a disaster"),
        help_key("n", "Feedback: this is not a disaster"),
        help_key("r", "Retry after an error"),
        Line::from(vec![Span::raw("            Feedback is sent once per result")]),
        Line::from(""),
        help_section("Image Analysis"),
        help_key("e", "Type a path; Enter checks the file"),
        help_key("Enter", "Upload the selected image"),
        Line::from(""),
        help_section("Map / History"),
        help_key("c", "Clear the session's pins"),
        help_key("←/→ t", "Switch between text and image history"),
        help_key("r", "Reload history"),
        Line::from(""),
        help_section("Learning"),
        help_key("t", "Trigger retraining (asks first)"),
        help_key("f", "Toggle force retraining"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("h", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" 󰋖 disasterscope Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn draw_confirm_popup(f: &mut Frame, app: &App) {
    let popup_area = centered_rect(40, 20, f.area());

    f.render_widget(Clear, popup_area);

    let message = if app.learning.force {
        "Force retraining now?"
    } else {
        "Retrain the model now?"
    };

    let confirm = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(warning()))),
        Line::from(""),
        Line::from(vec![
            Span::styled("  y", Style::default().fg(success()).add_modifier(Modifier::BOLD)),
            Span::raw(" Yes   "),
            Span::styled("n", Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
            Span::raw(" No"),
        ]),
    ])
    .block(
        Block::default()
            .title(Span::styled(" Confirm ", Style::default().fg(warning())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(warning())),
    )
    .alignment(Alignment::Center);

    f.render_widget(confirm, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::config::AppConfig;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn offline_app() -> App {
        let client = ApiClient::new("http://127.0.0.1:9/api", None).unwrap();
        App::new(AppConfig::default(), client)
    }

    #[tokio::test]
    async fn test_every_page_renders() {
        let mut app = offline_app();
        for page in Page::ALL {
            app.page = page;
            let screen = render(&app);
            assert!(screen.contains(page.title()), "{:?} tab missing", page);
        }
    }

    #[tokio::test]
    async fn test_history_error_banner() {
        let mut app = offline_app();
        app.page = Page::History;
        app.history.error = Some("Failed to load history. Please try again.".to_string());
        let screen = render(&app);
        assert!(screen.contains("Failed to load history. Please try again."));
        assert!(screen.contains("to retry"));
    }

    #[tokio::test]
    async fn test_health_summary_variants() {
        let offline: Request<HealthStatus> = Request::Failed(ApiError::Network {
            message: "refused".into(),
            timed_out: false,
        });
        assert_eq!(health_summary(&offline).0, "● Network error");

        let broken: Request<HealthStatus> = Request::Failed(ApiError::Server { status: 502, detail: None });
        assert_eq!(health_summary(&broken).0, "● Server error");

        let missing: Request<HealthStatus> = Request::Failed(ApiError::Request { status: 404, detail: None });
        assert_eq!(health_summary(&missing).0, "● Unexpected response");

        let garbled: Request<HealthStatus> = Request::Failed(ApiError::Decode { message: "expected value".into() });
        assert_eq!(health_summary(&garbled).0, "● Unexpected response");

        assert_eq!(health_summary(&Request::Ready(HealthStatus::default())).0, "● Online");
        assert_eq!(health_summary(&Request::Loading).0, "○ Checking...");
    }
}
