use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::api::{
    AnalysisResult, ApiClient, ApiError, FeedbackEntry, FeedbackReceipt, HealthStatus, HistoryItem,
    HistoryPage, ImageUpload, LearningStats, LocationResult, RetrainStatus, ValidationError,
};
use crate::config::AppConfig;

/// Seconds a status message stays in the info line
const STATUS_SECONDS: u64 = 3;

/// Canned reports for the text page, loaded with 1/2/3
pub const EXAMPLE_TEXTS: [&str; 3] = [
    "A strong earthquake struck the area between Hama and Aleppo, causing several buildings to collapse and injuring multiple people.",
    "A massive wildfire is burning in California, killing 15 people and destroying over 200 homes. The fire started yesterday afternoon around 3 PM.",
    "Severe flooding hit Mumbai today, with water levels reaching 2 meters in some areas. Roads are damaged and thousands of people have been evacuated.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Text,
    Image,
    Map,
    History,
    Learning,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Home,
        Page::Text,
        Page::Image,
        Page::Map,
        Page::History,
        Page::Learning,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Text => "Text Analysis",
            Page::Image => "Image Analysis",
            Page::Map => "Disaster Map",
            Page::History => "History",
            Page::Learning => "Learning",
        }
    }

    fn index(&self) -> usize {
        Page::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    fn next(&self) -> Page {
        Page::ALL[(self.index() + 1) % Page::ALL.len()]
    }

    fn prev(&self) -> Page {
        Page::ALL[(self.index() + Page::ALL.len() - 1) % Page::ALL.len()]
    }

    /// Pages with a text input field
    pub fn has_input(&self) -> bool {
        matches!(self, Page::Text | Page::Image | Page::Map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
    ConfirmRetrain,
}

/// Lifecycle of one request owned by one page
#[derive(Debug, Clone, Default)]
pub enum Request<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    Failed(ApiError),
}

impl<T> Request<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Request::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Request::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Request::Failed(e) => Some(e),
            _ => None,
        }
    }

    fn settle(&mut self, result: Result<T, ApiError>) {
        *self = match result {
            Ok(v) => Request::Ready(v),
            Err(e) => Request::Failed(e),
        };
    }
}

/// Feedback for the result currently on the text page
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackState {
    Available,
    Sending,
    Sent(String),
    Failed(String),
}

impl FeedbackState {
    /// Once sent (or in flight) the action is disabled until a new result arrives
    pub fn can_submit(&self) -> bool {
        matches!(self, FeedbackState::Available | FeedbackState::Failed(_))
    }
}

#[derive(Debug, Default)]
pub struct HomeView {
    pub health: Request<HealthStatus>,
    pub stats: Request<LearningStats>,
}

#[derive(Debug)]
pub struct TextView {
    pub input: String,
    pub form_error: Option<String>,
    pub result: Request<AnalysisResult>,
    /// Text that produced `result`, for feedback and retry
    pub submitted: Option<String>,
    /// Bumped whenever a new result lands; feedback replies carry the value they were sent for
    pub result_seq: u64,
    pub feedback: FeedbackState,
}

#[derive(Debug, Default)]
pub struct ImageView {
    pub path_input: String,
    pub form_error: Option<String>,
    pub selecting: bool,
    pub selected: Option<ImageUpload>,
    pub result: Request<AnalysisResult>,
}

/// One geocoded place from a detection on the map page
#[derive(Debug, Clone, PartialEq)]
pub struct DisasterPin {
    pub text: String,
    pub location: String,
    pub lat: f64,
    pub lng: f64,
    pub disaster_type: Option<String>,
    pub confidence: Option<f64>,
    pub address: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct MapView {
    pub input: String,
    pub loading: bool,
    pub message: Option<String>,
    pub pins: Vec<DisasterPin>,
    pub selected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryTab {
    #[default]
    Text,
    Image,
}

#[derive(Debug, Default)]
pub struct HistoryView {
    pub tab: HistoryTab,
    /// Set by the first fetch; later visits keep what is loaded
    pub requested: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub text_rows: Vec<HistoryItem>,
    pub image_rows: Vec<HistoryItem>,
    pub selected: usize,
}

impl HistoryView {
    pub fn rows(&self) -> &[HistoryItem] {
        match self.tab {
            HistoryTab::Text => &self.text_rows,
            HistoryTab::Image => &self.image_rows,
        }
    }
}

#[derive(Debug, Default)]
pub struct LearningView {
    pub stats: Request<LearningStats>,
    pub recent: Request<Vec<FeedbackEntry>>,
    pub retrain: Request<RetrainStatus>,
    pub force: bool,
}

/// Completed background work, sent back to the UI loop
#[derive(Debug)]
pub enum AppEvent {
    Health(Result<HealthStatus, ApiError>),
    HomeStats(Result<LearningStats, ApiError>),
    TextAnalyzed {
        text: String,
        result: Result<AnalysisResult, ApiError>,
    },
    FeedbackSent {
        seq: u64,
        result: Result<FeedbackReceipt, ApiError>,
    },
    ImageSelected(Result<ImageUpload, ValidationError>),
    ImageAnalyzed(Result<AnalysisResult, ApiError>),
    Located {
        text: String,
        result: Result<LocationResult, ApiError>,
    },
    History {
        text: Result<HistoryPage, ApiError>,
        image: Result<HistoryPage, ApiError>,
    },
    LearningStats(Result<LearningStats, ApiError>),
    RecentFeedback(Result<Vec<FeedbackEntry>, ApiError>),
    Retrained(Result<RetrainStatus, ApiError>),
}

pub struct App {
    pub page: Page,
    pub popup: Popup,
    /// Keystrokes go to the current page's input field
    pub editing: bool,

    pub config: AppConfig,
    api: Arc<ApiClient>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,

    pub home: HomeView,
    pub text: TextView,
    pub image: ImageView,
    pub map: MapView,
    pub history: HistoryView,
    pub learning: LearningView,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,
}

impl App {
    pub fn new(config: AppConfig, api: ApiClient) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            page: Page::Home,
            popup: Popup::None,
            editing: false,

            config,
            api: Arc::new(api),
            events_tx,
            events_rx,

            home: HomeView::default(),
            text: TextView {
                input: String::new(),
                form_error: None,
                result: Request::Idle,
                submitted: None,
                result_seq: 0,
                feedback: FeedbackState::Available,
            },
            image: ImageView::default(),
            map: MapView::default(),
            history: HistoryView::default(),
            learning: LearningView::default(),

            status_message: None,
            status_message_time: None,
        };

        app.enter_page(Page::Home);
        app
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Set a status message (auto-clears after 3 seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Run `fut` in the background and deliver its output as an event
    fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            // Receiver only goes away on shutdown
            let _ = tx.send(fut.await);
        });
    }

    /// Switch page and run its fetch-on-mount requests
    pub fn enter_page(&mut self, page: Page) {
        self.page = page;
        self.editing = false;

        match page {
            Page::Home => {
                self.fetch_health();
                self.fetch_home_stats();
            }
            Page::History => {
                if !self.history.requested {
                    self.fetch_history();
                }
            }
            Page::Learning => {
                self.fetch_learning_stats();
                self.fetch_recent_feedback();
            }
            Page::Text | Page::Image | Page::Map => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.popup != Popup::None {
            self.handle_popup_key(key);
            return;
        }

        if self.editing {
            self.handle_edit_key(key);
            return;
        }

        match key.code {
            KeyCode::Tab => self.enter_page(self.page.next()),
            KeyCode::BackTab => self.enter_page(self.page.prev()),
            KeyCode::F(n) if (1..=Page::ALL.len() as u8).contains(&n) => {
                self.enter_page(Page::ALL[(n - 1) as usize])
            }
            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,
            KeyCode::Char('e') | KeyCode::Char('i') if self.page.has_input() => self.editing = true,
            _ => match self.page {
                Page::Home => self.handle_home_key(key),
                Page::Text => self.handle_text_key(key),
                Page::Image => self.handle_image_key(key),
                Page::Map => self.handle_map_key(key),
                Page::History => self.handle_history_key(key),
                Page::Learning => self.handle_learning_key(key),
            },
        }
    }

    fn handle_popup_key(&mut self, key: KeyEvent) {
        match self.popup {
            Popup::Help => {
                if matches!(
                    key.code,
                    KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')
                ) {
                    self.popup = Popup::None;
                }
            }
            Popup::ConfirmRetrain => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.popup = Popup::None;
                    self.trigger_retraining();
                }
                KeyCode::Char('n') | KeyCode::Esc => self.popup = Popup::None,
                _ => {}
            },
            Popup::None => {}
        }
    }

    fn input_mut(&mut self) -> Option<&mut String> {
        match self.page {
            Page::Text => Some(&mut self.text.input),
            Page::Image => Some(&mut self.image.path_input),
            Page::Map => Some(&mut self.map.input),
            _ => None,
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.editing = false,
            KeyCode::Enter => {
                self.editing = false;
                match self.page {
                    Page::Text => self.submit_text(),
                    Page::Image => self.select_image(),
                    Page::Map => self.submit_location(),
                    _ => {}
                }
            }
            KeyCode::Backspace => {
                if let Some(input) = self.input_mut() {
                    input.pop();
                }
                self.clear_form_error();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(input) = self.input_mut() {
                    input.clear();
                }
            }
            KeyCode::Char(c) => {
                if let Some(input) = self.input_mut() {
                    input.push(c);
                }
                self.clear_form_error();
            }
            _ => {}
        }
    }

    fn clear_form_error(&mut self) {
        match self.page {
            Page::Text => self.text.form_error = None,
            Page::Image => self.image.form_error = None,
            _ => {}
        }
    }

    // ── Home ───────────────────────────────────────────────────────────────

    fn handle_home_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('r') {
            self.fetch_health();
            self.fetch_home_stats();
        }
    }

    fn fetch_health(&mut self) {
        self.home.health = Request::Loading;
        let api = self.api.clone();
        self.spawn(async move { AppEvent::Health(api.check_health().await) });
    }

    fn fetch_home_stats(&mut self) {
        self.home.stats = Request::Loading;
        let api = self.api.clone();
        self.spawn(async move { AppEvent::HomeStats(api.get_learning_stats().await) });
    }

    // ── Text analysis ──────────────────────────────────────────────────────

    fn handle_text_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_text(),
            KeyCode::Char(c @ '1'..='3') if !self.text.result.is_loading() => {
                let idx = c as usize - '1' as usize;
                self.text.input = EXAMPLE_TEXTS[idx].to_string();
                self.text.form_error = None;
                self.text.result = Request::Idle;
            }
            KeyCode::Char('y') => self.submit_feedback(true),
            KeyCode::Char('n') => self.submit_feedback(false),
            KeyCode::Char('r') => {
                if self.text.result.error().is_some() {
                    if let Some(text) = self.text.submitted.clone() {
                        self.start_text_analysis(text);
                    }
                }
            }
            KeyCode::Char('c') => {
                self.text.input.clear();
                self.text.form_error = None;
                self.text.result = Request::Idle;
                self.text.submitted = None;
            }
            _ => {}
        }
    }

    pub fn submit_text(&mut self) {
        if self.text.result.is_loading() {
            return;
        }
        if let Err(e) = crate::api::validate::validate_text(&self.text.input) {
            tracing::debug!("Text rejected locally: {} ({})", e, e.context().unwrap_or_default());
            self.text.form_error = Some(e.to_string());
            return;
        }
        let text = self.text.input.clone();
        self.start_text_analysis(text);
    }

    fn start_text_analysis(&mut self, text: String) {
        self.text.form_error = None;
        self.text.result = Request::Loading;
        self.text.submitted = Some(text.clone());

        let api = self.api.clone();
        self.spawn(async move {
            let result = api.analyze_text(&text).await;
            AppEvent::TextAnalyzed { text, result }
        });
    }

    /// Label the current result. `is_disaster` is the correct answer, not the prediction.
    pub fn submit_feedback(&mut self, is_disaster: bool) {
        if self.text.result.ready().is_none() || !self.text.feedback.can_submit() {
            return;
        }
        let Some(text) = self.text.submitted.clone() else {
            return;
        };

        self.text.feedback = FeedbackState::Sending;
        let api = self.api.clone();
        let user_id = self.config.user_id.clone();
        let seq = self.text.result_seq;
        self.spawn(async move {
            let result = api.submit_feedback(&text, is_disaster, &user_id).await;
            AppEvent::FeedbackSent { seq, result }
        });
    }

    // ── Image analysis ─────────────────────────────────────────────────────

    fn handle_image_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_image(),
            KeyCode::Char('r') => {
                if self.image.result.error().is_some() {
                    self.submit_image();
                }
            }
            KeyCode::Char('c') => {
                self.image = ImageView::default();
            }
            _ => {}
        }
    }

    /// Validate the typed path in the background; the file is only read if type and size pass
    pub fn select_image(&mut self) {
        let raw = self.image.path_input.trim();
        if raw.is_empty() {
            self.image.form_error = Some(ValidationError::EmptyFile.to_string());
            return;
        }

        let path = expand_home(raw);
        self.image.selecting = true;
        self.image.form_error = None;
        self.spawn(async move { AppEvent::ImageSelected(ImageUpload::from_path(&path).await) });
    }

    pub fn submit_image(&mut self) {
        if self.image.result.is_loading() {
            return;
        }
        let Some(upload) = self.image.selected.clone() else {
            self.image.form_error = Some(ValidationError::EmptyFile.to_string());
            return;
        };

        self.image.form_error = None;
        self.image.result = Request::Loading;
        let api = self.api.clone();
        self.spawn(async move { AppEvent::ImageAnalyzed(api.analyze_image(upload).await) });
    }

    // ── Map ────────────────────────────────────────────────────────────────

    fn handle_map_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_location(),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.map.selected + 1 < self.map.pins.len() {
                    self.map.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.map.selected = self.map.selected.saturating_sub(1);
            }
            KeyCode::Char('c') => {
                self.map.pins.clear();
                self.map.selected = 0;
                self.map.message = None;
            }
            _ => {}
        }
    }

    pub fn submit_location(&mut self) {
        if self.map.loading {
            return;
        }
        let text = self.map.input.trim().to_string();
        if text.is_empty() {
            return;
        }

        self.map.loading = true;
        self.map.message = None;
        let api = self.api.clone();
        self.spawn(async move {
            let result = api.detect_with_location(&text).await;
            AppEvent::Located { text, result }
        });
    }

    // ── History ────────────────────────────────────────────────────────────

    fn handle_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Char('t') => {
                self.history.tab = match self.history.tab {
                    HistoryTab::Text => HistoryTab::Image,
                    HistoryTab::Image => HistoryTab::Text,
                };
                self.history.selected = 0;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.history.selected + 1 < self.history.rows().len() {
                    self.history.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.history.selected = self.history.selected.saturating_sub(1);
            }
            KeyCode::Char('r') => self.fetch_history(),
            _ => {}
        }
    }

    /// Both tabs are fetched together and shown once both have settled
    pub fn fetch_history(&mut self) {
        if self.history.loading {
            return;
        }
        self.history.requested = true;
        self.history.loading = true;
        self.history.error = None;

        let api = self.api.clone();
        let limit = self.config.history_limit;
        self.spawn(async move {
            let (text, image) = tokio::join!(api.get_text_history(limit), api.get_image_history(limit));
            AppEvent::History { text, image }
        });
    }

    // ── Learning ───────────────────────────────────────────────────────────

    fn handle_learning_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('r') => {
                self.fetch_learning_stats();
                self.fetch_recent_feedback();
            }
            KeyCode::Char('f') => self.learning.force = !self.learning.force,
            KeyCode::Char('t') => {
                if !self.learning.retrain.is_loading() {
                    self.popup = Popup::ConfirmRetrain;
                }
            }
            _ => {}
        }
    }

    fn fetch_learning_stats(&mut self) {
        self.learning.stats = Request::Loading;
        let api = self.api.clone();
        self.spawn(async move { AppEvent::LearningStats(api.get_learning_stats().await) });
    }

    fn fetch_recent_feedback(&mut self) {
        self.learning.recent = Request::Loading;
        let api = self.api.clone();
        let limit = self.config.recent_feedback_limit;
        self.spawn(async move { AppEvent::RecentFeedback(api.get_recent_feedback(limit).await) });
    }

    pub fn trigger_retraining(&mut self) {
        if self.learning.retrain.is_loading() {
            return;
        }
        self.learning.retrain = Request::Loading;
        let api = self.api.clone();
        let force = self.learning.force;
        self.spawn(async move { AppEvent::Retrained(api.trigger_retraining(force).await) });
    }

    // ── Event loop plumbing ────────────────────────────────────────────────

    /// Apply finished background work and expire old status messages
    pub fn tick(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }

        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_SECONDS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Health(result) => self.home.health.settle(result),
            AppEvent::HomeStats(result) => self.home.stats.settle(result),

            AppEvent::TextAnalyzed { text, result } => {
                // No cancellation: a late result still replaces what is shown
                if let Err(e) = &result {
                    tracing::error!("Text analysis failed: {}", e);
                }
                self.text.submitted = Some(text);
                self.text.result_seq += 1;
                self.text.feedback = FeedbackState::Available;
                self.text.result.settle(result);
            }

            AppEvent::FeedbackSent { seq, result } if seq != self.text.result_seq => {
                // Reply for a result that has since been replaced
                tracing::debug!("Ignoring feedback reply for stale result {}", seq);
                if let Err(e) = result {
                    tracing::error!("Feedback failed: {}", e);
                }
            }
            AppEvent::FeedbackSent { result, .. } => match result {
                Ok(receipt) => {
                    let msg = receipt
                        .message
                        .unwrap_or_else(|| "Thanks! Feedback recorded".to_string());
                    self.set_status(msg.clone());
                    self.text.feedback = FeedbackState::Sent(msg);
                }
                Err(e) => {
                    tracing::error!("Feedback failed: {}", e);
                    self.text.feedback = FeedbackState::Failed(e.user_message("submit feedback"));
                }
            },

            AppEvent::ImageSelected(result) => {
                self.image.selecting = false;
                match result {
                    Ok(upload) => {
                        self.set_status(format!("Selected {}", upload.file_name()));
                        self.image.selected = Some(upload);
                        self.image.form_error = None;
                        // An upload in flight keeps its result slot and guard
                        if !self.image.result.is_loading() {
                            self.image.result = Request::Idle;
                        }
                    }
                    Err(e) => {
                        tracing::info!("Image rejected: {} ({})", e, e.context().unwrap_or_default());
                        self.image.selected = None;
                        self.image.form_error = Some(e.to_string());
                    }
                }
            }

            AppEvent::ImageAnalyzed(result) => {
                if let Err(e) = &result {
                    tracing::error!("Image analysis failed: {}", e);
                }
                self.image.result.settle(result);
            }

            AppEvent::Located { text, result } => {
                self.map.loading = false;
                self.map.input.clear();
                match result {
                    Ok(location) => self.add_pins(&text, location),
                    Err(e) => {
                        tracing::error!("Location lookup failed: {}", e);
                        self.map.message = Some(e.user_message("analyze text"));
                    }
                }
            }

            AppEvent::History { text, image } => {
                self.history.loading = false;
                match (text, image) {
                    (Ok(text), Ok(image)) => {
                        self.history.text_rows = text.analyses;
                        self.history.image_rows = image.analyses;
                        self.history.selected = 0;
                        self.history.error = None;
                    }
                    (text, image) => {
                        for err in [text.err(), image.err()].into_iter().flatten() {
                            tracing::error!("History load failed: {}", err);
                        }
                        self.history.error = Some("Failed to load history. Please try again.".to_string());
                    }
                }
            }

            AppEvent::LearningStats(result) => self.learning.stats.settle(result),
            AppEvent::RecentFeedback(result) => self.learning.recent.settle(result),
            AppEvent::Retrained(result) => {
                match &result {
                    Ok(status) => {
                        let msg = status
                            .message
                            .clone()
                            .or_else(|| status.status.clone())
                            .unwrap_or_else(|| "Retraining requested".to_string());
                        self.set_status(msg);
                    }
                    Err(e) => tracing::error!("Retraining failed: {}", e),
                }
                self.learning.retrain.settle(result);
            }
        }
    }

    fn add_pins(&mut self, text: &str, location: LocationResult) {
        let is_disaster = location.is_disaster.unwrap_or(false);
        if !location.has_location || location.coordinates.is_empty() {
            self.map.message = Some("No location found in text".to_string());
            return;
        }
        if !is_disaster {
            self.map.message = Some("No disaster detected in this text".to_string());
            return;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let added = location.coordinates.len();
        for coord in location.coordinates {
            self.map.pins.push(DisasterPin {
                text: text.to_string(),
                location: coord.location,
                lat: coord.latitude,
                lng: coord.longitude,
                disaster_type: location.disaster_type.clone(),
                confidence: location.confidence,
                address: coord.full_address,
                timestamp: timestamp.clone(),
            });
        }
        self.map.selected = self.map.pins.len() - 1;
        self.set_status(format!("Added {} location(s) to the map", added));
    }

    /// Wait for the next background result and apply it
    #[cfg(test)]
    async fn settle_next(&mut self) {
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), self.events_rx.recv())
            .await
            .expect("background request did not finish")
            .expect("event channel closed");
        self.apply_event(event);
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        app.handle_key(key(KeyCode::Char('e')));
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    /// App on the text page with the home-page mount requests already settled
    async fn app_on(backend: &FakeBackend, page: Page) -> App {
        let mut app = App::new(AppConfig::default(), backend.client());
        app.settle_next().await;
        app.settle_next().await;
        app.enter_page(page);
        app
    }

    #[tokio::test]
    async fn test_home_mount_fetches_health_and_stats() {
        let backend = FakeBackend::start().await;
        let mut app = App::new(AppConfig::default(), backend.client());
        assert!(app.home.health.is_loading());

        app.settle_next().await;
        app.settle_next().await;
        assert!(app.home.health.ready().is_some());
        assert_eq!(app.home.stats.ready().unwrap().total_feedback, 12);
    }

    #[tokio::test]
    async fn test_short_text_rejected_without_request() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Text).await;
        let before = backend.request_count();

        type_text(&mut app, "quake");
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.text.form_error.as_deref(), Some("Text must be at least 10 characters long"));
        assert!(matches!(app.text.result, Request::Idle));
        assert_eq!(backend.request_count(), before);
    }

    #[tokio::test]
    async fn test_text_analysis_and_feedback_once() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Text).await;

        app.handle_key(key(KeyCode::Char('1')));
        app.handle_key(key(KeyCode::Enter));
        assert!(app.text.result.is_loading());
        app.settle_next().await;

        let result = app.text.result.ready().unwrap();
        assert!(result.disaster_detected);
        assert_eq!(result.disaster_type.as_deref(), Some("Earthquake"));

        let before = backend.request_count();
        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.text.feedback, FeedbackState::Sending);
        // Repeated presses while in flight do nothing
        app.handle_key(key(KeyCode::Char('n')));
        app.handle_key(key(KeyCode::Char('y')));
        app.settle_next().await;
        assert!(matches!(app.text.feedback, FeedbackState::Sent(_)));

        // And nothing after it has been sent either
        app.handle_key(key(KeyCode::Char('y')));
        assert!(matches!(app.text.feedback, FeedbackState::Sent(_)));
        assert_eq!(backend.request_count(), before + 1);

        let body = backend.last_body("/api/learning/feedback").unwrap();
        assert!(body.contains("\"is_disaster\":false"));
    }

    #[tokio::test]
    async fn test_server_error_keeps_app_usable() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Text).await;

        type_text(&mut app, "please crash the model");
        app.handle_key(key(KeyCode::Enter));
        app.settle_next().await;

        let err = app.text.result.error().unwrap();
        assert!(err.is_retryable());
        // Feedback needs a result
        app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(app.text.feedback, FeedbackState::Available);

        // Other pages still work
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.page, Page::Image);
    }

    #[tokio::test]
    async fn test_oversized_image_rejected_before_upload() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Image).await;
        let before = backend.request_count();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aerial.jpg");
        std::fs::File::create(&path).unwrap().set_len(15 * 1024 * 1024).unwrap();

        type_text(&mut app, path.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));
        assert!(app.image.selecting);
        app.settle_next().await;

        assert_eq!(app.image.form_error.as_deref(), Some("File size must be less than 10MB"));
        assert!(app.image.selected.is_none());

        // Nothing selected, so submitting is a local error too
        app.handle_key(key(KeyCode::Enter));
        assert!(matches!(app.image.result, Request::Idle));
        assert_eq!(backend.request_count(), before);
    }

    #[tokio::test]
    async fn test_image_upload_flow() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Image).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flood.webp");
        std::fs::write(&path, b"RIFF\x00\x00\x00\x00WEBPVP8 ").unwrap();

        type_text(&mut app, path.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));
        app.settle_next().await;
        assert_eq!(app.image.selected.as_ref().unwrap().mime(), "image/webp");

        app.handle_key(key(KeyCode::Enter));
        app.settle_next().await;
        let result = app.image.result.ready().unwrap();
        assert_eq!(result.detections.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_loads_both_tabs_with_limit() {
        let backend = FakeBackend::start().await;
        let mut config = AppConfig::default();
        config.history_limit = 3;
        let mut app = App::new(config, backend.client());
        app.settle_next().await;
        app.settle_next().await;

        app.enter_page(Page::History);
        assert!(app.history.loading);
        app.settle_next().await;

        assert!(!app.history.loading);
        assert_eq!(backend.last_query("/api/text/history").as_deref(), Some("limit=3"));
        assert_eq!(backend.last_query("/api/image/history").as_deref(), Some("limit=3"));
        assert_eq!(app.history.text_rows.len(), 3);
        // Backend sent 5 image rows; the client keeps at most the limit
        assert_eq!(app.history.image_rows.len(), 3);

        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.history.tab, HistoryTab::Image);
        assert_eq!(app.history.rows().len(), 3);
    }

    #[test]
    fn test_history_failure_message() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let client = ApiClient::new("http://127.0.0.1:9/api", None).unwrap();
        let mut app = App::new(AppConfig::default(), client);

        app.history.loading = true;
        app.apply_event(AppEvent::History {
            text: Ok(HistoryPage::default()),
            image: Err(ApiError::Server { status: 500, detail: None }),
        });
        assert!(!app.history.loading);
        assert_eq!(app.history.error.as_deref(), Some("Failed to load history. Please try again."));
    }

    #[tokio::test]
    async fn test_map_pins_and_messages() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Map).await;

        type_text(&mut app, "Wildfire spreading near Los Angeles");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.map.loading);
        app.settle_next().await;
        assert_eq!(app.map.pins.len(), 1);
        assert_eq!(app.map.pins[0].location, "Los Angeles");
        assert_eq!(app.map.pins[0].disaster_type.as_deref(), Some("wildfire"));
        assert!(app.map.input.is_empty());

        type_text(&mut app, "A sunny day in Paris");
        app.handle_key(key(KeyCode::Enter));
        app.settle_next().await;
        assert_eq!(app.map.message.as_deref(), Some("No disaster detected in this text"));

        type_text(&mut app, "Storm somewhere nowhere");
        app.handle_key(key(KeyCode::Enter));
        app.settle_next().await;
        assert_eq!(app.map.message.as_deref(), Some("No location found in text"));
        assert_eq!(app.map.pins.len(), 1);
    }

    #[tokio::test]
    async fn test_retrain_needs_confirmation() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Learning).await;
        app.settle_next().await;
        app.settle_next().await;
        assert_eq!(app.learning.recent.ready().unwrap().len(), 2);

        app.handle_key(key(KeyCode::Char('f')));
        app.handle_key(key(KeyCode::Char('t')));
        assert_eq!(app.popup, Popup::ConfirmRetrain);
        app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(app.popup, Popup::None);
        app.settle_next().await;

        assert_eq!(
            app.learning.retrain.ready().unwrap().status.as_deref(),
            Some("started")
        );
        assert_eq!(backend.last_body("/api/learning/retrain").as_deref(), Some(r#"{"force":true}"#));
    }

    #[tokio::test]
    async fn test_late_feedback_reply_does_not_lock_newer_result() {
        let backend = FakeBackend::start().await;
        let mut app = app_on(&backend, Page::Text).await;

        app.handle_key(key(KeyCode::Char('1')));
        app.handle_key(key(KeyCode::Enter));
        app.settle_next().await;
        let before = backend.request_count();

        // Feedback for the first result goes out...
        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.text.feedback, FeedbackState::Sending);

        // ...but a second result lands before its reply
        let second = "Flash floods swept through the valley overnight";
        app.apply_event(AppEvent::TextAnalyzed {
            text: second.to_string(),
            result: Ok(AnalysisResult {
                disaster_detected: true,
                disaster_type: Some("Flood".into()),
                ..Default::default()
            }),
        });
        assert_eq!(app.text.feedback, FeedbackState::Available);

        app.settle_next().await;
        assert_eq!(app.text.feedback, FeedbackState::Available);
        assert_eq!(backend.request_count(), before + 1);

        // The second result can still be labelled, once
        app.handle_key(key(KeyCode::Char('y')));
        app.settle_next().await;
        assert!(matches!(app.text.feedback, FeedbackState::Sent(_)));
        assert_eq!(backend.request_count(), before + 2);
        let body = backend.last_body("/api/learning/feedback").unwrap();
        assert!(body.contains(second));
        assert!(body.contains("\"is_disaster\":true"));
    }

    #[tokio::test]
    async fn test_late_feedback_failure_not_shown_on_newer_result() {
        let client = ApiClient::new("http://127.0.0.1:9/api", None).unwrap();
        let mut app = App::new(AppConfig::default(), client);
        app.text.result_seq = 4;

        app.apply_event(AppEvent::FeedbackSent {
            seq: 3,
            result: Err(ApiError::Server { status: 500, detail: None }),
        });
        assert_eq!(app.text.feedback, FeedbackState::Available);
    }

    #[tokio::test]
    async fn test_selecting_image_keeps_upload_in_flight() {
        let client = ApiClient::new("http://127.0.0.1:9/api", None).unwrap();
        let mut app = App::new(AppConfig::default(), client);
        app.image.result = Request::Loading;

        let upload = ImageUpload::from_bytes("second.png", "image/png", vec![0x89, b'P', b'N', b'G']).unwrap();
        app.apply_event(AppEvent::ImageSelected(Ok(upload)));

        assert!(app.image.result.is_loading());
        assert_eq!(app.image.selected.as_ref().unwrap().file_name(), "second.png");
    }

    #[tokio::test]
    async fn test_disaster_without_coordinates_adds_no_pins() {
        let client = ApiClient::new("http://127.0.0.1:9/api", None).unwrap();
        let mut app = App::new(AppConfig::default(), client);
        app.map.loading = true;

        app.apply_event(AppEvent::Located {
            text: "Earthquake reported somewhere".to_string(),
            result: Ok(LocationResult {
                has_location: true,
                is_disaster: Some(true),
                disaster_type: Some("earthquake".into()),
                confidence: Some(0.8),
                coordinates: Vec::new(),
            }),
        });

        assert!(app.map.pins.is_empty());
        assert_eq!(app.map.message.as_deref(), Some("No location found in text"));
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Home.next(), Page::Text);
        assert_eq!(Page::Learning.next(), Page::Home);
        assert_eq!(Page::Home.prev(), Page::Learning);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/a.jpg"), PathBuf::from("/tmp/a.jpg"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/b.png"), home.join("b.png"));
        }
    }
}
