mod api;
mod app;
mod config;
mod severity;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::{ApiClient, ApiError, ImageUpload};
use app::{App, Popup};
use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "disasterscope")]
#[command(version)]
#[command(about = "Terminal client for the disaster detection backend")]
struct Args {
    /// Backend base URL including the /api prefix (overrides config and env)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether the backend is reachable
    Health,

    /// Analyze a text report
    AnalyzeText { text: String },

    /// Upload an image (JPG, PNG or WebP, at most 10MB) for analysis
    AnalyzeImage { path: PathBuf },

    /// List recent analyses
    History {
        #[arg(value_enum)]
        kind: HistoryKind,

        /// Rows to fetch (defaults to history_limit from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Label a text for the learning loop
    Feedback {
        text: String,

        /// The text describes a disaster
        #[arg(long, conflicts_with = "not_disaster", required_unless_present = "not_disaster")]
        disaster: bool,

        /// The text does not describe a disaster
        #[arg(long)]
        not_disaster: bool,

        #[arg(long)]
        user_id: Option<String>,
    },

    /// Show learning statistics
    Stats,

    /// List recent feedback entries
    RecentFeedback {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Ask the backend to retrain the text model
    Retrain {
        /// Retrain even if the backend does not recommend it
        #[arg(long)]
        force: bool,
    },

    /// Detect a disaster and geocode the places mentioned in TEXT
    Locate { text: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HistoryKind {
    Text,
    Image,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; the TUI owns the terminal so it logs to a file
    let _guard = match args.command {
        Some(_) => {
            init_stderr_logging();
            None
        }
        None => init_file_logging(),
    };

    let config = AppConfig::load()?
        .with_overrides(args.api_url.as_deref(), std::env::var(config::API_URL_ENV).ok());
    let client = ApiClient::new(&config.api_url, config.timeout())?;
    tracing::debug!("Using backend {}", client.base_url());

    match args.command {
        Some(command) => {
            if let Err(e) = run_command(command, &config, &client).await {
                // Exit status tells scripts whether retrying could help
                let code = match e.downcast_ref::<ApiError>() {
                    Some(api_err) => {
                        match api_err {
                            ApiError::Validation(v) => match v.context() {
                                Some(context) => eprintln!("Error ({}): {} ({})", api_err.class(), v, context),
                                None => eprintln!("Error ({}): {}", api_err.class(), v),
                            },
                            _ => eprintln!("Error ({}): {}", api_err.class(), api_err),
                        }
                        if api_err.is_user_fixable() { 2 } else { 1 }
                    }
                    None => {
                        eprintln!("Error: {:#}", e);
                        1
                    }
                };
                std::process::exit(code);
            }
            Ok(())
        }
        None => run_tui(config, client).await,
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(env_filter("warn"))
        .init();
}

fn init_file_logging() -> Option<WorkerGuard> {
    let dir = AppConfig::log_dir();
    if std::fs::create_dir_all(&dir).is_err() {
        // No log file, but keep the terminal clean
        return None;
    }

    let appender = tracing_appender::rolling::never(&dir, "disasterscope.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter("info"))
        .init();
    Some(guard)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(command: Command, config: &AppConfig, client: &ApiClient) -> Result<()> {
    match command {
        Command::Health => print_json(&client.check_health().await?),
        Command::AnalyzeText { text } => print_json(&client.analyze_text(&text).await?),
        Command::AnalyzeImage { path } => {
            let upload = ImageUpload::from_path(&path).await.map_err(ApiError::from)?;
            tracing::info!("Uploading {} ({} MB)", upload.file_name(), upload.size_mb());
            print_json(&client.analyze_image(upload).await?)
        }
        Command::History { kind, limit } => {
            let limit = limit.unwrap_or(config.history_limit);
            let page = match kind {
                HistoryKind::Text => client.get_text_history(limit).await?,
                HistoryKind::Image => client.get_image_history(limit).await?,
            };
            print_json(&page)
        }
        Command::Feedback {
            text,
            disaster,
            not_disaster,
            user_id,
        } => {
            // clap guarantees exactly one of the two flags
            let is_disaster = disaster && !not_disaster;
            let user_id = user_id.unwrap_or_else(|| config.user_id.clone());
            print_json(&client.submit_feedback(&text, is_disaster, &user_id).await?)
        }
        Command::Stats => print_json(&client.get_learning_stats().await?),
        Command::RecentFeedback { limit } => {
            let limit = limit.unwrap_or(config.recent_feedback_limit);
            print_json(&client.get_recent_feedback(limit).await?)
        }
        Command::Retrain { force } => print_json(&client.trigger_retraining(force).await?),
        Command::Locate { text } => print_json(&client.detect_with_location(&text).await?),
    }
}

async fn run_tui(config: AppConfig, client: ApiClient) -> Result<()> {
    ui::init_theme(theme::Theme::from_config(&config.theme));

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut app = App::new(config, client);

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.popup == Popup::None && !app.editing => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => app.handle_key(key),
                    }
                }
            }
        }

        // Apply finished requests
        app.tick();
    }
}
