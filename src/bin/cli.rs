//! Camino CLI
//!
//! Command-line interface for a Camino API server:
//! - Sign in as an admin
//! - List, add and edit journey points
//! - Render the route and timeline
//! - Preview links
//! - Follow a journey live

use anyhow::{bail, Context};
use camino::auth::{SessionGate, SignedIn};
use camino::clock::SystemClock;
use camino::config::{generate_default_config, Config};
use camino::editor::{format_timestamp_input, parse_timestamp_input, PointEditor};
use camino::map::{marker_layer_id, JourneySummary, MapView, SceneGraph, Theme};
use camino::metadata::{LinkMetadata, MetadataFetcher};
use camino::points::{Coordinates, HttpPointStore, HttpStoreConfig, JourneyId, Point, PointStore};
use camino::sync::{PointDraft, PointSync};
use camino::timeline::{timeline, TimelineEntry};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "camino")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Travel journal: journey points, routes and link previews")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8082", global = true, env = "CAMINO_API_URL")]
    pub api_url: String,

    /// Journey to work on (default: from config)
    #[arg(short, long, global = true)]
    pub journey: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in as an admin and remember the session
    Login {
        #[arg(short, long)]
        email: String,
        /// Password (prefer the environment variable)
        #[arg(short, long, env = "CAMINO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the remembered session
    Logout,

    /// List the journey's points
    Points,

    /// Show the timeline cards
    Timeline {
        /// Highlight a point
        #[arg(short, long)]
        select: Option<String>,
    },

    /// Add a point
    Add {
        /// Latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(short, long, default_value = "")]
        title: String,
        #[arg(short, long, default_value = "")]
        url: String,
        /// Cover image URL
        #[arg(long, default_value = "")]
        cover: String,
        /// When: "now", RFC 3339 or YYYY-MM-DDTHH:MM (UTC)
        #[arg(long, default_value = "now")]
        time: String,
    },

    /// Edit a point's title, link or time. Unset options keep their value,
    /// an empty string clears.
    Edit {
        /// Point id
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        url: Option<String>,
        /// "now", RFC 3339 or YYYY-MM-DDTHH:MM (UTC)
        #[arg(long)]
        time: Option<String>,
    },

    /// Render the route as a map scene
    Route {
        /// Map theme (default: from config)
        #[arg(long)]
        theme: Option<Theme>,
        /// Select a point as if its marker was clicked
        #[arg(short, long)]
        select: Option<String>,
    },

    /// Fetch a link preview
    Preview {
        url: String,
        /// Fail instead of falling back to a placeholder card
        #[arg(long)]
        strict: bool,
    },

    /// Follow the journey and print every change
    Watch,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Generate a default config file
    Init {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration
    Show,
    /// Print the digest to put in `password_sha256`
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        command,
        api_url,
        journey,
        format,
    } = Cli::parse();
    let config = Config::load_default();
    camino::logging::init(&camino::config::LoggingConfig {
        level: "warn".to_string(),
        ..config.logging.clone()
    });

    let journey = journey
        .map(JourneyId::new)
        .unwrap_or_else(|| config.journey.journey_id());
    let session = load_session()?;

    match command {
        Commands::Login { email, password } => {
            let response = reqwest::Client::new()
                .post(format!("{}/api/v1/auth/login", api_url))
                .json(&serde_json::json!({ "email": email, "password": password }))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                let message = body["error"]["message"].as_str().unwrap_or("login failed");
                bail!("Login failed ({}): {}", status, message);
            }

            let signed_in: SignedIn = response.json().await?;
            save_session(&signed_in)?;
            println!(
                "Signed in as {} until {}",
                signed_in.email,
                signed_in.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }

        Commands::Logout => {
            let Some(signed_in) = session else {
                println!("Not signed in");
                return Ok(());
            };
            let response = reqwest::Client::new()
                .post(format!("{}/api/v1/auth/logout", api_url))
                .bearer_auth(&signed_in.token)
                .send()
                .await?;
            if !response.status().is_success() {
                eprintln!("Server did not accept the logout ({})", response.status());
            }
            clear_session()?;
            println!("Signed out");
        }

        Commands::Points => {
            let store = http_store(&api_url, &config, None)?;
            let points = store.list(&journey).await?;
            print_points(&points, format)?;
        }

        Commands::Timeline { select } => {
            let store = http_store(&api_url, &config, None)?;
            let points = store.list(&journey).await?;
            let entries = timeline(&points, select.as_deref());
            print_timeline(&entries, format)?;
        }

        Commands::Add {
            lat,
            lon,
            title,
            url,
            cover,
            time,
        } => {
            let signed_in = require_session(session)?;
            let store = http_store(&api_url, &config, Some(signed_in.token))?;
            let sync = PointSync::new(Arc::new(store), Arc::new(SystemClock));

            let id = sync
                .add_point(
                    &journey,
                    PointDraft {
                        title,
                        coordinates: Some(Coordinates::new(lat, lon)),
                        cover,
                        timestamp: Some(parse_time(&time)?),
                        url,
                    },
                )
                .await?;
            println!("Added point {}", id);
        }

        Commands::Edit {
            id,
            title,
            url,
            time,
        } => {
            let signed_in = require_session(session)?;
            let store = Arc::new(http_store(&api_url, &config, Some(signed_in.token.clone()))?);

            let point = store
                .list(&journey)
                .await?
                .into_iter()
                .find(|p| p.id == id)
                .with_context(|| format!("no point {} in journey {}", id, journey))?;

            let gate = Arc::new(SessionGate::new());
            gate.sign_in(signed_in);
            let clock = Arc::new(SystemClock);
            let sync = Arc::new(PointSync::new(store, clock.clone()));
            let mut editor = PointEditor::new(sync, gate, clock, journey.clone());

            editor.open_edit(point)?;
            if let Some(title) = title {
                editor.set_title(title);
            }
            if let Some(url) = url {
                editor.set_url(url);
            }
            if let Some(time) = time {
                editor.set_timestamp(format_timestamp_input(parse_time(&time)?));
            }
            let id = editor.submit().await?;
            println!("Updated point {}", id);
        }

        Commands::Route { theme, select } => {
            let store = http_store(&api_url, &config, None)?;
            let points = store.list(&journey).await?;
            let theme = theme.unwrap_or(config.journey.theme);

            let surface = Arc::new(Mutex::new(SceneGraph::new()));
            let mut view = MapView::new(Arc::clone(&surface), theme);
            view.render(&points);
            if let Some(id) = &select {
                if view.click(&marker_layer_id(id)).is_none() {
                    eprintln!("No marker for point {}", id);
                }
            }
            let scene = surface
                .lock()
                .map_err(|_| anyhow::anyhow!("map surface lock poisoned"))?
                .clone();
            drop(view);

            let summary = JourneySummary::from_points(&points);
            match format {
                OutputFormat::Json => {
                    let out = serde_json::json!({ "summary": summary, "scene": scene });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
                _ => print_route(&journey, &summary, &scene, &points),
            }
        }

        Commands::Preview { url, strict } => {
            let fetcher = MetadataFetcher::new(config.metadata.fetcher_config())?;
            let metadata = if strict {
                fetcher.fetch(&url).await?
            } else {
                fetcher.preview(&url).await
            };
            print_preview(&metadata, format)?;
        }

        Commands::Watch => {
            let store = http_store(&api_url, &config, None)?;
            let sync = PointSync::new(Arc::new(store), Arc::new(SystemClock));
            let mut changes = sync.watch();
            let mut subscription = sync.subscribe(&journey);

            println!("Watching {} (Ctrl+C to stop)", journey);
            loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = changes.borrow_and_update().clone();
                        if let Some(error) = &state.error {
                            eprintln!("sync error: {}", error);
                        } else if !state.loading {
                            let current = state
                                .current_point()
                                .map(|p| format!("{} ({})", display_title(p), p.timestamp.format("%b %-d")))
                                .unwrap_or_else(|| "-".to_string());
                            println!(
                                "[{}] {} points, current: {}",
                                Utc::now().format("%H:%M:%S"),
                                state.points.len(),
                                current
                            );
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            subscription.cancel();
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { output } => {
                let content = generate_default_config();
                match output {
                    Some(path) => {
                        if let Some(parent) = path.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        std::fs::write(&path, &content)?;
                        println!("Config written to {:?}", path);
                    }
                    None => print!("{}", content),
                }
            }
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::HashPassword { password } => {
                println!("{}", camino::auth::hash_password(&password));
            }
        },
    }

    Ok(())
}

fn http_store(api_url: &str, config: &Config, token: Option<String>) -> anyhow::Result<HttpPointStore> {
    Ok(HttpPointStore::new(HttpStoreConfig {
        base_url: api_url.to_string(),
        token,
        poll_interval: Duration::from_millis(config.journey.poll_interval_ms),
        ..Default::default()
    })?)
}

/// "now", RFC 3339, or the `datetime-local` form read as UTC
fn parse_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    if value.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    parse_timestamp_input(value).with_context(|| format!("invalid time: {}", value))
}

// ============================================
// SESSION FILE
// ============================================

fn session_path() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir().context("no config directory on this system")?;
    Ok(dir.join("camino").join("session.json"))
}

fn load_session() -> anyhow::Result<Option<SignedIn>> {
    let Ok(path) = session_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let signed_in: SignedIn = serde_json::from_str(&content)
        .with_context(|| format!("corrupt session file {:?}", path))?;
    Ok(Some(signed_in))
}

fn save_session(signed_in: &SignedIn) -> anyhow::Result<()> {
    let path = session_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(signed_in)?)?;
    Ok(())
}

fn clear_session() -> anyhow::Result<()> {
    let path = session_path()?;
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn require_session(session: Option<SignedIn>) -> anyhow::Result<SignedIn> {
    match session {
        Some(s) if s.expires_at > Utc::now() => Ok(s),
        Some(_) => bail!("Session expired, run `camino login` again"),
        None => bail!("Not signed in, run `camino login` first"),
    }
}

// ============================================
// OUTPUT
// ============================================

fn display_title(point: &Point) -> &str {
    if point.has_title() {
        &point.title
    } else {
        "(untitled)"
    }
}

fn print_points(points: &[Point], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(points)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["id", "timestamp", "title", "latitude", "longitude", "url", "cover"])?;
            for p in points {
                writer.write_record([
                    p.id.clone(),
                    p.timestamp.to_rfc3339(),
                    p.title.clone(),
                    p.coordinates.latitude.to_string(),
                    p.coordinates.longitude.to_string(),
                    p.link().unwrap_or_default().to_string(),
                    p.cover_or_default().to_string(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            if points.is_empty() {
                println!("No points yet.");
                return Ok(());
            }
            println!(
                "{:<32} {:<17} {:<28} {:<24} {}",
                "ID", "Time (UTC)", "Title", "Location", "Link"
            );
            println!("{}", "-".repeat(110));
            for p in points {
                println!(
                    "{:<32} {:<17} {:<28} {:<24} {}",
                    p.id,
                    p.timestamp.format("%Y-%m-%d %H:%M"),
                    truncate(display_title(p), 28),
                    p.coordinates.to_string(),
                    p.link().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

fn print_timeline(entries: &[TimelineEntry], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["date", "title", "current", "selected", "link", "point_id"])?;
            for e in entries {
                writer.write_record([
                    e.date.clone(),
                    e.title.clone(),
                    e.is_current.to_string(),
                    e.is_selected.to_string(),
                    e.link.clone().unwrap_or_default(),
                    e.point_id.clone(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            for e in entries {
                let marker = match (e.is_selected, e.is_current) {
                    (true, _) => ">",
                    (false, true) => "*",
                    _ => " ",
                };
                let badge = if e.is_current { " [Current]" } else { "" };
                println!("{} {:<7} {}{}", marker, e.date, e.title, badge);
                if let Some(link) = &e.link {
                    println!("          View details: {}", link);
                }
            }
        }
    }
    Ok(())
}

fn print_route(journey: &JourneyId, summary: &JourneySummary, scene: &SceneGraph, points: &[Point]) {
    println!("{} - {} points - {}", journey, summary.points, summary.headline());
    if points.is_empty() {
        return;
    }

    println!();
    println!("Layers (draw order):");
    for layer in &scene.layers {
        let color = layer
            .paint
            .get("circle-color")
            .or_else(|| layer.paint.get("line-color"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        println!("  {:<40} {}", layer.id, color);
    }

    if let Some(camera) = scene.camera.last() {
        println!();
        println!("Camera: {}", serde_json::to_string(camera).unwrap_or_default());
    }
}

fn print_preview(metadata: &LinkMetadata, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(metadata)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(["title", "description", "image", "siteName", "url"])?;
            writer.write_record([
                &metadata.title,
                &metadata.description,
                &metadata.image,
                &metadata.site_name,
                &metadata.url,
            ])?;
            writer.flush()?;
        }
        OutputFormat::Table => {
            println!("{}", metadata.title);
            println!("{}", metadata.site_name);
            if !metadata.description.is_empty() {
                println!();
                println!("{}", metadata.description);
            }
            println!();
            println!("Image: {}", metadata.image);
            println!("Link:  {}", metadata.url);
        }
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
