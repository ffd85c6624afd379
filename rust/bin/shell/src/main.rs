//! `argo` — terminal shell for the ARGO ocean-data explorer.
//!
//! Usage:
//!   argo [--config argo.toml] [--api http://localhost:8002] [--offline] [--db argo-state.redb] [--route /]
//!
//! Boots the explorer core against the backend, restores state from the
//! redb file, then reads commands from stdin. The rendered page is printed
//! whenever it changes. State is saved on exit.

mod commands;
mod pages;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use argo_client::HttpBackend;
use argo_flux::{
    App, AppConfig, Backend, Bootstrap, GlobalEvent, KeyChord, Location, MemoryLocation,
    MemorySurface, OfflineBackend, RedbStorage, StateValue, Surface,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use commands::{Command, HELP};

/// ARGO explorer shell.
#[derive(Parser, Debug)]
#[command(name = "argo", about = "ARGO ocean-data explorer shell")]
struct Cli {
    /// Path to the config file. Missing file means defaults.
    #[arg(short = 'c', long = "config", default_value = "argo.toml")]
    config: PathBuf,

    /// Backend base URL (overrides the config file).
    #[arg(long = "api")]
    api: Option<String>,

    /// Work without a backend.
    #[arg(long = "offline")]
    offline: bool,

    /// redb file holding the persisted state.
    #[arg(long = "db", default_value = "argo-state.redb")]
    db: PathBuf,

    /// Initial route.
    #[arg(long = "route", default_value = "/")]
    route: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Loading configuration from {}", cli.config.display());
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(api) = &cli.api {
        config.api.base_url = api.clone();
    }

    let storage = RedbStorage::open(&cli.db)
        .with_context(|| format!("failed to open state file {}", cli.db.display()))?;

    let backend: Arc<dyn Backend> = if cli.offline || config.api.base_url.is_empty() {
        info!("running offline");
        Arc::new(OfflineBackend)
    } else {
        info!("backend at {}", config.api.base_url);
        Arc::new(HttpBackend::from_config(&config.api))
    };

    let surface = Arc::new(MemorySurface::new());
    let location = Arc::new(MemoryLocation::new(&cli.route));

    let mut boot = Bootstrap::new(config)
        .surface(surface.clone())
        .location(location.clone())
        .storage(Arc::new(storage))
        .backend(backend);
    for (path, component) in pages::routes() {
        boot = boot.route(path, component);
    }

    let app = match boot.start().await {
        Ok(app) => app,
        Err(e) => {
            println!("{}", surface.markup());
            return Err(e.into());
        }
    };

    let mut screen = Screen::new(surface);
    screen.refresh();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                if !message.is_empty() {
                    println!("{}", message);
                }
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        execute(&app, &location, command).await;
        app.router().process_pending().await;
        screen.refresh();
    }

    app.shutdown();
    Ok(())
}

async fn execute(app: &App, location: &MemoryLocation, command: Command) {
    let ctx = app.context();
    match command {
        Command::Go(path) => app.router().navigate(&path, false),
        Command::Back => {
            if !app.router().back() {
                println!("no previous page");
            }
        }
        Command::Retry => {
            app.action("retry").await;
        }
        Command::Home => {
            app.action("home").await;
        }
        Command::Get(key) => match ctx.store().get(&key) {
            Some(value) => println!("{}", value),
            None => println!("(unset)"),
        },
        Command::Set(key, value) => {
            ctx.store().set(&key, StateValue::new(value));
        }
        Command::Delete(key) => {
            ctx.store().delete(&key);
        }
        Command::Keys => {
            for key in ctx.store().keys() {
                println!("{}", key);
            }
        }
        Command::History => {
            for record in ctx.store().history() {
                println!(
                    "{} {} {} -> {}",
                    record.timestamp.format("%H:%M:%S"),
                    record.key,
                    record.old_value.map_or("∅".to_string(), |v| v.to_string()),
                    record.new_value.map_or("∅".to_string(), |v| v.to_string()),
                );
            }
        }
        Command::Lang(language) => {
            if ctx.config().i18n.supported_languages.contains(&language) {
                ctx.store().set("language", language);
                app.router().retry().await;
            } else {
                println!("unsupported language: {}", language);
            }
        }
        Command::Ask(question) => match pages::ask(ctx, &question).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => {
                ctx.notifier().error(e.user_message());
            }
        },
        Command::Region(region) => match region {
            Some(region) => {
                ctx.store().set(pages::SELECTED_REGION_KEY, region);
            }
            None => {
                ctx.store().delete(pages::SELECTED_REGION_KEY);
            }
        },
        Command::Key(chord) => match KeyChord::parse(&chord) {
            Some(chord) => {
                let label = chord.to_string();
                if !app.dispatch(GlobalEvent::Key(chord)) {
                    println!("no shortcut bound to {}", label);
                }
            }
            None => println!("not a key chord: {}", chord),
        },
        Command::Online => {
            app.dispatch(GlobalEvent::Online);
        }
        Command::Offline => {
            app.dispatch(GlobalEvent::Offline);
        }
        Command::Notes => {
            for note in ctx.notifier().list() {
                println!("#{} [{:?}] {}", note.id, note.kind, note.message);
            }
        }
        Command::Dismiss(id) => {
            if !ctx.notifier().dismiss(id) {
                println!("no notification #{}", id);
            }
        }
        Command::Status => {
            println!("location:  {}", location.current_path());
            println!("route:     {:?}", app.router().state());
            println!("component: {}", app.router().current_component().unwrap_or_default());
            println!("language:  {}", ctx.language());
            for key in ["apiConnected", "online"] {
                println!(
                    "{:<10} {}",
                    format!("{}:", key),
                    ctx.store().get(key).map_or("?".to_string(), |v| v.to_string())
                );
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

/// Prints the page when the mounted markup or title changes.
struct Screen {
    surface: Arc<MemorySurface>,
    mounts: usize,
    title: String,
}

impl Screen {
    fn new(surface: Arc<MemorySurface>) -> Self {
        Self {
            surface,
            mounts: 0,
            title: String::new(),
        }
    }

    fn refresh(&mut self) {
        let mounts = self.surface.mount_count();
        let title = self.surface.title();
        if mounts == self.mounts && title == self.title {
            return;
        }
        self.mounts = mounts;
        self.title = title;
        println!("── {} ──", self.title);
        println!("{}", self.surface.markup());
    }
}
