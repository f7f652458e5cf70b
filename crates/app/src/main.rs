use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use adaptive_metronome_core::{AppConfig, ControlSurfaceState, EditorCoordinator, EditorEvent};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_fatal() => {
            tracing::error!(%err, "invalid editor request");
            ExitCode::from(2)
        }
        Err(err) => {
            tracing::error!(%err, "operation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> adaptive_metronome_core::Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Export {
            preset,
            users,
            output,
        } => run_export(&config, preset.as_deref(), users, output),
        Commands::Import { input, json } => run_import(&config, &input, json),
        Commands::Template => run_template(&config),
    }
}

fn run_export(
    config: &AppConfig,
    preset: Option<&Path>,
    users: Option<usize>,
    output: Option<PathBuf>,
) -> adaptive_metronome_core::Result<()> {
    tracing::info!(?preset, ?users, "exporting player parameters");

    let mut surface = match preset {
        Some(path) => ControlSurfaceState::load(path)?,
        None => default_surface(config)?,
    };
    if let Some(users) = users {
        surface.set_user_players(users)?;
    }

    let mut editor = EditorCoordinator::with_config(surface, &config.editor)?;
    editor.sync_player_count()?;
    editor.handle(EditorEvent::CommitRequested)?;

    match output.or_else(|| config.export.default_path.clone()) {
        Some(path) => editor.handle(EditorEvent::ExportRequested(path)),
        None => editor.export_to(&mut io::stdout().lock()),
    }
}

fn run_import(config: &AppConfig, input: &Path, json: bool) -> adaptive_metronome_core::Result<()> {
    tracing::info!(?input, "importing player parameters");

    let mut editor = EditorCoordinator::with_config(default_surface(config)?, &config.editor)?;
    editor.handle(EditorEvent::ImportRequested(input.to_path_buf()))?;

    if json {
        println!("{}", editor.store().to_json()?);
        Ok(())
    } else {
        editor.export_to(&mut io::stdout().lock())
    }
}

fn run_template(config: &AppConfig) -> adaptive_metronome_core::Result<()> {
    println!("{}", default_surface(config)?.to_json()?);
    Ok(())
}

fn default_surface(config: &AppConfig) -> adaptive_metronome_core::Result<ControlSurfaceState> {
    let mut surface = ControlSurfaceState::default();
    surface.set_user_players(config.editor.initial_user_players)?;
    Ok(surface)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Adaptive Metronome player parameter tool", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Commit a control-surface preset and export the players as CSV.
    Export {
        /// JSON preset holding the control positions.
        #[arg(short, long)]
        preset: Option<PathBuf>,
        /// Number of leading user players, overriding the preset.
        #[arg(short, long)]
        users: Option<usize>,
        /// Destination CSV file. Falls back to the configured path, then stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a previously exported CSV file and print the players.
    Import {
        /// CSV file to read.
        input: PathBuf,
        /// Print the players as JSON instead of CSV.
        #[arg(long)]
        json: bool,
    },
    /// Print the default control-surface preset as JSON.
    Template,
}
