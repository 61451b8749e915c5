use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use clap::Parser;
use fixture_loader::config::{AppConfig, CliConfig, FileConfig};
use fixture_loader::{FixturesType, LoadCommand, LoadOptions, LoadOutcome};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let resolved = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if resolved.is_absolute() {
        return Ok(resolved);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(resolved))
}

fn styles() -> Styles {
    let heading = Style::new()
        .bold()
        .fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

/// Load data fixtures.
#[derive(Parser, Debug)]
#[command(name = "load-fixtures", styles = styles())]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database the fixtures are applied to.
    #[clap(long, value_parser = parse_path)]
    pub database: Option<PathBuf>,

    /// Application root directory, scanned as the "App" module.
    #[clap(long, value_parser = parse_path)]
    pub root_dir: Option<PathBuf>,

    /// Name of the table recording applied fixtures.
    #[clap(long)]
    pub table: Option<String>,

    /// Select fixtures type to be loaded.
    #[clap(long, value_enum, default_value_t = FixturesType::Main)]
    pub fixtures_type: FixturesType,

    /// Outputs list of fixtures without applying them.
    #[clap(long)]
    pub dry_run: bool,

    /// A list of module names to load data from.
    #[clap(long)]
    pub bundles: Vec<String>,

    /// A list of module names whose fixtures should be skipped.
    #[clap(long)]
    pub exclude: Vec<String>,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        database: cli_args.database,
        root_dir: cli_args.root_dir,
        table: cli_args.table,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let options = LoadOptions {
        fixtures_type: cli_args.fixtures_type,
        dry_run: cli_args.dry_run,
        bundles: cli_args.bundles,
        exclude: cli_args.exclude,
    };

    let mut command = LoadCommand::new(config);
    let mut conn = command
        .open_connection()
        .context("Failed to open fixtures database")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match command.run(&mut conn, &options, &mut out) {
        Ok(LoadOutcome::NothingToLoad) => {
            info!("Nothing to load, all {} fixtures are applied", options.fixtures_type);
        }
        Ok(LoadOutcome::Listed(names)) => {
            info!("{} fixtures would be loaded", names.len());
        }
        Ok(LoadOutcome::Applied(report)) => {
            info!(
                "Loaded {} fixtures ({} skipped)",
                report.applied.len(),
                report.skipped.len()
            );
        }
        Err(e) => {
            error!("Loading fixtures failed: {}", e);
            writeln!(out)?;
            writeln!(out, "{}", e)?;
            out.flush()?;
            std::process::exit(e.exit_code());
        }
    }
    Ok(())
}
