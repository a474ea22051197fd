mod cli;
mod core;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppConfig;
use crate::core::error::ReportError;

#[derive(Parser, Debug)]
#[command(name = "ga4xl", about = "Export Google Analytics 4 reports to Excel", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: $XDG_CONFIG_HOME/ga4xl/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for the run summary (text|json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Debug logging to stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a report and write it to a workbook
    Report(cli::report_cmd::ReportArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
    /// Print the effective configuration
    Show,
}

fn init_logging(verbose: bool, quiet: bool) {
    let fallback = if verbose {
        "info,ga4xl=debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn output_options(cli: &Cli, config: &AppConfig) -> cli::output::OutputOptions {
    let format = if cli.json {
        cli::output::OutputFormat::Json
    } else {
        cli.format
            .as_deref()
            .and_then(cli::output::OutputFormat::parse)
            .or_else(|| cli::output::OutputFormat::parse(&config.settings.default_format))
            .unwrap_or(cli::output::OutputFormat::Text)
    };
    cli::output::OutputOptions {
        format,
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &config.settings.color),
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);

    if let Some(Commands::Config { action }) = &cli.command {
        match action {
            ConfigAction::Init => return cli::config_cmd::init(&config_path),
            ConfigAction::Check => return cli::config_cmd::check(&config_path),
            ConfigAction::Show => {}
        }
    }

    let mut config = AppConfig::load_from(&config_path).map_err(ReportError::from)?;
    config.apply_env();
    let opts = output_options(&cli, &config);

    match cli.command {
        Some(Commands::Config { .. }) => cli::config_cmd::show(&config, &opts),
        Some(Commands::Report(args)) => {
            args.apply(&mut config);
            cli::report_cmd::run(&config, &opts).await
        }
        None => cli::report_cmd::run(&config, &opts).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(err) = dispatch(cli).await {
        match err.downcast_ref::<ReportError>() {
            Some(report) => {
                eprintln!("error [{}]: {}", report.stage(), report);
                std::process::exit(report.exit_code());
            }
            None => {
                eprintln!("error: {:#}", err);
                std::process::exit(1);
            }
        }
    }
}
