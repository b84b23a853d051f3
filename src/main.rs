// Entrypoint for the CLI application.
// - Parses flags, sets up logging, loads configuration.
// - Hands the client, resolver and job to `app::run` and turns the outcome
//   into the process exit code calling scripts rely on.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use alloy_attach::api::ApiClient;
use alloy_attach::app::{self, ExitStatus, UploadJob};
use alloy_attach::config::AppConfig;
use alloy_attach::machine::MachineIdentity;
use alloy_attach::resolver::ComputerResolver;
use alloy_attach::ui;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "alloy-attach",
    version,
    about = "Attach a file to this machine's computer record in Alloy Navigator"
)]
struct Cli {
    /// File to upload as an attachment
    file: PathBuf,
    /// Attachment description
    #[arg(long, short)]
    description: Option<String>,
    /// Config file (default: ./alloy-attach.toml, then the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    client_id: Option<String>,
    /// Attempts per API call; 0 or negative retries forever
    #[arg(long, allow_hyphen_values = true)]
    max_tries: Option<i64>,
    #[arg(long)]
    retry_delay_secs: Option<u64>,
    /// Use this serial number instead of asking the operating system
    #[arg(long)]
    serial: Option<String>,
    /// File written by the audit agent that holds this machine's audit id
    #[arg(long)]
    audit_id_file: Option<PathBuf>,
    /// Print the matching record id and exit without uploading
    #[arg(long, default_value_t = false)]
    resolve_only: bool,
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Append log lines to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        eprintln!("Failed to set up logging: {:#}", e);
        return ExitStatus::Configuration.into();
    }

    match try_main(cli) {
        Ok(status) => status.into(),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "run aborted");
            eprintln!("Error: {:#}", e);
            ExitStatus::Configuration.into()
        }
    }
}

fn try_main(cli: Cli) -> anyhow::Result<ExitStatus> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    if config.api.client_secret.is_none() {
        config.api.client_secret = ui::prompt_secret()?;
    }

    let machine = MachineIdentity::detect(cli.serial.clone(), config.audit.id_file.as_deref())
        .context("Failed to identify this machine")?;
    let mut client = ApiClient::from_config(&config)?;
    let resolver = ComputerResolver::new(config.computer.clone());
    let job = UploadJob {
        file: cli.file.clone(),
        description: cli
            .description
            .clone()
            .unwrap_or_else(|| config.attachment.description.clone()),
        resolve_only: cli.resolve_only,
    };

    let spinner = ui::spinner(if job.resolve_only { "Searching..." } else { "Uploading..." });
    let outcome = app::run(&mut client, &resolver, &machine, &job);
    spinner.finish_and_clear();

    ui::report(&outcome);
    Ok(outcome.exit_status())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(url) = &cli.base_url {
        config.api.base_url = Some(url.clone());
    }
    if let Some(id) = &cli.client_id {
        config.api.client_id = Some(id.clone());
    }
    if let Some(tries) = cli.max_tries {
        config.api.max_tries = tries;
    }
    if let Some(delay) = cli.retry_delay_secs {
        config.api.retry_delay_secs = delay;
    }
    if let Some(file) = &cli.audit_id_file {
        config.audit.id_file = Some(file.clone());
    }
}

/// `RUST_LOG` wins over `--log-level`.
fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
