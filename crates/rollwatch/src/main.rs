//! rollwatch — records whether a service's rollout succeeded.
//!
//! Watches the Argo CD application of a service until the rollout of the
//! expected commit settles, checks the new pods for restarted containers
//! and writes `Skip`, `True` or `False` to Redis under
//! `{BUILD_NUMBER}-{service}` for the pipeline to pick up.
//!
//! # Usage
//!
//! ```text
//! rollwatch check checkout --config /etc/rollwatch.toml
//! rollwatch verdict checkout --build 482
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit;

use commands::Overrides;
use exit::Outcome;

const DEFAULT_LOG_FILTER: &str = "info,rollwatch=debug";

#[derive(Parser)]
#[command(
    name = "rollwatch",
    about = "Rollout verdicts for Argo CD applications",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a rollout and persist its verdict.
    ///
    /// Cluster access and the build identity are read from NAMESPACE,
    /// K8S_KUBECONFIG, BUILD_NUMBER, COMMIT_HASH_GITOPS, ARGOCD_KEY,
    /// ARGOCD_APP_PROJECT_NAME and ARGOCD_SERVER.
    Check {
        /// Service (Argo Rollout) name.
        service: String,
        /// TOML file with polling, retry, cache and tool settings.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Give up if the rollout has not settled after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Redis address (host:port), overriding the config file.
        #[arg(long)]
        redis: Option<String>,
        /// Evaluate and log the verdict without writing it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the verdict stored for a build. Exits 1 when there is none.
    Verdict {
        /// Service (Argo Rollout) name.
        service: String,
        /// Build number the verdict was recorded under.
        #[arg(short, long)]
        build: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        redis: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = match cli.command {
        Commands::Check {
            service,
            config,
            timeout_secs,
            redis,
            dry_run,
        } => {
            let overrides = Overrides {
                timeout_secs,
                redis,
            };
            commands::check::check(&service, config.as_deref(), &overrides, dry_run).await
        }
        Commands::Verdict {
            service,
            build,
            config,
            redis,
        } => {
            let overrides = Overrides {
                timeout_secs: None,
                redis,
            };
            commands::verdict::verdict(&service, &build, config.as_deref(), &overrides).await
        }
    };

    let outcome = result.unwrap_or_else(|err| {
        error!("{err:#}");
        Outcome::from_error(&err)
    });
    outcome.into()
}
