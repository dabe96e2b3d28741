use clap::Parser;
use depot_fetch::app::ports::{AppCatalogPort, ClientLocatorPort, RepositoryApiPort};
use depot_fetch::config::Config;
use depot_fetch::infra::client_locator::SteamLocator;
use depot_fetch::infra::github_client::GithubClient;
use depot_fetch::infra::store_client::StoreClient;
use depot_fetch::observability::init_logging;
use depot_fetch::pipeline::acquirer::FileAcquirer;
use depot_fetch::pipeline::aggregator::ConfigAggregator;
use depot_fetch::pipeline::orchestrator::{lookup_app_id, IdentifierReport, RunStatus};
use depot_fetch::pipeline::rate_limiter::{RateBudget, RateLimiter};
use depot_fetch::pipeline::resolver::RepositoryResolver;
use depot_fetch::pipeline::{InvocationOutcome, InvocationReport, PipelineOrchestrator};
use depot_fetch::types::CandidateRepository;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "depot-fetch")]
#[command(about = "Fetch depot manifests and keys for a Steam app and its DLC")]
#[command(version)]
struct Cli {
    /// Steam app id or name (prompted when omitted)
    #[arg(short = 'a', long = "appid")]
    app: Option<String>,

    /// GitHub API access token
    #[arg(short = 'k', long = "key")]
    token: Option<String>,

    /// Use only this owner/name repository instead of the configured list
    #[arg(short = 'r', long = "repo")]
    repo: Option<CandidateRepository>,

    /// Pin the recorded manifest versions
    #[arg(short = 'f', long)]
    fixed: bool,

    /// Verbose logging
    #[arg(short = 'd', long)]
    debug: bool,

    /// Configuration file
    #[arg(short = 'c', long, default_value = "config.toml")]
    config: PathBuf,

    /// Steam install directory
    #[arg(long)]
    steam_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    init_logging(cli.debug);

    let interactive = cli.interactive();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    };
    // Console stays open after an interactive run.
    if interactive {
        let _ = prompt("\nPress Enter to exit...");
    }
    code
}

impl Cli {
    fn interactive(&self) -> bool {
        self.app.is_none()
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(&cli.config)?;
    config.apply_env();
    if let Some(token) = cli.token {
        config.github.token = Some(token);
    }
    if let Some(dir) = cli.steam_path {
        config.client.install_dir = Some(dir);
    }
    let candidates = match cli.repo {
        Some(repo) => vec![repo],
        None => config.repositories.candidates.clone(),
    };
    if candidates.is_empty() {
        anyhow::bail!("no candidate repositories configured");
    }

    let locator = SteamLocator::new(config.client.install_dir.clone());
    let Some(client_dir) = locator.locate() else {
        error!("❌ Steam install directory not found");
        return Ok(ExitCode::FAILURE);
    };
    info!("🎮 Using Steam install at {}", client_dir.display());

    let budget = RateBudget::new();
    let github: Arc<dyn RepositoryApiPort> =
        Arc::new(GithubClient::new(&config.github, budget.clone())?);
    let catalog: Arc<dyn AppCatalogPort> = Arc::new(StoreClient::new(
        &config.store,
        Duration::from_secs(config.github.timeout_seconds),
    )?);
    if config.github.token.is_none() {
        warn!("⚠️ No GitHub token given, using the unauthenticated quota");
    }

    let query = match cli.app {
        Some(query) => query,
        None => prompt("Enter a game name or app id: ")?,
    };
    let Some(app_id) = lookup_app_id(catalog.as_ref(), &query).await else {
        error!("❌ Could not find an app id for \"{}\"", query.trim());
        return Ok(ExitCode::FAILURE);
    };

    let orchestrator = PipelineOrchestrator::new(
        RateLimiter::new(github.clone(), budget),
        RepositoryResolver::new(github.clone(), config.repositories.probe),
        FileAcquirer::new(github, config.acquisition.max_concurrency),
        catalog,
        ConfigAggregator::for_client(&client_dir),
        candidates,
        cli.fixed,
    );

    let report = tokio::select! {
        result = orchestrator.run(&app_id) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("❗ Interrupted, stopping");
            return Ok(ExitCode::FAILURE);
        }
    };

    print_summary(&report);
    Ok(match report.outcome() {
        InvocationOutcome::Complete | InvocationOutcome::Partial => ExitCode::SUCCESS,
        InvocationOutcome::Failed => ExitCode::FAILURE,
    })
}

fn prompt(message: &str) -> anyhow::Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", message)?;
    stdout.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_summary(report: &InvocationReport) {
    println!("\n📊 Results:");
    print_line(&report.primary);
    for dependent in &report.dependents {
        print_line(dependent);
    }
    match report.outcome() {
        InvocationOutcome::Complete => println!("✅ Done"),
        InvocationOutcome::Partial => println!("⚠️  Done with warnings"),
        InvocationOutcome::Failed => println!("❌ Failed"),
    }
}

fn print_line(report: &IdentifierReport) {
    match &report.status {
        RunStatus::Complete => {
            println!("   ✅ {}: {} artifacts", report.label(), report.succeeded)
        }
        RunStatus::Partial { failed } => println!(
            "   ⚠️  {}: {} artifacts, {} failed",
            report.label(),
            report.succeeded,
            failed
        ),
        RunStatus::Failed { error, .. } => println!("   ❌ {}: {}", report.label(), error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_only_when_prompted() {
        let prompted = Cli::try_parse_from(["depot-fetch"]).unwrap();
        assert!(prompted.interactive());

        let scripted = Cli::try_parse_from(["depot-fetch", "-a", "480", "-f"]).unwrap();
        assert!(!scripted.interactive());
        assert!(scripted.fixed);
    }
}
