use clap::Parser;
use semantic_search::core::ProbePolicy;
use semantic_search::init_logging;
use semantic_search::services::HealthProbe;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "healthcheck")]
#[command(about = "Probe the service health endpoint; exits 0 when healthy")]
struct Args {
    /// Health endpoint to probe
    #[arg(long, default_value = "http://localhost:8000/health")]
    url: String,

    /// Per-probe timeout in seconds
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Keep probing on the container schedule until the service turns unhealthy
    #[arg(long)]
    watch: bool,

    /// Grace period before failures count (watch mode)
    #[arg(long, default_value_t = 15)]
    start_period: u64,

    /// Seconds between probes (watch mode)
    #[arg(long, default_value_t = 30)]
    interval: u64,

    /// Consecutive failures before unhealthy (watch mode)
    #[arg(long, default_value_t = 3)]
    retries: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    init_logging(&level, "pretty");

    let probe = match HealthProbe::new(&args.url, Duration::from_secs(args.timeout)) {
        Ok(probe) => probe,
        Err(e) => {
            eprintln!("healthcheck: cannot build client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if !args.watch {
        return match probe.check().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("healthcheck: {} failed: {}", probe.url(), e);
                ExitCode::FAILURE
            }
        };
    }

    let policy = ProbePolicy {
        start_period: Duration::from_secs(args.start_period),
        interval: Duration::from_secs(args.interval),
        timeout: Duration::from_secs(args.timeout),
        retries: args.retries,
    };
    let tracker = probe.watch(policy).await;
    eprintln!(
        "healthcheck: unhealthy after {} consecutive failures",
        tracker.consecutive_failures()
    );
    ExitCode::FAILURE
}
