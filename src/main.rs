use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use caseguard::api::{self, PgAppState};
use caseguard::batch::{self, BatchParams};
use caseguard::config::Config;
use caseguard::db::repository::TransactionStore;
use caseguard::evidence::PgEvidenceProvider;
use caseguard::neighbors::CaseIndexRetriever;
use caseguard::policy::DecisionPolicy;
use caseguard::scoring::LogisticScorer;
use caseguard::ReportAssembler;

type PgAssembler = ReportAssembler<PgEvidenceProvider, LogisticScorer, CaseIndexRetriever>;

const USAGE: &str = "usage: caseguard <report <transaction_id> [top_k] [max_distance] | batch | serve> [--config path]";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Report {
        transaction_id: i64,
        top_k: Option<usize>,
        max_distance: Option<f64>,
    },
    Batch,
    Serve,
}

#[derive(Debug, Clone, PartialEq)]
struct Cli {
    command: Command,
    config_path: String,
}

fn parse_args(args: &[String]) -> eyre::Result<Cli> {
    let mut config_path = "config.toml".to_string();
    let mut positional: Vec<&str> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            config_path = iter
                .next()
                .ok_or_else(|| eyre::eyre!("--config needs a path\n{}", USAGE))?
                .clone();
        } else {
            positional.push(arg);
        }
    }

    let command = match positional.as_slice() {
        ["report", id, rest @ ..] if rest.len() <= 2 => Command::Report {
            transaction_id: id
                .parse::<i64>()
                .map_err(|e| eyre::eyre!("Invalid transaction id '{}': {}", id, e))?,
            top_k: rest
                .first()
                .map(|v| v.parse::<usize>())
                .transpose()
                .map_err(|e| eyre::eyre!("Invalid top_k: {}", e))?,
            max_distance: rest
                .get(1)
                .map(|v| v.parse::<f64>())
                .transpose()
                .map_err(|e| eyre::eyre!("Invalid max_distance: {}", e))?,
        },
        ["batch"] => Command::Batch,
        ["serve"] => Command::Serve,
        _ => return Err(eyre::eyre!("{}", USAGE)),
    };

    Ok(Cli {
        command,
        config_path,
    })
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=debug for more)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let config = Config::load(&cli.config_path)?;
    tracing::info!(
        policy = config.policy.version.as_str(),
        "Configuration loaded from {}",
        cli.config_path
    );

    let assembler = build_assembler(&config).await?;

    match cli.command {
        Command::Report {
            transaction_id,
            top_k,
            max_distance,
        } => {
            let report = assembler
                .build_report(
                    transaction_id,
                    top_k.unwrap_or(config.policy.default_top_k),
                    max_distance.unwrap_or(config.policy.default_max_distance),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Batch => run_batch(&config, &assembler).await?,
        Command::Serve => serve(&config, assembler).await?,
    }

    Ok(())
}

async fn build_assembler(config: &Config) -> eyre::Result<PgAssembler> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;

    tracing::info!(table = %config.database.table, "Connected to PostgreSQL");

    let store = TransactionStore::new(pool, config.database.table.clone());
    let evidence = PgEvidenceProvider::new(store.clone(), config.database.amount_high_threshold);
    let scorer = LogisticScorer::load(&config.model.artifact_path, store)?;
    let retriever =
        CaseIndexRetriever::open(&config.retrieval.index_dir, &config.retrieval.collection)?;

    Ok(ReportAssembler::new(
        evidence,
        scorer,
        retriever,
        DecisionPolicy::for_version(config.policy.version),
    ))
}

async fn run_batch(config: &Config, assembler: &PgAssembler) -> eyre::Result<()> {
    let cases = batch::load_labeled_cases(
        &config.batch.data_path,
        &config.batch.id_col,
        &config.batch.label_col,
    )?;
    let sample = batch::sample_cases(&cases, config.batch.sample_size, config.batch.seed);
    let params = BatchParams {
        top_k: config.policy.default_top_k,
        max_distance: config.policy.default_max_distance,
        concurrency: config.batch.concurrency,
    };

    tracing::info!(
        sample = sample.len(),
        seed = config.batch.seed,
        concurrency = params.concurrency,
        "Starting batch evaluation. Press Ctrl+C to stop."
    );

    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown.clone());

    let summary = batch::run_batch(assembler, &sample, params, &shutdown).await?;
    println!(
        "{}",
        summary.render(&params, &config.batch.data_path, config.batch.debug)
    );
    Ok(())
}

fn spawn_ctrl_c_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received, stopping...");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });
}

async fn serve(config: &Config, assembler: PgAssembler) -> eyre::Result<()> {
    if !config.api.enabled {
        return Err(eyre::eyre!("API is disabled in config ([api] enabled = false)"));
    }

    let state: PgAppState = api::AppState {
        assembler,
        default_top_k: config.policy.default_top_k,
        default_max_distance: config.policy.default_max_distance,
    };

    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown.clone());

    tracing::info!("Case decision API starting. Press Ctrl+C to stop.");
    api::serve(state, &config.api.host, config.api.port, shutdown).await?;

    tracing::info!("Case decision API stopped gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_report_command() {
        let cli = parse_args(&args(&["report", "2987000", "10", "0.3"])).unwrap();
        assert_eq!(cli.config_path, "config.toml");
        assert_eq!(
            cli.command,
            Command::Report {
                transaction_id: 2987000,
                top_k: Some(10),
                max_distance: Some(0.3),
            }
        );

        let cli = parse_args(&args(&["report", "5"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Report {
                transaction_id: 5,
                top_k: None,
                max_distance: None,
            }
        );
    }

    #[test]
    fn test_parse_config_flag_anywhere() {
        let cli = parse_args(&args(&["--config", "prod.toml", "serve"])).unwrap();
        assert_eq!(cli.command, Command::Serve);
        assert_eq!(cli.config_path, "prod.toml");

        let cli = parse_args(&args(&["batch", "--config", "eval.toml"])).unwrap();
        assert_eq!(cli.command, Command::Batch);
        assert_eq!(cli.config_path, "eval.toml");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["report"])).is_err());
        assert!(parse_args(&args(&["report", "abc"])).is_err());
        assert!(parse_args(&args(&["serve", "--config"])).is_err());
        assert!(parse_args(&args(&["report", "1", "2", "0.1", "extra"])).is_err());
    }
}
