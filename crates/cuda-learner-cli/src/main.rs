use anyhow::{Context, Result};
use clap::Parser;
use cuda_learner_cli::run_learner;
use cuda_learner_core::{config::ConfigLoader, create_executor, ExecutorKind, LearnerConfig};
use log::LevelFilter;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(
    name = "cuda-learner",
    author,
    version = "0.1.0",
    about = "Compile and run a CUDA hello-world inside a GPU sandbox"
)]
struct Cli {
    #[clap(long, short, help = "YAML configuration file (built-in defaults when omitted)")]
    config: Option<String>,

    #[clap(long, help = "Executor backend: docker or local (overrides the configuration file)")]
    executor: Option<String>,

    #[clap(long, short, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the sandbox output
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .target(env_logger::Target::Stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            log::info!("Loading configuration from file: {}", path);
            ConfigLoader::from_file(path).await?
        }
        None => LearnerConfig::default(),
    };

    if let Some(executor) = &cli.executor {
        config.executor = executor.parse::<ExecutorKind>()?;
    }

    let executor = create_executor(config.executor)
        .await
        .with_context(|| format!("Failed to initialize {:?} executor", config.executor))?;

    // A failed compile has been printed and still exits 0.
    run_learner(Arc::from(executor), &config, &mut tokio::io::stdout()).await?;
    Ok(())
}
