use clap::{Parser, Subcommand};
use env_logger::Env;
use review_scout::{
    configuration::get_configuration,
    startup::{run_extraction, run_load},
};

#[derive(Parser)]
#[command(name = "review_scout", about = "Bank branch review scraper and staging loader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the configured banks into the pending artifact
    Extract,
    /// Load the pending artifact into the staging table
    Load,
    /// Extract, then load
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let configuration = get_configuration()?;

    let result = match cli.command {
        Commands::Extract => run_extraction(&configuration).await.map(|_| ()),
        Commands::Load => load(&configuration).await,
        Commands::Run => match run_extraction(&configuration).await {
            Ok(_) => load(&configuration).await,
            Err(e) => Err(e),
        },
    };

    if let Err(ref e) = result {
        log::error!("Run failed: {:?}", e);
    }
    result
}

async fn load(configuration: &review_scout::configuration::Settings) -> anyhow::Result<()> {
    let result = run_load(configuration).await?;
    match result.committed {
        true => Ok(()),
        false => anyhow::bail!(
            "{} staging rows failed, transaction rolled back",
            result.failures.len()
        ),
    }
}
