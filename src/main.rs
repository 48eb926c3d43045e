use anyhow::Result;
use clap::Parser;
use log::{error, info};

use survey_reports::cli::{Cli, Commands};
use survey_reports::commands::{generate_command, ingest_command, render_command, reset_command};
use survey_reports::config::Settings;

fn init_logging(log_file: Option<&std::path::Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        // Truncate on each run
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Commands::Generate => {
            generate_command(&settings).await?;
        }
        Commands::Reset { identifier, generate } => {
            reset_command(&settings, &identifier, generate).await?;
        }
        Commands::Ingest { data, photos } => {
            ingest_command(&settings, &data, &photos).await?;
        }
        Commands::Render { template, records, out } => {
            render_command(&settings, &template, &records, &out)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Failed to open log file: {}", e);
        std::process::exit(2);
    }
    info!("Starting survey-reports");

    if let Err(e) = dispatch(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
