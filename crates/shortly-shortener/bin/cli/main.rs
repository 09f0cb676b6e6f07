mod cli;

use crate::cli::{Cli, Command, LogFormat};
use clap::Parser;
use shortly_core::{Shortener, Storage};
use shortly_generator::RandomGenerator;
use shortly_shortener::ShortenerService;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Service = ShortenerService<dyn Storage, RandomGenerator>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::try_parse()?;
    init_tracing(&cli.log_level, cli.log_format);

    let config = cli.config();
    info!(base_url = %config.base_url, "starting shortly");
    let service = ShortenerService::from_config(&config).await?;

    let result = run(&service, &config.base_url, cli.command).await;
    service.close().await;
    result
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(
    service: &Service,
    base_url: &str,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Encode { user, url } => {
            let encoded = service.encode_url(user, &url).await?;
            if encoded.conflict {
                info!(url, "url was already shortened");
            }
            println!("{}", encoded.short_url);
        }
        Command::Batch { user, entries } => {
            let requested = entries.len();
            let results = service.batch_encode_url(user, entries).await;
            if results.len() < requested {
                warn!(requested, shortened = results.len(), "some urls were not shortened");
            }
            for result in results {
                println!("{}\t{}", result.correlation_id, result.short_url);
            }
        }
        Command::Decode { code } => {
            println!("{}", service.decode_url(&code).await?);
        }
        Command::List { user } => {
            for entry in service.get_user_urls(user).await {
                println!("{}\t{}", entry.code.to_url(base_url), entry.url);
            }
        }
        Command::Delete { user, codes } => {
            service.schedule_delete(user, codes).await?;
        }
        Command::Token => {
            let (user_id, token) = service.create_token()?;
            println!("{user_id}\t{token}");
        }
        Command::Count => {
            println!("{}", service.count().await?);
        }
        Command::Truncate => {
            service.clear().await?;
        }
    }
    Ok(())
}
