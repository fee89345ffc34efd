use anyhow::Context;
use durian_runtuh::{storage, Config};
use tracing_subscriber::EnvFilter;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin migrate\n\
         \n\
         Applies pending schema migrations to DATABASE_URL and exits.\n\
         Requires env vars:\n\
           DATABASE_URL (postgres://... or sqlite:...)\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("durian_runtuh=info")),
        )
        .init();

    let store = storage::connect(&config.database_url, 1)
        .await
        .context("failed to connect to DATABASE_URL")?;
    let report = store.migrate().await?;

    if report.applied.is_empty() {
        println!("> Schema already at version {}", report.current_version);
    } else {
        for m in &report.applied {
            println!("> Applied v{}: {}", m.version, m.description);
        }
        println!("> Schema now at version {}", report.current_version);
    }
    Ok(())
}
