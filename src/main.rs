use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};

use graph_token_manager::auth::{needs_renewal, TokenCoordinator};
use graph_token_manager::config::{Command, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level; stderr keeps stdout for tokens
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(
        "Token store: {}, endpoint: {}, test mode: {}",
        config.auth.token_store_path.display(),
        config.auth.token_endpoint,
        config.auth.test_mode
    );

    let coordinator = TokenCoordinator::new(&config.auth)
        .context("Failed to initialize token coordinator")?;

    match config.command {
        Command::Status => print_status(&coordinator).await,
        Command::Token => match coordinator.get_access_token().await {
            Ok(Some(token)) => {
                println!("{}", token);
                Ok(())
            }
            Ok(None) => anyhow::bail!("Not authenticated. Run `graph-token authorize` first."),
            Err(e) => Err(e).context("Failed to obtain a valid access token"),
        },
        Command::TestLogin => {
            let set = coordinator
                .create_test_tokens()
                .await
                .context("Failed to store test tokens")?;
            println!("Test tokens stored (expires {})", format_expiry(set.expires_at));
            Ok(())
        }
        Command::Authorize { code, redirect_uri } => {
            // The explicit authenticate flow is the one place provider error text is shown
            coordinator
                .complete_authorization(&code, &redirect_uri)
                .await
                .context("Authorization failed")?;
            println!(
                "Authenticated. Credentials stored at {}",
                config.auth.token_store_path.display()
            );
            Ok(())
        }
    }
}

/// Binary authenticated / not authenticated report from the raw record
async fn print_status(coordinator: &TokenCoordinator) -> Result<()> {
    match coordinator.load_token_cache().await {
        Ok(Some(set)) => {
            println!("Authenticated");
            println!("  Access token expires: {}", format_expiry(set.expires_at));
            if needs_renewal(Some(&set)) {
                println!("  Access token will be renewed on next use");
            }
        }
        Ok(None) => println!("Not authenticated"),
        Err(e) => {
            tracing::debug!("Status check could not read token record: {}", e);
            println!("Not authenticated");
        }
    }
    Ok(())
}

fn format_expiry(expires_at: Option<i64>) -> String {
    expires_at
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}
