// Entrypoint for the interactive client.
// - Keeps `main` small: set up logging, build a client from the
//   environment and hand it to the menu loop.
// - Returns `anyhow::Result` so setup failures print with context.

use anyhow::Context;
use api_test_client::ui::{main_menu, prompt_login_name};
use api_test_client::{ApiBase, ClientConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // `API_BASE_URL`, `API_LOGIN_TYPE`, `API_LOGIN_NAME`, `API_PASSWORD`.
    // See `ClientConfig::from_env`.
    let mut config = ClientConfig::from_env();
    if config.login_name.is_empty() {
        config.login_name = prompt_login_name(&config.login_type)?;
    }
    let api = ApiBase::new(config).context("Failed to build API client")?;

    // Blocks until the user picks "Exit".
    main_menu(api)?;
    Ok(())
}
