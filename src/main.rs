// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, build the API client from the
//   environment and hand it to the menu loop.

use gpt4batch_cli::{api::ApiClient, config::Config, ui::main_menu};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with printed responses.
    // `RUST_LOG=gpt4batch_cli=debug` shows request payloads.
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let api = ApiClient::new(&config.base_url, &config.access_token)?;

    main_menu(api, config)?;
    Ok(())
}
