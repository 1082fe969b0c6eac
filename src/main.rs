//! lemonline - event-driven status line for lemonbar
//!
//! Writes status lines to stdout; diagnostics go to stderr through `RUST_LOG`.

use anyhow::{Context, Result};
use lemonline::config::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout is reserved for the status line
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Settings::default();
    let mut mux = lemonline::bootstrap(&settings, std::io::stdout())
        .await
        .context("cannot start the status line")?;

    mux.run().await.context("status line stopped")?;

    Ok(())
}
