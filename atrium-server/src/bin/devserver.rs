//! Development deployment variant. When `APP_ENV` is absent the run mode
//! defaults to `development`, which turns the debug flag on.

use atrium_bootstrap::RunMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    atrium_server::run(RunMode::Development).await?;
    Ok(())
}
