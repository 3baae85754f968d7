//! Production deployment variant. When `APP_ENV` is absent the run mode
//! defaults to `production`.

use atrium_bootstrap::RunMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    atrium_server::run(RunMode::Production).await?;
    Ok(())
}
