use stagecast_api::setup::{self, WorkerMode};
use stagecast_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = setup::initialize_app(config.clone(), WorkerMode::Run).await?;

    setup::server::start_server(&config, router).await?;

    state.task_queue.shutdown().await;
    Ok(())
}
