use gesture_stub::{App, StubBehavior, StubState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "127.0.0.1:8090";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_level(true))
        .init();

    let addr = std::env::var("STUB_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.into());

    // STUB_LABEL pins the answer; otherwise a random known gesture is returned.
    let behavior = match std::env::var("STUB_LABEL") {
        Ok(label) => StubBehavior::Fixed(label),
        Err(_) => StubBehavior::Random,
    };
    tracing::info!("Answering with {:?}", behavior);

    App::new(StubState::new(behavior), &addr).run().await?;

    Ok(())
}
