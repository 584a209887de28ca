//! Quorum Hub binary
//!
//! Waits for the configured validators to enroll, distributes the genesis,
//! and exits once every participant has left.

use quorum_hub::{HubConfig, HubNode, HubOutcome};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quorum_hub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quorum Hub");

    let config = HubConfig::from_env()?;
    let node = HubNode::new(config)?;

    match node.run().await? {
        HubOutcome::Completed => {
            tracing::info!("Bootstrap completed");
            Ok(())
        }
        HubOutcome::Abandoned => Err("bootstrap abandoned before quorum".into()),
    }
}
