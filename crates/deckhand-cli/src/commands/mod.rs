//! CLI command implementations.

pub mod render;

use anyhow::{Context, Result};
use deckhand_config::load_application;
use tracing::info;

pub async fn validate(path: &str, platform: Option<&str>, cluster: &str) -> Result<()> {
    let application =
        load_application(path).with_context(|| format!("invalid application in {}", path))?;

    println!("Application '{}' is valid", application.name);
    println!("  namespace:   {}", application.namespace());
    println!("  services:    {}", application.services.join(", "));
    println!("  deployments: {}", application.deployments.len());
    println!("  cicd:        {}", application.cicd);

    if let Some(platform) = platform {
        let plan = render::compose(&application, platform, cluster).await?;
        info!(resources = plan.len(), cluster = %cluster, "Composition succeeded");
        println!(
            "Composes into {} resources on {} (cluster {})",
            plan.len(),
            platform,
            cluster
        );
    }

    Ok(())
}
