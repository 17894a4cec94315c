//! Plan rendering.

use anyhow::{Context, Result};
use deckhand_compose::{Factory, PlanEngine, PlannedResource};
use deckhand_config::{load_application, load_platform};
use deckhand_core::{Application, Cluster};
use deckhand_platform::KubernetesPlatform;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Compose `application` against the platform at `platform_path` and resolve the plan.
pub async fn compose(
    application: &Application,
    platform_path: &str,
    cluster: &str,
) -> Result<Vec<PlannedResource>> {
    let (_, plan) = compose_with_summary(application, platform_path, cluster).await?;
    Ok(plan)
}

async fn compose_with_summary(
    application: &Application,
    platform_path: &str,
    cluster: &str,
) -> Result<(serde_json::Value, Vec<PlannedResource>)> {
    let config = load_platform(platform_path)
        .with_context(|| format!("invalid platform in {}", platform_path))?;
    let platform = KubernetesPlatform::new(config);
    info!(platform = %platform.name(), cluster = %cluster, "Loaded platform");

    let engine = Arc::new(PlanEngine::new());
    let cluster = Cluster::new(cluster, engine.clone());
    let factory = Factory::new(Arc::new(platform));

    let composition = factory
        .define_application(application, &cluster)
        .with_context(|| format!("failed to compose application '{}'", application.name))?;
    let plan = engine
        .apply()
        .await
        .context("failed to resolve resource plan")?;

    Ok((composition.summary(), plan))
}

pub async fn render(path: &str, platform_path: &str, cluster: &str) -> Result<()> {
    let application =
        load_application(path).with_context(|| format!("invalid application in {}", path))?;

    let (summary, plan) = compose_with_summary(&application, platform_path, cluster).await?;
    info!(application = %application.name, resources = plan.len(), "Rendered plan");

    let output = json!({
        "application": application.name,
        "cluster": cluster,
        "composition": summary,
        "resources": plan,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
