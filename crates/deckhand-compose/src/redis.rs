//! Built-in Redis service.
//!
//! Generates a password, installs the chart as a Helm release on fast
//! storage, and publishes a connection URL derived from both.

use deckhand_core::{
    ResourceKind, ResourceSpec, Result, ServiceConstructor, ServiceContext, ServiceResult,
    StorageTier, merge_into,
};
use serde_json::json;
use tracing::info;

const REDIS_PORT: u16 = 6379;

/// Constructor for the `redis` service.
#[derive(Debug, Clone)]
pub struct RedisService {
    pub chart_version: String,
    pub password_length: u32,
}

impl Default for RedisService {
    fn default() -> Self {
        Self {
            chart_version: "19.x".to_string(),
            password_length: 24,
        }
    }
}

impl ServiceConstructor for RedisService {
    fn construct(&self, ctx: &ServiceContext<'_>) -> Result<ServiceResult> {
        let release = format!("{}-redis", ctx.application_name);
        let namespace = ctx.namespace.to_string();
        let storage_class = ctx
            .context
            .platform
            .storage_class(ctx.cluster, StorageTier::Fast)?;

        let password_name = format!("{}-password", release);
        let mut password_body =
            ResourceKind::RandomPassword.manifest(&password_name, Some(&namespace));
        merge_into(
            &mut password_body,
            json!({ "spec": { "length": self.password_length, "special": false } }),
        );
        let password = ctx.cluster.emit(
            ResourceSpec::new(ResourceKind::RandomPassword, password_name)
                .in_namespace(&namespace)
                .with_body(password_body),
        )?;
        let secret = password.output_string("/result");

        let base = ResourceKind::HelmRelease.manifest(&release, Some(&namespace));
        let chart_version = self.chart_version.clone();
        let release_body = secret.map(move |password| {
            let mut body = base;
            merge_into(
                &mut body,
                json!({
                    "spec": {
                        "chart": {
                            "spec": {
                                "chart": "redis",
                                "version": chart_version,
                                "sourceRef": { "kind": "HelmRepository", "name": "bitnami" },
                            },
                        },
                        "values": {
                            "architecture": "standalone",
                            "auth": { "password": password },
                            "master": { "persistence": { "storageClass": storage_class } },
                        },
                    },
                }),
            );
            body
        });
        let helm = ctx.cluster.emit(
            ResourceSpec::new(ResourceKind::HelmRelease, &release)
                .in_namespace(&namespace)
                .with_deferred_body(release_body)
                .depends_on(&password.reference),
        )?;

        let host = helm.output_string("/metadata/name").map(move |name| {
            format!("{}-master.{}.svc.cluster.local", name, namespace)
        });
        let url = secret
            .zip(&host)
            .map(|(password, host)| format!("redis://:{}@{}:{}", password, host, REDIS_PORT));

        info!(application = %ctx.application_name, release = %release, "Composed redis");

        Ok(ServiceResult::new()
            .with_output("url", url)
            .with_output("host", host)
            .with_output("password", secret)
            .with_resource(password.reference)
            .with_resource(helm.reference))
    }
}
