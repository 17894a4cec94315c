//! Horizontal autoscaler composition.

use deckhand_core::{
    Cluster, ResourceHandle, ResourceKind, ResourceSpec, Result, ScalerSpec, merge_into,
};
use serde_json::json;
use tracing::debug;

/// An emitted autoscaler with the bounds it was built from.
#[derive(Debug, Clone)]
pub struct ComposedScaler {
    pub spec: ScalerSpec,
    pub handle: ResourceHandle,
}

/// Build a CPU utilization autoscaler for the deployment named `target`.
///
/// The bounds are passed through as given; an inverted range is left for the
/// provisioning engine to reject.
pub fn compose_scaler(
    target: &str,
    spec: &ScalerSpec,
    namespace: &str,
    cluster: &Cluster,
) -> Result<ComposedScaler> {
    let kind = ResourceKind::HorizontalPodAutoscaler;
    let mut body = kind.manifest(target, Some(namespace));
    merge_into(
        &mut body,
        json!({
            "spec": {
                "scaleTargetRef": {
                    "apiVersion": ResourceKind::Deployment.api_version(),
                    "kind": ResourceKind::Deployment.kind(),
                    "name": target,
                },
                "minReplicas": spec.min_replicas,
                "maxReplicas": spec.max_replicas,
                "metrics": [{
                    "type": "Resource",
                    "resource": {
                        "name": "cpu",
                        "target": {
                            "type": "Utilization",
                            "averageUtilization": spec.target_cpu_utilization,
                        },
                    },
                }],
            },
        }),
    );

    debug!(
        deployment = target,
        min = spec.min_replicas,
        max = spec.max_replicas,
        cpu = spec.target_cpu_utilization,
        "Composing autoscaler"
    );

    let handle = cluster.emit(
        ResourceSpec::new(kind, target)
            .in_namespace(namespace)
            .with_body(body),
    )?;

    Ok(ComposedScaler {
        spec: *spec,
        handle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_cluster;
    use futures::executor::block_on;

    #[test]
    fn test_scaler_targets_deployment() {
        let (engine, cluster) = test_cluster();
        let spec = ScalerSpec {
            min_replicas: 2,
            max_replicas: 10,
            target_cpu_utilization: 70,
        };

        let scaler = compose_scaler("api", &spec, "web", &cluster).unwrap();
        assert_eq!(scaler.spec, spec);
        assert_eq!(scaler.handle.reference.kind, ResourceKind::HorizontalPodAutoscaler);

        let planned = block_on(engine.apply()).unwrap();
        let body = &planned[0].body;
        assert_eq!(body["spec"]["scaleTargetRef"]["name"], "api");
        assert_eq!(body["spec"]["scaleTargetRef"]["kind"], "Deployment");
        assert_eq!(body["spec"]["minReplicas"], 2);
        assert_eq!(body["spec"]["maxReplicas"], 10);
        assert_eq!(
            body["spec"]["metrics"][0]["resource"]["target"]["averageUtilization"],
            70
        );
        assert_eq!(body["metadata"]["namespace"], "web");
    }

    #[test]
    fn test_inverted_range_passed_through() {
        let (engine, cluster) = test_cluster();
        let spec = ScalerSpec {
            min_replicas: 5,
            max_replicas: 1,
            target_cpu_utilization: 50,
        };

        compose_scaler("worker", &spec, "jobs", &cluster).unwrap();

        let planned = block_on(engine.apply()).unwrap();
        assert_eq!(planned[0].body["spec"]["minReplicas"], 5);
        assert_eq!(planned[0].body["spec"]["maxReplicas"], 1);
    }
}
