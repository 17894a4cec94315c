//! Kubernetes platform context.
//!
//! Exposes deployments through a ClusterIP Service and an Ingress, resolves
//! storage tiers from the platform's storage-class table, and hands out a
//! statically configured deploy identity.

use deckhand_config::PlatformConfig;
use deckhand_core::{
    CicdProvider, Cluster, Deferred, Error, ExposedService, ExposedServiceArgs, PlatformContext,
    ResourceKind, ResourceSpec, Result, ServiceAccountRef, ServiceExposer, StorageTier,
};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec as KubeIngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Port the Service listens on.
const SERVICE_PORT: i32 = 80;
/// Container port name the Service forwards to.
const TARGET_PORT_NAME: &str = "http";
const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Platform context for a Kubernetes cluster.
#[derive(Debug, Clone)]
pub struct KubernetesPlatform {
    config: PlatformConfig,
}

impl KubernetesPlatform {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    fn service_document(&self, args: &ExposedServiceArgs) -> Service {
        Service {
            metadata: object_meta(&args.name, &args.namespace, BTreeMap::new()),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(BTreeMap::from([("app".to_string(), args.name.clone())])),
                ports: Some(vec![ServicePort {
                    name: Some(TARGET_PORT_NAME.to_string()),
                    port: SERVICE_PORT,
                    target_port: Some(IntOrString::String(TARGET_PORT_NAME.to_string())),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn ingress_document(&self, args: &ExposedServiceArgs, hosts: &[String]) -> Ingress {
        let ingress = self.config.ingress.clone().unwrap_or_default();

        let mut annotations = args.ingress.annotations.clone();
        if let Some(issuer) = &ingress.tls_issuer {
            annotations
                .entry(CLUSTER_ISSUER_ANNOTATION.to_string())
                .or_insert_with(|| issuer.clone());
        }

        let backend = IngressBackend {
            service: Some(IngressServiceBackend {
                name: args.name.clone(),
                port: Some(ServiceBackendPort {
                    number: Some(SERVICE_PORT),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };

        let rules = hosts
            .iter()
            .map(|host| IngressRule {
                host: Some(host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: backend.clone(),
                    }],
                }),
            })
            .collect();

        let tls = ingress.tls_issuer.as_ref().map(|_| {
            vec![IngressTLS {
                hosts: Some(hosts.to_vec()),
                secret_name: Some(format!("{}-tls", args.name)),
            }]
        });

        Ingress {
            metadata: object_meta(&args.name, &args.namespace, annotations),
            spec: Some(KubeIngressSpec {
                ingress_class_name: ingress.class.clone(),
                rules: Some(rules),
                tls,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn url_scheme(&self) -> &'static str {
        match self.config.ingress.as_ref().and_then(|i| i.tls_issuer.as_ref()) {
            Some(_) => "https",
            None => "http",
        }
    }
}

fn object_meta(name: &str, namespace: &str, annotations: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
        annotations: (!annotations.is_empty()).then_some(annotations),
        ..Default::default()
    }
}

impl PlatformContext for KubernetesPlatform {
    fn storage_class(&self, cluster: &Cluster, tier: StorageTier) -> Result<String> {
        let class = match tier {
            StorageTier::Fast => &self.config.storage.fast,
            StorageTier::Cheap => &self.config.storage.cheap,
        };
        debug!(cluster = %cluster.platform, tier = %tier, class = %class, "Resolved storage class");
        Ok(class.clone())
    }

    fn service_exposer(&self) -> Option<&dyn ServiceExposer> {
        self.config
            .ingress
            .as_ref()
            .map(|_| self as &dyn ServiceExposer)
    }

    fn cicd(&self) -> Option<&dyn CicdProvider> {
        self.config.cicd.as_ref().map(|_| self as &dyn CicdProvider)
    }
}

impl ServiceExposer for KubernetesPlatform {
    fn expose_service(&self, cluster: &Cluster, args: ExposedServiceArgs) -> Result<ExposedService> {
        let service_body = serde_json::to_value(self.service_document(&args))?;
        let service = cluster.emit(
            ResourceSpec::new(ResourceKind::Service, &args.name)
                .in_namespace(&args.namespace)
                .with_body(service_body)
                .depends_on(&args.workload),
        )?;
        let mut resources = vec![service.reference];

        let hosts: Vec<String> = args.ingress.domains.iter().map(|d| d.host()).collect();
        if !hosts.is_empty() {
            let ingress_body = serde_json::to_value(self.ingress_document(&args, &hosts))?;
            let ingress = cluster.emit(
                ResourceSpec::new(ResourceKind::Ingress, &args.name)
                    .in_namespace(&args.namespace)
                    .with_body(ingress_body)
                    .depends_on(&args.workload),
            )?;
            resources.push(ingress.reference);
        }

        let url = hosts
            .first()
            .map(|host| format!("{}://{}", self.url_scheme(), host));
        info!(
            deployment = %args.name,
            hosts = hosts.len(),
            port = args.container_port,
            "Exposed deployment"
        );

        Ok(ExposedService {
            details: json!({
                "service": args.name,
                "hosts": hosts,
                "url": url,
            }),
            resources,
        })
    }
}

impl CicdProvider for KubernetesPlatform {
    fn deploy_service_account(
        &self,
        cluster: &Cluster,
    ) -> Result<Option<Deferred<ServiceAccountRef>>> {
        let Some(cicd) = &self.config.cicd else {
            return Ok(None);
        };
        if cicd.service_account.is_empty() {
            return Err(Error::Platform(format!(
                "platform '{}' has an empty deploy identity",
                self.config.name
            )));
        }
        debug!(cluster = %cluster.platform, account = %cicd.service_account, "Deploy identity");
        Ok(Some(Deferred::known(ServiceAccountRef {
            name: cicd.service_account.clone(),
            namespace: cicd.namespace.clone(),
        })))
    }
}
