//! Application orchestration.
//!
//! Composes an application in dependency order: namespace, services,
//! environment secret bundle, CI/CD access, then each deployment. The first
//! failing step aborts the composition; resources already emitted are left
//! to the provisioning engine.

use deckhand_core::{
    Application, Cluster, Deferred, EnvMap, Error, FactoryContext, ResolvedServices,
    ResourceHandle, ResourceKind, ResourceSpec, Result, ServiceContext, merge_into,
};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::cicd::{CicdOutcome, compose_cicd};
use crate::deployment::{ComposedDeployment, compose_deployment};

/// Everything composed for one application.
#[derive(Debug, Clone)]
pub struct Composition {
    pub namespace: ResourceHandle,
    /// Absent when the application has no environment.
    pub secrets: Option<ResourceHandle>,
    pub services: ResolvedServices,
    pub deployments: Vec<ComposedDeployment>,
    /// Absent when CI/CD was turned off; [`CicdOutcome::Skipped`] when the
    /// platform could not provide it.
    pub cicd: Option<CicdOutcome>,
}

impl Composition {
    /// Statically known shape of the composition, for display.
    pub fn summary(&self) -> Value {
        let services: Map<String, Value> = self
            .services
            .iter()
            .map(|(name, result)| {
                let resources: Vec<String> =
                    result.resources.iter().map(ToString::to_string).collect();
                (
                    name.clone(),
                    json!({
                        "outputs": result.outputs.keys().collect::<Vec<_>>(),
                        "resources": resources,
                    }),
                )
            })
            .collect();

        let deployments: Vec<Value> = self
            .deployments
            .iter()
            .map(|deployment| {
                json!({
                    "name": deployment.name,
                    "workload": deployment.workload.reference.to_string(),
                    "exposure": deployment.exposure.as_ref().map(|e| e.details.clone()),
                    "scaler": deployment.scaler.as_ref().map(|s| s.spec),
                })
            })
            .collect();

        json!({
            "namespace": self.namespace.name(),
            "secrets": self.secrets.as_ref().map(|s| s.name()),
            "services": services,
            "deployments": deployments,
            "cicd": self.cicd.as_ref().map(CicdOutcome::summary),
        })
    }
}

/// Compose `application` onto `cluster` using the platform and services in `context`.
pub fn compose_application(
    application: &Application,
    cluster: &Cluster,
    context: &FactoryContext,
) -> Result<Composition> {
    reject_duplicate_services(application)?;

    let namespace = application.namespace();
    info!(
        application = %application.name,
        namespace = %namespace,
        cluster = %cluster.platform,
        "Composing application"
    );

    let namespace_handle = cluster.emit(
        ResourceSpec::new(ResourceKind::Namespace, namespace)
            .with_body(ResourceKind::Namespace.manifest(namespace, None)),
    )?;

    let services = compose_services(application, namespace, cluster, context)?;

    let environment = application
        .environment
        .as_ref()
        .map(|env| env.evaluate(&services))
        .unwrap_or_default();
    let secrets = if environment.is_empty() {
        debug!(application = %application.name, "No environment, skipping secret bundle");
        None
    } else {
        Some(compose_secrets(
            &application.name,
            namespace,
            environment,
            &namespace_handle,
            cluster,
        )?)
    };

    let cicd = if application.cicd.is_off() {
        debug!(application = %application.name, "CI/CD disabled");
        None
    } else {
        Some(compose_cicd(&application.name, namespace, cluster, context)?)
    };

    let mut deployments = Vec::with_capacity(application.deployments.len());
    for config in &application.deployments {
        let mut config = config.clone();
        if config.name.is_none() {
            config.name = Some(application.name.clone());
        }
        if config.secrets.is_none() {
            config.secrets = secrets.as_ref().map(|s| s.name().to_string());
        }
        deployments.push(compose_deployment(&config, namespace, cluster, context)?);
    }

    info!(
        application = %application.name,
        services = services.len(),
        deployments = deployments.len(),
        "Application composed"
    );

    Ok(Composition {
        namespace: namespace_handle,
        secrets,
        services,
        deployments,
        cicd,
    })
}

/// Every declared service is constructed exactly once.
fn reject_duplicate_services(application: &Application) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in &application.services {
        if !seen.insert(name.as_str()) {
            return Err(Error::InvalidInput(format!(
                "service '{}' declared twice in application '{}'",
                name, application.name
            )));
        }
    }
    Ok(())
}

fn compose_services(
    application: &Application,
    namespace: &str,
    cluster: &Cluster,
    context: &FactoryContext,
) -> Result<ResolvedServices> {
    let ctx = ServiceContext {
        application_name: &application.name,
        namespace,
        cluster,
        context,
    };

    let mut services = ResolvedServices::new();
    for name in &application.services {
        let constructor = context
            .service(name)
            .ok_or_else(|| Error::UnknownService(name.clone()))?;
        debug!(application = %application.name, service = %name, "Constructing service");
        let result = constructor.construct(&ctx)?;
        services.insert(name.clone(), result);
    }
    Ok(services)
}

/// Emit the secret bundle holding `environment`, named after the application.
fn compose_secrets(
    application_name: &str,
    namespace: &str,
    environment: EnvMap,
    namespace_handle: &ResourceHandle,
    cluster: &Cluster,
) -> Result<ResourceHandle> {
    let name = format!("{}-secrets", application_name);
    let (keys, values): (Vec<String>, Vec<Deferred<String>>) = environment.into_iter().unzip();

    let mut base = ResourceKind::Secret.manifest(&name, Some(namespace));
    merge_into(&mut base, json!({ "type": "Opaque" }));
    let body = Deferred::combine(values, move |values| {
        let data: Map<String, Value> = keys
            .into_iter()
            .zip(values)
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        let mut body = base;
        merge_into(&mut body, json!({ "stringData": data }));
        body
    });

    let handle = cluster.emit(
        ResourceSpec::new(ResourceKind::Secret, &name)
            .in_namespace(namespace)
            .with_deferred_body(body)
            .depends_on(&namespace_handle.reference),
    )?;
    debug!(secret = %name, "Composed secret bundle");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Factory;
    use crate::testing::{CicdMode, TestPlatform, deployer_account, test_cluster, test_context};
    use deckhand_core::{
        DeploymentConfig, Domain, Environment, ScalerSpec, ServiceConstructor, ServiceMap,
        ServiceResult, Toggle,
    };
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn web_api() -> DeploymentConfig {
        DeploymentConfig::new("org/app")
            .with_name("api")
            .with_tag("v1")
            .with_port(3000)
            .with_domain(Domain::new("example.com", "api"))
            .with_scaler(ScalerSpec {
                min_replicas: 2,
                max_replicas: 10,
                target_cpu_utilization: 70,
            })
    }

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Deferred::known(v.to_string())))
            .collect()
    }

    #[test]
    fn test_end_to_end_composition() {
        let (engine, cluster) = test_cluster();
        let context = test_context(
            TestPlatform::default()
                .with_exposer()
                .with_cicd(CicdMode::Account(deployer_account())),
        );
        let application = Application::new("web")
            .with_service("redis")
            .with_deployment(web_api())
            .with_cicd(Toggle::On);

        let composition = compose_application(&application, &cluster, &context).unwrap();

        assert_eq!(composition.namespace.name(), "web");
        assert!(composition.secrets.is_none());
        assert!(composition.services["redis"].output("url").is_some());
        assert_eq!(composition.deployments.len(), 1);

        let api = &composition.deployments[0];
        assert_eq!(api.name, "api");
        assert!(api.exposure.is_some());
        let scaler = api.scaler.as_ref().unwrap();
        assert_eq!(scaler.handle.name(), "api");
        assert_eq!(scaler.spec.min_replicas, 2);
        assert_eq!(scaler.spec.max_replicas, 10);

        let cicd = composition.cicd.as_ref().unwrap();
        assert!(!cicd.is_skipped());

        assert_eq!(engine.count(&ResourceKind::Namespace).unwrap(), 1);
        assert_eq!(engine.count(&ResourceKind::HelmRelease).unwrap(), 1);
        assert_eq!(engine.count(&ResourceKind::Secret).unwrap(), 0);
        assert_eq!(engine.count(&ResourceKind::Deployment).unwrap(), 1);
        assert_eq!(engine.count(&ResourceKind::Service).unwrap(), 1);
        assert_eq!(engine.count(&ResourceKind::HorizontalPodAutoscaler).unwrap(), 1);
        assert_eq!(engine.count(&ResourceKind::Role).unwrap(), 1);
        assert_eq!(engine.count(&ResourceKind::RoleBinding).unwrap(), 1);

        let planned = block_on(engine.apply()).unwrap();
        let workload = planned
            .iter()
            .find(|p| p.resource.kind == ResourceKind::Deployment)
            .unwrap();
        let container = &workload.body["spec"]["template"]["spec"]["containers"][0];
        assert!(container.get("envFrom").is_none());
    }

    #[test]
    fn test_static_environment_becomes_secret_bundle() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default());
        let application = Application::new("web")
            .with_environment(env(&[("LOG_LEVEL", "info"), ("MODE", "prod")]).into())
            .with_deployment(DeploymentConfig::new("org/app"));

        let composition = compose_application(&application, &cluster, &context).unwrap();

        let secrets = composition.secrets.as_ref().unwrap();
        assert_eq!(secrets.name(), "web-secrets");
        // Unnamed deployments take the application name.
        assert_eq!(composition.deployments[0].name, "web");

        let planned = block_on(engine.apply()).unwrap();
        let secret = planned
            .iter()
            .find(|p| p.resource.kind == ResourceKind::Secret)
            .unwrap();
        assert_eq!(
            secret.body["stringData"],
            json!({"LOG_LEVEL": "info", "MODE": "prod"})
        );
        assert_eq!(secret.depends_on, vec![composition.namespace.reference.clone()]);

        let workload = planned
            .iter()
            .find(|p| p.resource.kind == ResourceKind::Deployment)
            .unwrap();
        assert_eq!(
            workload.body["spec"]["template"]["spec"]["containers"][0]["envFrom"][0]["secretRef"]
                ["name"],
            "web-secrets"
        );
    }

    #[test]
    fn test_deployment_secrets_take_precedence() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default());
        let application = Application::new("web")
            .with_environment(env(&[("A", "1")]).into())
            .with_deployment(DeploymentConfig::new("org/app").with_secrets("custom-secret"));

        compose_application(&application, &cluster, &context).unwrap();

        let planned = block_on(engine.apply()).unwrap();
        let workload = planned
            .iter()
            .find(|p| p.resource.kind == ResourceKind::Deployment)
            .unwrap();
        assert_eq!(
            workload.body["spec"]["template"]["spec"]["containers"][0]["envFrom"][0]["secretRef"]
                ["name"],
            "custom-secret"
        );
    }

    #[test]
    fn test_empty_environment_emits_no_secret() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default());
        let application = Application::new("web").with_environment(EnvMap::new().into());

        let composition = compose_application(&application, &cluster, &context).unwrap();

        assert!(composition.secrets.is_none());
        assert_eq!(engine.count(&ResourceKind::Secret).unwrap(), 0);
    }

    #[test]
    fn test_environment_function_receives_services() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_url: Arc<Mutex<Option<Deferred<String>>>> = Arc::new(Mutex::new(None));
        let record = seen.clone();
        let record_url = seen_url.clone();
        let application = Application::new("web")
            .with_service("redis")
            .with_environment(Environment::derived(move |services| {
                record
                    .lock()
                    .unwrap()
                    .extend(services.keys().cloned());
                let url = services["redis"].output("url").unwrap().clone();
                *record_url.lock().unwrap() = Some(url.clone());
                let mut env = EnvMap::new();
                env.insert("REDIS_URL".to_string(), url);
                env
            }));

        let composition = compose_application(&application, &cluster, &context).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["redis".to_string()]);

        let url = composition.services["redis"].output("url").unwrap().clone();
        let url_seen = seen_url.lock().unwrap().take().unwrap();
        let planned = block_on(engine.apply()).unwrap();
        let secret = planned
            .iter()
            .find(|p| p.resource.kind == ResourceKind::Secret)
            .unwrap();
        let url = block_on(url.resolve()).unwrap();
        let url_seen = block_on(url_seen.resolve()).unwrap();
        assert!(url.starts_with("redis://"));
        assert_eq!(url_seen, url);
        assert_eq!(secret.body["stringData"], json!({"REDIS_URL": url}));
    }

    #[test]
    fn test_repeated_service_constructed_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn queue(_ctx: &ServiceContext<'_>) -> Result<ServiceResult> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(ServiceResult::new())
        }

        let (_engine, cluster) = test_cluster();
        let mut custom = ServiceMap::new();
        custom.insert("queue".to_string(), Arc::new(queue) as Arc<dyn ServiceConstructor>);
        let factory = Factory::with_services(Arc::new(TestPlatform::default()), custom);
        let application = Application::new("web")
            .with_service("queue")
            .with_service("queue");

        let composition = factory.define_application(&application, &cluster).unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(composition.services.len(), 1);
    }

    #[test]
    fn test_duplicate_service_rejected_before_emitting() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn queue(_ctx: &ServiceContext<'_>) -> Result<ServiceResult> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(ServiceResult::new())
        }

        let (engine, cluster) = test_cluster();
        let mut custom = ServiceMap::new();
        custom.insert("queue".to_string(), Arc::new(queue) as Arc<dyn ServiceConstructor>);
        let factory = Factory::with_services(Arc::new(TestPlatform::default()), custom);
        let mut application = Application::new("web").with_service("queue");
        application.services.push("queue".to_string());

        let err = factory.define_application(&application, &cluster).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("'queue' declared twice")));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
        assert!(engine.resources().unwrap().is_empty());
    }

    #[test]
    fn test_builtin_redis_listed_twice_rejected() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default());
        let mut application = Application::new("web").with_service("redis");
        application.services.push("redis".to_string());

        let err = compose_application(&application, &cluster, &context).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(engine.resources().unwrap().is_empty());
    }

    #[test]
    fn test_services_constructed_in_declaration_order() {
        fn first(ctx: &ServiceContext<'_>) -> Result<ServiceResult> {
            let handle = ctx
                .cluster
                .emit(ResourceSpec::new(ResourceKind::Secret, "first").in_namespace(ctx.namespace))?;
            Ok(ServiceResult::new().with_resource(handle.reference))
        }
        fn second(ctx: &ServiceContext<'_>) -> Result<ServiceResult> {
            let handle = ctx
                .cluster
                .emit(ResourceSpec::new(ResourceKind::Secret, "second").in_namespace(ctx.namespace))?;
            Ok(ServiceResult::new().with_resource(handle.reference))
        }

        let (engine, cluster) = test_cluster();
        let mut custom = ServiceMap::new();
        custom.insert("zeta".to_string(), Arc::new(first) as Arc<dyn ServiceConstructor>);
        custom.insert("alpha".to_string(), Arc::new(second) as Arc<dyn ServiceConstructor>);
        let factory = Factory::with_services(Arc::new(TestPlatform::default()), custom);
        let application = Application::new("web")
            .with_service("zeta")
            .with_service("alpha");

        factory.define_application(&application, &cluster).unwrap();

        let names: Vec<String> = engine.resources().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["web", "first", "second"]);
    }

    #[test]
    fn test_unknown_service_fails() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default());
        let application = Application::new("web")
            .with_service("postgres")
            .with_deployment(DeploymentConfig::new("org/app"));

        let err = compose_application(&application, &cluster, &context).unwrap_err();

        assert!(matches!(err, Error::UnknownService(ref name) if name == "postgres"));
        assert_eq!(engine.count(&ResourceKind::Deployment).unwrap(), 0);
    }

    #[test]
    fn test_failing_deployment_aborts_composition() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default().with_exposer());
        let application = Application::new("web")
            .with_deployment(DeploymentConfig::new("org/worker").with_name("worker"))
            .with_deployment(
                DeploymentConfig::new("org/app")
                    .with_name("api")
                    .with_domain(Domain::new("example.com", "api")),
            )
            .with_deployment(DeploymentConfig::new("org/cron").with_name("cron"));

        let err = compose_application(&application, &cluster, &context).unwrap_err();

        assert!(matches!(err, Error::MissingContainerPort { .. }));
        let workloads: Vec<String> = engine
            .resources()
            .unwrap()
            .into_iter()
            .filter(|r| r.kind == ResourceKind::Deployment)
            .map(|r| r.name)
            .collect();
        assert_eq!(workloads, vec!["worker".to_string()]);
    }

    #[test]
    fn test_cicd_failure_prevents_deployments() {
        let (engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default().with_cicd(CicdMode::Fail));
        let application = Application::new("web").with_deployment(DeploymentConfig::new("org/app"));

        let err = compose_application(&application, &cluster, &context).unwrap_err();

        assert!(matches!(err, Error::Platform(_)));
        assert_eq!(engine.count(&ResourceKind::Deployment).unwrap(), 0);
    }

    #[test]
    fn test_cicd_off_is_absent_not_skipped() {
        let (_engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default());

        let off = compose_application(
            &Application::new("web").with_cicd(Toggle::Off),
            &cluster,
            &context,
        )
        .unwrap();
        assert!(off.cicd.is_none());
        assert_eq!(off.summary()["cicd"], Value::Null);

        let (_engine, cluster) = test_cluster();
        let unset = compose_application(&Application::new("web"), &cluster, &context).unwrap();
        assert!(unset.cicd.as_ref().unwrap().is_skipped());
        assert_eq!(unset.summary()["cicd"], json!({"skipped": true}));
    }

    #[test]
    fn test_summary_shape() {
        let (_engine, cluster) = test_cluster();
        let context = test_context(TestPlatform::default().with_exposer());
        let application = Application::new("web")
            .with_namespace("web-prod")
            .with_service("redis")
            .with_deployment(web_api());

        let composition = compose_application(&application, &cluster, &context).unwrap();
        let summary = composition.summary();

        assert_eq!(summary["namespace"], "web-prod");
        assert_eq!(summary["secrets"], Value::Null);
        assert_eq!(
            summary["services"]["redis"]["outputs"],
            json!(["host", "password", "url"])
        );
        assert_eq!(summary["deployments"][0]["name"], "api");
        assert_eq!(
            summary["deployments"][0]["exposure"],
            json!({"hosts": ["api.example.com"]})
        );
        assert_eq!(summary["deployments"][0]["scaler"]["maxReplicas"], 10);
    }
}
