//! Service registry and application factory.

use deckhand_core::{
    Application, Cluster, FactoryContext, PlatformContext, Result, ServiceConstructor, ServiceMap,
};
use std::sync::Arc;
use tracing::debug;

use crate::orchestrator::{Composition, compose_application};
use crate::redis::RedisService;

/// Constructors shipped with Deckhand.
pub fn builtin_services() -> ServiceMap {
    let mut services = ServiceMap::new();
    services.insert(
        "redis".to_string(),
        Arc::new(RedisService::default()) as Arc<dyn ServiceConstructor>,
    );
    services
}

/// Binds a platform and a service registry, and composes applications against them.
#[derive(Debug, Clone)]
pub struct Factory {
    context: FactoryContext,
}

impl Factory {
    /// A factory offering only the built-in services.
    pub fn new(platform: Arc<dyn PlatformContext>) -> Self {
        Self::with_services(platform, ServiceMap::new())
    }

    /// A factory offering the built-in services plus `custom`.
    ///
    /// A custom constructor replaces a built-in one of the same name.
    pub fn with_services(platform: Arc<dyn PlatformContext>, custom: ServiceMap) -> Self {
        let mut services = builtin_services();
        for name in custom.keys() {
            if services.contains_key(name) {
                debug!(service = %name, "Custom constructor replaces built-in");
            }
        }
        services.extend(custom);
        Self {
            context: FactoryContext::new(platform, services),
        }
    }

    pub fn context(&self) -> &FactoryContext {
        &self.context
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.context.services.keys().map(String::as_str).collect()
    }

    /// Compose `application` onto `cluster`.
    pub fn define_application(
        &self,
        application: &Application,
        cluster: &Cluster,
    ) -> Result<Composition> {
        compose_application(application, cluster, &self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestPlatform, test_cluster};
    use deckhand_core::{ServiceContext, ServiceResult};

    fn empty_service(_: &ServiceContext<'_>) -> Result<ServiceResult> {
        Ok(ServiceResult::new())
    }

    fn external_redis(_: &ServiceContext<'_>) -> Result<ServiceResult> {
        Ok(ServiceResult::new().with_output("url", "redis://external:6379".into()))
    }

    #[test]
    fn test_builtins_include_redis() {
        let factory = Factory::new(Arc::new(TestPlatform::default()));
        assert_eq!(factory.service_names(), vec!["redis"]);
        assert!(factory.context().service("redis").is_some());
    }

    #[test]
    fn test_custom_service_added() {
        let mut custom = ServiceMap::new();
        custom.insert(
            "queue".to_string(),
            Arc::new(empty_service) as Arc<dyn ServiceConstructor>,
        );

        let factory = Factory::with_services(Arc::new(TestPlatform::default()), custom);

        assert_eq!(factory.service_names(), vec!["queue", "redis"]);
    }

    #[test]
    fn test_custom_service_overrides_builtin() {
        let (engine, cluster) = test_cluster();
        let mut custom = ServiceMap::new();
        custom.insert(
            "redis".to_string(),
            Arc::new(external_redis) as Arc<dyn ServiceConstructor>,
        );
        let factory = Factory::with_services(Arc::new(TestPlatform::default()), custom);

        let application = Application::new("web").with_service("redis");
        let composition = factory.define_application(&application, &cluster).unwrap();

        assert!(composition.services["redis"].resources.is_empty());
        // Only the namespace was emitted; the built-in would have added two more.
        assert_eq!(engine.resources().unwrap().len(), 1);
    }
}
