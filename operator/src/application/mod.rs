use std::{sync::Arc, time::Duration};

use kube::{Client, CustomResourceExt};
use tracing::{debug, error, info};

use crate::{
    application::{database::controller::run_database_controller, http::health::serve_health},
    args::Args,
    domain::{
        common::{OperatorConfig, services::Service},
        database::entities::Database,
        error::OperatorError,
    },
    infrastructure::{
        credential::repositories::k8s::K8sSecretRepository,
        database::repositories::postgres::PostgresProvisioningRepository,
    },
};

pub mod database;
pub mod http;
pub mod telemetry;

pub type OperatorService = Service<PostgresProvisioningRepository, K8sSecretRepository>;
pub struct OperatorApp;

pub fn create_service(client: Client, config: OperatorConfig) -> OperatorService {
    let provisioning_repository = PostgresProvisioningRepository::new(config.database_url.clone());
    let secret_repository = K8sSecretRepository::new(client);

    Service::new(provisioning_repository, secret_repository, config)
}

/// The CustomResourceDefinition for `Database`, as YAML.
pub fn crd_yaml() -> Result<String, OperatorError> {
    serde_yaml::to_string(&Database::crd()).map_err(|e| OperatorError::InternalServerError {
        message: e.to_string(),
    })
}

impl OperatorApp {
    pub async fn run(args: &Args) -> Result<(), OperatorError> {
        let config = args.operator_config()?;
        info!(endpoint = %config.endpoint, "config validated");

        debug!("initializing kubernetes client...");
        let client = Client::try_default().await.map_err(|e| {
            error!("unable to create the Kubernetes client: {:?}", e);
            OperatorError::InternalServerError {
                message: format!("Kubernetes client error: {}", e),
            }
        })?;

        info!("kubernetes client initialized");

        let service = Arc::new(create_service(client.clone(), config));
        info!("service initialized");

        let database_controller = run_database_controller(
            client,
            service.clone(),
            Duration::from_secs(args.retry_backoff_secs),
        );
        let health_server = serve_health(args.health_addr, service);

        info!("database controller started");

        tokio::select! {
            result = database_controller => {
                result?;
                info!("Database controller has stopped.");
            }
            result = health_server => {
                result?;
                info!("Health server has stopped.");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::crd_yaml;

    #[test]
    fn test_crd_describes_database_resource() {
        let yaml = crd_yaml().unwrap();

        assert!(yaml.contains("name: databases.minipg.dev"));
        assert!(yaml.contains("kind: Database"));
        assert!(yaml.contains("scope: Namespaced"));
        assert!(yaml.contains("credentialsSecret"));
        assert!(yaml.contains("passwordSecretKey"));
    }
}
