use std::sync::Arc;

use crate::domain::{
    common::OperatorConfig, credential::ports::SecretRepository,
    database::ports::ProvisioningRepository,
};

#[derive(Clone)]
pub struct Service<P, S>
where
    P: ProvisioningRepository,
    S: SecretRepository,
{
    pub(crate) provisioning_repository: Arc<P>,
    pub(crate) secret_repository: Arc<S>,
    pub(crate) config: Arc<OperatorConfig>,
}

impl<P, S> Service<P, S>
where
    P: ProvisioningRepository,
    S: SecretRepository,
{
    pub fn new(provisioning_repository: P, secret_repository: S, config: OperatorConfig) -> Self {
        Service {
            provisioning_repository: Arc::new(provisioning_repository),
            secret_repository: Arc::new(secret_repository),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }
}
