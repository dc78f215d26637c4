use tracing::{debug, info, warn};

use crate::domain::{
    common::services::Service,
    credential::{
        entities::{ResourceOwner, SecretData},
        ports::{CredentialService, SecretRepository},
    },
    database::{entities::ProvisionOutcome, ports::ProvisioningRepository},
    error::OperatorError,
};

impl<P, S> CredentialService for Service<P, S>
where
    P: ProvisioningRepository,
    S: SecretRepository,
{
    async fn read_credentials(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<SecretData, OperatorError> {
        self.secret_repository.read(name, namespace).await
    }

    async fn write_credentials(
        &self,
        name: &str,
        namespace: &str,
        data: &SecretData,
        owner: &ResourceOwner,
    ) -> Result<(), OperatorError> {
        match self
            .secret_repository
            .create(name, namespace, data, owner)
            .await?
        {
            ProvisionOutcome::Created => {
                info!(secret = name, namespace, owner = %owner.name, "credentials secret created");
                Ok(())
            }
            ProvisionOutcome::AlreadyExists => {
                // A secret we own is what an earlier, interrupted pass left behind.
                if self
                    .secret_repository
                    .is_owned_by(name, namespace, owner)
                    .await?
                {
                    let changed = self.patch_credentials(name, namespace, data).await?;
                    info!(secret = name, namespace, changed, "credentials secret converged");
                    return Ok(());
                }

                warn!(secret = name, namespace, "credentials secret exists and is not ours");
                Err(OperatorError::retryable(format!(
                    "secret {namespace}/{name} already exists"
                )))
            }
        }
    }

    async fn patch_credentials(
        &self,
        name: &str,
        namespace: &str,
        desired: &SecretData,
    ) -> Result<usize, OperatorError> {
        let current = self.secret_repository.read(name, namespace).await?;
        let changes = current.diff(desired);

        if changes.is_empty() {
            debug!(secret = name, namespace, "credentials secret already up to date");
            return Ok(0);
        }

        debug!(secret = name, namespace, keys = ?changes, "patching credentials secret");
        self.secret_repository
            .patch(name, namespace, &changes)
            .await?;

        Ok(changes.len())
    }
}
