use tracing::{info, warn};

use crate::domain::{
    common::services::Service,
    credential::{
        entities::{ProvisionedCredentials, ResourceOwner, SecretData},
        ports::{CredentialService, SecretRepository},
    },
    database::{
        entities::{ConnectionEndpoint, DatabaseSpec, DeclaredDatabase, ProvisionOutcome},
        ports::{DatabaseService, ProvisioningRepository},
    },
    error::OperatorError,
};

impl<P, S> Service<P, S>
where
    P: ProvisioningRepository,
    S: SecretRepository,
{
    pub(crate) async fn resolve_password(
        &self,
        declared: &DeclaredDatabase,
        namespace: &str,
    ) -> Result<String, OperatorError> {
        let reference = &declared.password_secret;
        let data = self.read_credentials(&reference.name, namespace).await?;

        data.get(&reference.key)
            .map(str::to_string)
            .ok_or_else(|| OperatorError::SecretKeyNotFound {
                name: reference.name.clone(),
                namespace: namespace.to_string(),
                key: reference.key.clone(),
            })
    }

    pub(crate) fn resolve_endpoint(&self, declared: &DeclaredDatabase) -> ConnectionEndpoint {
        let cluster = &self.config.endpoint;

        ConnectionEndpoint {
            host: declared.host.clone().unwrap_or_else(|| cluster.host.clone()),
            port: declared.port.unwrap_or(cluster.port),
        }
    }
}

impl<P, S> DatabaseService for Service<P, S>
where
    P: ProvisioningRepository,
    S: SecretRepository,
{
    async fn on_create(
        &self,
        spec: &DatabaseSpec,
        namespace: &str,
        owner: &ResourceOwner,
    ) -> Result<DeclaredDatabase, OperatorError> {
        let declared = DeclaredDatabase::parse(spec)?;

        // Credentials are written last, an owned secret means an earlier pass
        // provisioned everything.
        if self
            .secret_repository
            .is_owned_by(&declared.credentials_secret, namespace, owner)
            .await?
        {
            info!(secret = %declared.credentials_secret, "credentials already provisioned");
            return Ok(declared);
        }

        let password = self.resolve_password(&declared, namespace).await?;

        // An existing role or database may belong to a concurrent pass, back off
        // instead of adopting it.
        let user = self
            .provisioning_repository
            .ensure_user(&declared.username, &password)
            .await?;
        if user == ProvisionOutcome::AlreadyExists {
            warn!(role = %declared.username, "role already exists");
            return Err(OperatorError::retryable(format!(
                "role {} already exists",
                declared.username
            )));
        }
        info!(role = %declared.username, "role created");

        let database = self
            .provisioning_repository
            .ensure_database(&declared.name, &declared.username)
            .await?;
        if database == ProvisionOutcome::AlreadyExists {
            warn!(database = %declared.name, "database already exists");
            return Err(OperatorError::retryable(format!(
                "database {} already exists",
                declared.name
            )));
        }
        info!(database = %declared.name, owner = %declared.username, "database created");

        let endpoint = self.resolve_endpoint(&declared);
        let credentials = ProvisionedCredentials::new(&declared, &password, endpoint);

        self.write_credentials(
            &declared.credentials_secret,
            namespace,
            &SecretData::from(&credentials),
            owner,
        )
        .await?;

        info!("Database {} was created", declared.name);
        Ok(declared)
    }

    async fn on_update(
        &self,
        previous: &DatabaseSpec,
        spec: &DatabaseSpec,
        _namespace: &str,
    ) -> Result<DeclaredDatabase, OperatorError> {
        let declared = DeclaredDatabase::parse(spec)?;
        DeclaredDatabase::parse(previous)?.ensure_unchanged_identity(&declared)?;

        info!("Database {} was updated", declared.name);
        Ok(declared)
    }

    async fn on_delete(&self, spec: &DatabaseSpec, _namespace: &str) -> Result<(), OperatorError> {
        let declared = DeclaredDatabase::parse(spec)?;

        // The database goes first, a role cannot be dropped while it owns one.
        self.provisioning_repository
            .drop_database(&declared.name)
            .await?;
        self.provisioning_repository
            .drop_user(&declared.username)
            .await?;

        info!("Database {} was deleted", declared.name);
        Ok(())
    }
}
