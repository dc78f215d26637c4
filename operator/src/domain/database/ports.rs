use crate::domain::{
    credential::entities::ResourceOwner,
    database::entities::{DatabaseSpec, DeclaredDatabase, ProvisionOutcome},
    error::OperatorError,
};

#[cfg_attr(test, mockall::automock)]
pub trait DatabaseService: Send + Sync {
    fn on_create(
        &self,
        spec: &DatabaseSpec,
        namespace: &str,
        owner: &ResourceOwner,
    ) -> impl Future<Output = Result<DeclaredDatabase, OperatorError>> + Send;
    fn on_update(
        &self,
        previous: &DatabaseSpec,
        spec: &DatabaseSpec,
        namespace: &str,
    ) -> impl Future<Output = Result<DeclaredDatabase, OperatorError>> + Send;
    fn on_delete(
        &self,
        spec: &DatabaseSpec,
        namespace: &str,
    ) -> impl Future<Output = Result<(), OperatorError>> + Send;
}

/// Primitives against the PostgreSQL cluster. Creation tolerates an existing
/// target and reports it, drops tolerate an absent one.
#[cfg_attr(test, mockall::automock)]
pub trait ProvisioningRepository: Send + Sync {
    fn ensure_user(
        &self,
        name: &str,
        password: &str,
    ) -> impl Future<Output = Result<ProvisionOutcome, OperatorError>> + Send;
    fn ensure_database(
        &self,
        name: &str,
        owner: &str,
    ) -> impl Future<Output = Result<ProvisionOutcome, OperatorError>> + Send;
    fn drop_database(&self, name: &str) -> impl Future<Output = Result<(), OperatorError>> + Send;
    fn drop_user(&self, name: &str) -> impl Future<Output = Result<(), OperatorError>> + Send;
}
