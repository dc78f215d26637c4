use crate::domain::{
    credential::entities::{ResourceOwner, SecretData},
    database::entities::ProvisionOutcome,
    error::OperatorError,
};

pub trait CredentialService: Send + Sync {
    fn read_credentials(
        &self,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<SecretData, OperatorError>> + Send;
    fn write_credentials(
        &self,
        name: &str,
        namespace: &str,
        data: &SecretData,
        owner: &ResourceOwner,
    ) -> impl Future<Output = Result<(), OperatorError>> + Send;
    fn patch_credentials(
        &self,
        name: &str,
        namespace: &str,
        desired: &SecretData,
    ) -> impl Future<Output = Result<usize, OperatorError>> + Send;
}

#[cfg_attr(test, mockall::automock)]
pub trait SecretRepository: Send + Sync {
    fn read(
        &self,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<SecretData, OperatorError>> + Send;
    fn create(
        &self,
        name: &str,
        namespace: &str,
        data: &SecretData,
        owner: &ResourceOwner,
    ) -> impl Future<Output = Result<ProvisionOutcome, OperatorError>> + Send;
    fn patch(
        &self,
        name: &str,
        namespace: &str,
        changes: &SecretData,
    ) -> impl Future<Output = Result<(), OperatorError>> + Send;
    fn is_owned_by(
        &self,
        name: &str,
        namespace: &str,
        owner: &ResourceOwner,
    ) -> impl Future<Output = Result<bool, OperatorError>> + Send;
}
