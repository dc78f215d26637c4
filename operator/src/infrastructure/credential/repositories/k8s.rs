use std::collections::BTreeMap;

use k8s_openapi::{
    ByteString,
    api::core::v1::Secret,
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference},
};
use kube::{
    Api, Client,
    api::{Patch, PatchParams, PostParams},
};
use serde_json::json;
use tracing::{debug, error};

use crate::domain::{
    credential::{
        entities::{ResourceOwner, SecretData},
        ports::SecretRepository,
    },
    database::entities::ProvisionOutcome,
    error::OperatorError,
};

pub const FIELD_MANAGER: &str = "minipg-operator";
const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

#[derive(Clone)]
pub struct K8sSecretRepository {
    client: Client,
}

impl K8sSecretRepository {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn api_error(e: kube::Error) -> OperatorError {
    OperatorError::KubeApiError {
        message: e.to_string(),
    }
}

fn is_conflict(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(response) if response.code == 409)
}

pub(crate) fn owner_reference(owner: &ResourceOwner) -> OwnerReference {
    OwnerReference {
        api_version: owner.api_version.clone(),
        kind: owner.kind.clone(),
        name: owner.name.clone(),
        uid: owner.uid.clone(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn encode(data: &SecretData) -> BTreeMap<String, ByteString> {
    data.iter()
        .map(|(key, value)| (key.clone(), ByteString(value.as_bytes().to_vec())))
        .collect()
}

pub(crate) fn decode(
    name: &str,
    namespace: &str,
    secret: Secret,
) -> Result<SecretData, OperatorError> {
    secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, ByteString(bytes))| {
            String::from_utf8(bytes)
                .map(|value| (key.clone(), value))
                .map_err(|_| OperatorError::InvalidSpec {
                    message: format!("key `{key}` of secret {namespace}/{name} is not valid UTF-8"),
                })
        })
        .collect()
}

/// Opaque Secret carrying `data`, garbage collected together with `owner`.
pub(crate) fn build_secret(
    name: &str,
    namespace: &str,
    data: &SecretData,
    owner: &ResourceOwner,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                FIELD_MANAGER.to_string(),
            )])),
            owner_references: Some(vec![owner_reference(owner)]),
            ..ObjectMeta::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(encode(data)),
        ..Secret::default()
    }
}

impl SecretRepository for K8sSecretRepository {
    async fn read(&self, name: &str, namespace: &str) -> Result<SecretData, OperatorError> {
        let secret = self
            .api(namespace)
            .get_opt(name)
            .await
            .map_err(api_error)?
            .ok_or_else(|| OperatorError::SecretNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;

        decode(name, namespace, secret)
    }

    async fn create(
        &self,
        name: &str,
        namespace: &str,
        data: &SecretData,
        owner: &ResourceOwner,
    ) -> Result<ProvisionOutcome, OperatorError> {
        let secret = build_secret(name, namespace, data, owner);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };

        match self.api(namespace).create(&params, &secret).await {
            Ok(_) => Ok(ProvisionOutcome::Created),
            Err(e) if is_conflict(&e) => {
                debug!(secret = name, namespace, "secret already exists");
                Ok(ProvisionOutcome::AlreadyExists)
            }
            Err(e) => {
                error!("failed to create secret {}/{}: {}", namespace, name, e);
                Err(api_error(e))
            }
        }
    }

    async fn patch(
        &self,
        name: &str,
        namespace: &str,
        changes: &SecretData,
    ) -> Result<(), OperatorError> {
        let patch = json!({ "data": encode(changes) });

        self.api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| {
                error!("failed to patch secret {}/{}: {}", namespace, name, e);
                api_error(e)
            })?;

        Ok(())
    }

    async fn is_owned_by(
        &self,
        name: &str,
        namespace: &str,
        owner: &ResourceOwner,
    ) -> Result<bool, OperatorError> {
        let secret = self
            .api(namespace)
            .get_opt(name)
            .await
            .map_err(api_error)?;

        Ok(secret
            .and_then(|secret| secret.metadata.owner_references)
            .unwrap_or_default()
            .iter()
            .any(|reference| reference.uid == owner.uid))
    }
}
