use std::fmt;

use kube::{CELSchema, CustomResource};
use serde::{Deserialize, Serialize};

use crate::domain::error::OperatorError;

pub const DEFAULT_PASSWORD_SECRET_KEY: &str = "password";

/// PostgreSQL truncates identifiers longer than NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;
const MAX_OBJECT_NAME_LEN: usize = 253;

/// A database and its owning role, requested on the shared PostgreSQL cluster.
///
/// Every field except `passwordSecretKey` is write-once. The API server enforces
/// that through transition rules, the operator checks it again on update.
#[derive(CustomResource, CELSchema, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[kube(
    group = "minipg.dev",
    version = "v1",
    kind = "Database",
    plural = "databases",
    shortname = "pgdb",
    namespaced
)]
#[kube(printcolumn = r#"{"name":"Database","type":"string","jsonPath":".spec.name"}"#)]
#[kube(printcolumn = r#"{"name":"Owner","type":"string","jsonPath":".spec.username"}"#)]
#[kube(
    printcolumn = r#"{"name":"Credentials","type":"string","jsonPath":".spec.credentialsSecret"}"#
)]
#[cel_validate(rule = Rule::new("has(self.host) == has(oldSelf.host)").message("host is immutable"))]
#[cel_validate(rule = Rule::new("has(self.port) == has(oldSelf.port)").message("port is immutable"))]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Name of the database to create.
    #[schemars(length(min = 1, max = 63))]
    #[cel_validate(rule = Rule::new("self == oldSelf").message("name is immutable"))]
    pub name: String,
    /// Role owning the database, created with the password below.
    #[schemars(length(min = 1, max = 63))]
    #[cel_validate(rule = Rule::new("self == oldSelf").message("username is immutable"))]
    pub username: String,
    /// Secret in the same namespace holding the role password.
    #[schemars(length(min = 1, max = 253))]
    #[cel_validate(rule = Rule::new("self == oldSelf").message("passwordSecret is immutable"))]
    pub password_secret: String,
    #[serde(default = "default_password_secret_key")]
    pub password_secret_key: String,
    /// Secret the operator creates with the generated connection credentials.
    #[schemars(length(min = 1, max = 253))]
    #[cel_validate(rule = Rule::new("self == oldSelf").message("credentialsSecret is immutable"))]
    pub credentials_secret: String,
    /// Host advertised in the credentials instead of the operator's own endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cel_validate(rule = Rule::new("self == oldSelf").message("host is immutable"))]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    #[cel_validate(rule = Rule::new("self == oldSelf").message("port is immutable"))]
    pub port: Option<u16>,
}

fn default_password_secret_key() -> String {
    DEFAULT_PASSWORD_SECRET_KEY.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

/// A `DatabaseSpec` that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDatabase {
    pub name: String,
    pub username: String,
    pub password_secret: SecretKeyRef,
    pub credentials_secret: String,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl DeclaredDatabase {
    pub fn parse(spec: &DatabaseSpec) -> Result<Self, OperatorError> {
        let name = sql_identifier("name", &spec.name)?;
        let username = sql_identifier("username", &spec.username)?;
        let password_secret = object_name("passwordSecret", &spec.password_secret)?;
        let credentials_secret = object_name("credentialsSecret", &spec.credentials_secret)?;

        let key = if spec.password_secret_key.is_empty() {
            DEFAULT_PASSWORD_SECRET_KEY.to_string()
        } else {
            spec.password_secret_key.clone()
        };

        let host = match &spec.host {
            Some(host) if host.trim().is_empty() => {
                return Err(invalid("host must not be empty when set"));
            }
            Some(host) => Some(host.trim().to_string()),
            None => None,
        };

        if spec.port == Some(0) {
            return Err(invalid("port must be between 1 and 65535"));
        }

        Ok(DeclaredDatabase {
            name,
            username,
            password_secret: SecretKeyRef {
                name: password_secret,
                key,
            },
            credentials_secret,
            host,
            port: spec.port,
        })
    }

    /// Rejects any change to a write-once field between two accepted versions.
    pub fn ensure_unchanged_identity(&self, updated: &DeclaredDatabase) -> Result<(), OperatorError> {
        let checks = [
            ("name", self.name == updated.name),
            ("username", self.username == updated.username),
            (
                "passwordSecret",
                self.password_secret.name == updated.password_secret.name,
            ),
            (
                "credentialsSecret",
                self.credentials_secret == updated.credentials_secret,
            ),
            ("host", self.host == updated.host),
            ("port", self.port == updated.port),
        ];

        match checks.into_iter().find(|(_, unchanged)| !unchanged) {
            Some((field, _)) => Err(OperatorError::ImmutableField {
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn invalid(message: impl Into<String>) -> OperatorError {
    OperatorError::InvalidSpec {
        message: message.into(),
    }
}

fn required(field: &str, value: &str) -> Result<String, OperatorError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn sql_identifier(field: &str, value: &str) -> Result<String, OperatorError> {
    let value = required(field, value)?;
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(format!(
            "{field} must be at most {MAX_IDENTIFIER_LEN} bytes"
        )));
    }
    if value.contains('\0') {
        return Err(invalid(format!("{field} must not contain NUL characters")));
    }
    Ok(value)
}

/// RFC 1123 subdomain, the naming rule for Secrets.
fn object_name(field: &str, value: &str) -> Result<String, OperatorError> {
    let value = required(field, value)?;
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = value.starts_with(|c: char| c.is_ascii_alphanumeric())
        && value.ends_with(|c: char| c.is_ascii_alphanumeric());

    if value.len() > MAX_OBJECT_NAME_LEN || !valid_chars || !valid_edges {
        return Err(invalid(format!(
            "{field} `{value}` is not a valid Kubernetes object name"
        )));
    }
    Ok(value)
}

/// Outcome of a creation primitive that tolerates an existing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;

    use super::*;
    use crate::domain::database::test_helpers::create_orders_spec;

    #[test]
    fn test_parse_valid_spec() {
        let declared = DeclaredDatabase::parse(&create_orders_spec()).unwrap();

        assert_eq!(declared.name, "orders");
        assert_eq!(declared.username, "orders_app");
        assert_eq!(
            declared.password_secret,
            SecretKeyRef {
                name: "orders-admin-pw".to_string(),
                key: "password".to_string(),
            }
        );
        assert_eq!(declared.credentials_secret, "orders-creds");
        assert_eq!(declared.host, None);
    }

    #[test]
    fn test_password_secret_key_defaults_when_omitted() {
        let spec: DatabaseSpec = serde_json::from_value(serde_json::json!({
            "name": "orders",
            "username": "orders_app",
            "passwordSecret": "orders-admin-pw",
            "credentialsSecret": "orders-creds",
        }))
        .unwrap();

        let declared = DeclaredDatabase::parse(&spec).unwrap();

        assert_eq!(declared.password_secret.key, "password");
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let absent = serde_json::from_value::<DatabaseSpec>(serde_json::json!({
            "name": "orders",
            "username": "orders_app",
            "passwordSecret": "orders-admin-pw",
        }));
        let mut blank = create_orders_spec();
        blank.credentials_secret = "  ".to_string();

        assert!(absent.is_err());
        assert_eq!(
            DeclaredDatabase::parse(&blank).unwrap_err(),
            OperatorError::InvalidSpec {
                message: "credentialsSecret is required".to_string(),
            }
        );
    }

    #[test]
    fn test_schema_guards_write_once_fields() {
        let crd = serde_json::to_value(Database::crd()).unwrap();
        let spec = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"];

        let required: Vec<&str> = spec["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|field| field.as_str())
            .collect();
        assert_eq!(
            required,
            ["credentialsSecret", "name", "passwordSecret", "username"]
        );

        for field in ["name", "username", "passwordSecret", "credentialsSecret", "host", "port"] {
            assert_eq!(
                spec["properties"][field]["x-kubernetes-validations"][0]["rule"],
                "self == oldSelf",
                "{field} should be write-once"
            );
        }
        assert!(
            spec["properties"]["passwordSecretKey"]
                .get("x-kubernetes-validations")
                .is_none()
        );
        assert_eq!(
            spec["x-kubernetes-validations"][0]["rule"],
            "has(self.host) == has(oldSelf.host)"
        );
    }

    #[test]
    fn test_malformed_fields_are_rejected() {
        let mut too_long = create_orders_spec();
        too_long.name = "x".repeat(64);
        let mut nul = create_orders_spec();
        nul.username = "orders\0app".to_string();
        let mut bad_secret = create_orders_spec();
        bad_secret.credentials_secret = "Orders_Creds".to_string();
        let mut trailing_dash = create_orders_spec();
        trailing_dash.password_secret = "orders-".to_string();
        let mut zero_port = create_orders_spec();
        zero_port.port = Some(0);
        let mut blank_host = create_orders_spec();
        blank_host.host = Some("  ".to_string());

        for spec in [too_long, nul, bad_secret, trailing_dash, zero_port, blank_host] {
            assert!(
                matches!(
                    DeclaredDatabase::parse(&spec),
                    Err(OperatorError::InvalidSpec { .. })
                ),
                "expected {spec:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_identifiers_may_need_quoting() {
        let mut spec = create_orders_spec();
        spec.name = "Orders \"EU\"".to_string();
        spec.username = "app; DROP ROLE admin".to_string();

        let declared = DeclaredDatabase::parse(&spec).unwrap();

        assert_eq!(declared.name, "Orders \"EU\"");
        assert_eq!(declared.username, "app; DROP ROLE admin");
    }

    #[test]
    fn test_identity_change_is_reported_by_field() {
        let original = DeclaredDatabase::parse(&create_orders_spec()).unwrap();
        let mut moved = original.clone();
        moved.host = Some("elsewhere".to_string());

        assert!(original.ensure_unchanged_identity(&original.clone()).is_ok());
        assert_eq!(
            original.ensure_unchanged_identity(&moved).unwrap_err(),
            OperatorError::ImmutableField {
                field: "host".to_string()
            }
        );
    }
}
