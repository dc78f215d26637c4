use std::{collections::BTreeMap, fmt};

use crate::domain::database::entities::{ConnectionEndpoint, DeclaredDatabase};

/// Decoded fields of a Secret.
///
/// `Debug` only prints the keys so values never end up in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretData(BTreeMap<String, String>);

impl SecretData {
    pub fn new() -> Self {
        SecretData(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Entries of `desired` that are missing from, or differ in, `self`.
    ///
    /// Keys present only in `self` are left out: they may belong to someone else.
    pub fn diff(&self, desired: &SecretData) -> SecretData {
        desired
            .0
            .iter()
            .filter(|(key, value)| self.0.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, String)> for SecretData {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        SecretData(iter.into_iter().collect())
    }
}

impl IntoIterator for SecretData {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Debug for SecretData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Object a generated Secret is attached to for garbage collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOwner {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProvisionedCredentials {
    pub username: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl ProvisionedCredentials {
    pub fn new(declared: &DeclaredDatabase, password: &str, endpoint: ConnectionEndpoint) -> Self {
        ProvisionedCredentials {
            username: declared.username.clone(),
            password: password.to_string(),
            database: declared.name.clone(),
            host: endpoint.host,
            port: endpoint.port,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

impl From<&ProvisionedCredentials> for SecretData {
    fn from(credentials: &ProvisionedCredentials) -> Self {
        let mut data = SecretData::new();
        data.insert("username", credentials.username.clone());
        data.insert("password", credentials.password.clone());
        data.insert("database", credentials.database.clone());
        data.insert("host", credentials.host.clone());
        data.insert("port", credentials.port.to_string());
        data.insert("url", credentials.url());
        data
    }
}

impl fmt::Debug for ProvisionedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}
