use sqlx::{Connection, Executor, PgConnection};
use tracing::{debug, error};

use crate::{
    domain::{
        database::{entities::ProvisionOutcome, ports::ProvisioningRepository},
        error::OperatorError,
    },
    infrastructure::database::sql,
};

/// SQLSTATE raised by `CREATE USER` when the role exists.
const DUPLICATE_OBJECT: &str = "42710";
/// SQLSTATE raised by `CREATE DATABASE` when the database exists.
const DUPLICATE_DATABASE: &str = "42P04";
/// SQLSTATE raised when a concurrent create wins the catalog insert.
const UNIQUE_VIOLATION: &str = "23505";

const USER_EXISTS: &[&str] = &[DUPLICATE_OBJECT, UNIQUE_VIOLATION];
const DATABASE_EXISTS: &[&str] = &[DUPLICATE_DATABASE, UNIQUE_VIOLATION];

/// Runs each primitive on its own connection. Statements are sent outside of
/// any transaction, so each one takes effect as soon as it completes.
#[derive(Clone)]
pub struct PostgresProvisioningRepository {
    database_url: String,
}

impl PostgresProvisioningRepository {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    async fn execute(&self, statement: &str) -> Result<(), sqlx::Error> {
        let mut conn = PgConnection::connect(&self.database_url).await?;
        let result = conn.execute(sqlx::raw_sql(statement)).await;

        if let Err(e) = conn.close().await {
            debug!("failed to close provisioning connection: {}", e);
        }

        result.map(|_| ())
    }

    async fn create(
        &self,
        statement: &str,
        duplicate_codes: &[&str],
    ) -> Result<ProvisionOutcome, OperatorError> {
        classify(self.execute(statement).await, duplicate_codes)
    }
}

/// Maps the result of a creation statement, reporting any of `duplicate_codes`
/// as an existing target.
fn classify(
    result: Result<(), sqlx::Error>,
    duplicate_codes: &[&str],
) -> Result<ProvisionOutcome, OperatorError> {
    match result {
        Ok(()) => Ok(ProvisionOutcome::Created),
        Err(e) if duplicate_codes.iter().any(|code| has_sqlstate(&e, code)) => {
            Ok(ProvisionOutcome::AlreadyExists)
        }
        Err(e) => {
            error!("failed to run provisioning statement: {}", e);
            Err(sql_error(e))
        }
    }
}

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|c| c == code).unwrap_or(false);
    }
    false
}

fn sql_error(err: sqlx::Error) -> OperatorError {
    OperatorError::SqlError {
        message: err.to_string(),
    }
}

impl ProvisioningRepository for PostgresProvisioningRepository {
    async fn ensure_user(
        &self,
        name: &str,
        password: &str,
    ) -> Result<ProvisionOutcome, OperatorError> {
        self.create(&sql::create_user(name, password), USER_EXISTS)
            .await
    }

    async fn ensure_database(
        &self,
        name: &str,
        owner: &str,
    ) -> Result<ProvisionOutcome, OperatorError> {
        self.create(&sql::create_database(name, owner), DATABASE_EXISTS)
            .await
    }

    async fn drop_database(&self, name: &str) -> Result<(), OperatorError> {
        self.execute(&sql::drop_database(name)).await.map_err(|e| {
            error!("failed to drop database {}: {}", name, e);
            sql_error(e)
        })
    }

    async fn drop_user(&self, name: &str) -> Result<(), OperatorError> {
        self.execute(&sql::drop_user(name)).await.map_err(|e| {
            error!("failed to drop role {}: {}", name, e);
            sql_error(e)
        })
    }
}
