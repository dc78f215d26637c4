use std::{collections::BTreeMap, sync::Arc, time::Duration};

use futures::StreamExt;
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{ListParams, Patch, PatchParams},
    runtime::{
        Controller,
        controller::Action,
        finalizer::{Error as FinalizerError, Event as FinalizerEvent, finalizer},
        watcher,
    },
};
use serde_json::json;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    application::OperatorService,
    domain::{
        credential::entities::ResourceOwner,
        database::{
            entities::{Database, DatabaseSpec, DeclaredDatabase},
            ports::DatabaseService,
        },
        error::OperatorError,
    },
};

pub const DATABASE_FINALIZER: &str = "minipg.dev/cleanup";
/// Spec of the last successful create or update pass, as JSON.
pub const LAST_APPLIED_ANNOTATION: &str = "minipg.dev/last-applied-spec";

pub struct Context {
    pub client: Client,
    pub service: Arc<OperatorService>,
    pub retry_backoff: Duration,
}

/// Which handler an apply event is routed to.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    Create,
    Update { previous: DatabaseSpec },
    Resync,
}

pub fn last_applied(database: &Database) -> Result<Option<DatabaseSpec>, OperatorError> {
    database
        .annotations()
        .get(LAST_APPLIED_ANNOTATION)
        .map(|raw| {
            serde_json::from_str(raw).map_err(|e| OperatorError::InvalidSpec {
                message: format!("annotation {LAST_APPLIED_ANNOTATION} is malformed: {e}"),
            })
        })
        .transpose()
}

pub fn dispatch(database: &Database) -> Result<Dispatch, OperatorError> {
    Ok(match last_applied(database)? {
        None => Dispatch::Create,
        Some(previous) if previous == database.spec => Dispatch::Resync,
        Some(previous) => Dispatch::Update { previous },
    })
}

pub fn owner_for(database: &Database) -> Result<ResourceOwner, OperatorError> {
    let uid = database
        .uid()
        .ok_or_else(|| OperatorError::InternalServerError {
            message: format!("Database {} has no uid", database.name_any()),
        })?;

    Ok(ResourceOwner {
        api_version: Database::api_version(&()).into_owned(),
        kind: Database::kind(&()).into_owned(),
        name: database.name_any(),
        uid,
    })
}

pub fn next_action(error: &OperatorError, default_backoff: Duration) -> Action {
    if let Some(delay) = error.retry_delay() {
        return Action::requeue(delay);
    }
    if error.is_terminal() {
        return Action::await_change();
    }
    Action::requeue(default_backoff)
}

fn from_finalizer_error(error: FinalizerError<OperatorError>) -> OperatorError {
    match error {
        FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => e,
        other => OperatorError::KubeApiError {
            message: other.to_string(),
        },
    }
}

async fn record_applied(api: &Api<Database>, database: &Database) -> Result<(), OperatorError> {
    let spec = serde_json::to_string(&database.spec).map_err(|e| {
        OperatorError::InternalServerError {
            message: e.to_string(),
        }
    })?;
    let annotations = BTreeMap::from([(LAST_APPLIED_ANNOTATION.to_string(), spec)]);
    let patch = json!({ "metadata": { "annotations": annotations } });

    api.patch(
        &database.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await
    .map_err(|e| OperatorError::KubeApiError {
        message: e.to_string(),
    })?;

    Ok(())
}

async fn apply(
    api: &Api<Database>,
    ctx: &Context,
    database: &Database,
    namespace: &str,
) -> Result<Action, OperatorError> {
    match dispatch(database)? {
        Dispatch::Create => {
            let owner = owner_for(database)?;
            ctx.service
                .on_create(&database.spec, namespace, &owner)
                .await?;
            record_applied(api, database).await?;
        }
        Dispatch::Update { previous } => {
            ctx.service
                .on_update(&previous, &database.spec, namespace)
                .await?;
            record_applied(api, database).await?;
        }
        Dispatch::Resync => debug!("spec unchanged since last pass"),
    }

    Ok(Action::await_change())
}

/// Spec whose resources a deletion must drop, or `None` when the object was
/// never provisioned and the finalizer can go.
pub fn cleanup_target(database: &Database) -> Option<DatabaseSpec> {
    // Drop what was provisioned, not what a rejected edit points at.
    match last_applied(database) {
        Ok(Some(spec)) => Some(spec),
        Ok(None) => match DeclaredDatabase::parse(&database.spec) {
            Ok(_) => Some(database.spec.clone()),
            Err(e) => {
                // Validation runs before any side effect, so nothing exists to drop.
                info!("releasing never provisioned database: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("falling back to current spec: {}", e);
            Some(database.spec.clone())
        }
    }
}

async fn cleanup(
    ctx: &Context,
    database: &Database,
    namespace: &str,
) -> Result<Action, OperatorError> {
    if let Some(spec) = cleanup_target(database) {
        ctx.service.on_delete(&spec, namespace).await?;
    }
    Ok(Action::await_change())
}

async fn reconcile(database: Arc<Database>, ctx: Arc<Context>) -> Result<Action, OperatorError> {
    let namespace = database
        .namespace()
        .ok_or_else(|| OperatorError::InvalidSpec {
            message: "Database resources must be namespaced".to_string(),
        })?;
    let api: Api<Database> = Api::namespaced(ctx.client.clone(), &namespace);
    let span = info_span!("reconcile", database = %database.name_any(), namespace = %namespace);

    let api_ref = &api;
    let ctx_ref = ctx.as_ref();
    let ns = namespace.as_str();

    finalizer(&api, DATABASE_FINALIZER, database, |event| async move {
        match event {
            FinalizerEvent::Apply(database) => apply(api_ref, ctx_ref, &database, ns).await,
            FinalizerEvent::Cleanup(database) => cleanup(ctx_ref, &database, ns).await,
        }
    })
    .instrument(span)
    .await
    .map_err(from_finalizer_error)
}

fn error_policy(database: Arc<Database>, error: &OperatorError, ctx: Arc<Context>) -> Action {
    let action = next_action(error, ctx.retry_backoff);

    if error.is_terminal() {
        error!(
            database = %database.name_any(),
            "reconciliation rejected, waiting for a change: {}", error
        );
    } else {
        warn!(database = %database.name_any(), "reconciliation failed: {}", error);
    }

    action
}

pub async fn run_database_controller(
    client: Client,
    service: Arc<OperatorService>,
    retry_backoff: Duration,
) -> Result<(), OperatorError> {
    let databases: Api<Database> = Api::all(client.clone());

    databases
        .list(&ListParams::default().limit(1))
        .await
        .map_err(|e| {
            error!("Database CRD is not queryable, is it installed? {:?}", e);
            OperatorError::KubeApiError {
                message: e.to_string(),
            }
        })?;

    let context = Arc::new(Context {
        client,
        service,
        retry_backoff,
    });

    Controller::new(databases, watcher::Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!("reconciled {}", object),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    info!("database controller shut down");
    Ok(())
}
