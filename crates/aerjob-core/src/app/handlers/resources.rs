//! Execution resources owned by a job: creation and cleanup.
//!
//! Names and labels are derived from the job alone, so a repeated create is
//! recognised as already satisfied and cleanup can find what a previous
//! incarnation of the controller left behind.

use std::collections::BTreeMap;

use tracing::debug;

use crate::app::context::Context;
use crate::domain::{
    AerJob, ClusterError, EventReason, ExecutionUnitSpec, IdentityBindingSpec, JOB_LABEL,
    NAMESPACE_LABEL, OwnerRef,
};

fn owner(job: &AerJob) -> OwnerRef {
    OwnerRef {
        namespace: job.metadata.namespace.clone(),
        name: job.metadata.name.clone(),
        uid: job.metadata.uid,
    }
}

fn labels(job: &AerJob) -> BTreeMap<String, String> {
    BTreeMap::from([
        (JOB_LABEL.to_string(), job.metadata.name.clone()),
        (NAMESPACE_LABEL.to_string(), job.metadata.namespace.clone()),
    ])
}

pub fn identity_binding_spec(ctx: &Context, job: &AerJob) -> IdentityBindingSpec {
    IdentityBindingSpec {
        namespace: job.metadata.namespace.clone(),
        name: ctx.identity_binding_name(job),
        owner: owner(job),
        labels: labels(job),
    }
}

pub fn execution_unit_spec(ctx: &Context, job: &AerJob) -> ExecutionUnitSpec {
    let env = BTreeMap::from([
        ("AERJOB_NAME".to_string(), job.metadata.name.clone()),
        ("AERJOB_NAMESPACE".to_string(), job.metadata.namespace.clone()),
        ("AERJOB_BACKEND".to_string(), job.spec.backend.clone()),
        ("AERJOB_SHOTS".to_string(), job.spec.shots.to_string()),
    ]);
    ExecutionUnitSpec {
        namespace: job.metadata.namespace.clone(),
        name: ctx.execution_unit_name(job),
        image: job
            .spec
            .image
            .clone()
            .unwrap_or_else(|| ctx.config.execution_image.clone()),
        identity_binding: ctx.identity_binding_name(job),
        owner: owner(job),
        labels: labels(job),
        env,
    }
}

/// Record a create call, treating `AlreadyExists` as success.
fn confirm(
    ctx: &Context,
    job: &AerJob,
    kind: &str,
    name: &str,
    result: Result<(), ClusterError>,
) -> Result<(), ClusterError> {
    match result {
        Ok(()) => {
            debug!(key = %job.key(), kind, name, "created");
            ctx.emit(
                job.key(),
                EventReason::ResourceCreated {
                    kind: kind.to_string(),
                    name: name.to_string(),
                },
            );
            Ok(())
        }
        Err(ClusterError::AlreadyExists { .. }) => {
            debug!(key = %job.key(), kind, name, "already exists");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Create the identity binding, then the execution unit that runs under it.
pub async fn ensure_execution_resources(ctx: &Context, job: &AerJob) -> Result<(), ClusterError> {
    let binding = identity_binding_spec(ctx, job);
    let created = ctx.cluster.create_identity_binding(&binding).await;
    confirm(ctx, job, "IdentityBinding", &binding.name, created)?;

    let unit = execution_unit_spec(ctx, job);
    let created = ctx.cluster.create_execution_unit(&unit).await;
    confirm(ctx, job, "ExecutionUnit", &unit.name, created)
}

/// Delete every execution unit labelled for the job, then its identity
/// binding. Objects that are already gone count as deleted.
pub async fn cleanup_execution_resources(ctx: &Context, job: &AerJob) -> Result<(), ClusterError> {
    let namespace = &job.metadata.namespace;
    let units = ctx
        .cluster
        .list_execution_units(namespace, &[(JOB_LABEL, job.metadata.name.as_str())])
        .await?;
    for unit in units {
        let deleted = ctx
            .cluster
            .delete_execution_unit(namespace, &unit.spec.name)
            .await;
        forget_missing(ctx, job, "ExecutionUnit", &unit.spec.name, deleted)?;
    }

    let binding = ctx.identity_binding_name(job);
    let deleted = ctx.cluster.delete_identity_binding(namespace, &binding).await;
    forget_missing(ctx, job, "IdentityBinding", &binding, deleted)
}

fn forget_missing(
    ctx: &Context,
    job: &AerJob,
    kind: &str,
    name: &str,
    result: Result<(), ClusterError>,
) -> Result<(), ClusterError> {
    match result {
        Ok(()) => {
            debug!(key = %job.key(), kind, name, "deleted");
            ctx.emit(
                job.key(),
                EventReason::ResourceDeleted {
                    kind: kind.to_string(),
                    name: name.to_string(),
                },
            );
            Ok(())
        }
        Err(ClusterError::NotFound { .. }) => Ok(()),
        Err(err) => Err(err),
    }
}
