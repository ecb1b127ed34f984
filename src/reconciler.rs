//! Stack reconciliation engine.
//!
//! This module implements the upsert/delete state machine that brings a
//! named stack to its desired state: it probes for existence, decides
//! between plain create/update, change-set-mediated apply, and reviewed
//! apply, polls every asynchronous operation to a terminal state, and
//! empties dependent buckets before deletion. Within one reconcile call
//! the steps are strictly sequential; concurrency appears only in the
//! bucket-drain fan-out.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cfn::changeset::ChangeSetManager;
use crate::cfn::client::StackApi;
use crate::cfn::poller::{PollConfig, StackPoller};
use crate::cfn::types::{
    ChangeSetDescriptor, ChangeSetInput, ChangeSetType, Parameter, StackDescriptor,
    StackOperationInput, TemplateLocation, UpdateDispatch,
};
use crate::error::{ReconcileError, Result, StackError};
use crate::store::{BucketDrainer, ObjectStore};
use crate::template::{contains_transforms, TemplateSource, TemplateStager};

/// Output keys with this suffix name buckets that must be emptied
/// before the stack can be deleted.
const BUCKET_OUTPUT_SUFFIX: &str = "Bucket";

/// Options controlling one upsert invocation.
#[derive(Debug, Clone, Default)]
pub struct UpsertOptions {
    /// Create a preview change set and ask the reviewer before applying.
    pub review: bool,
    /// Bucket to stage a local template into before the upsert.
    pub s3_bucket: Option<String>,
    /// Key prefix for staged templates.
    pub s3_prefix: Option<String>,
    /// Whether the template carries transforms. `None` infers it by
    /// scanning the template body.
    pub contains_transforms: Option<bool>,
}

/// Terminal outcome of an upsert.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// A mutation was applied; carries the terminal stack descriptor.
    Applied(StackDescriptor),
    /// Nothing to do; carries the current descriptor when one exists.
    NoChanges(Option<StackDescriptor>),
}

impl UpsertOutcome {
    /// The stack descriptor, when one is available.
    #[must_use]
    pub const fn stack(&self) -> Option<&StackDescriptor> {
        match self {
            Self::Applied(stack) => Some(stack),
            Self::NoChanges(stack) => stack.as_ref(),
        }
    }
}

impl std::fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied(stack) => {
                write!(f, "Stack {} is {}", stack.name, stack.status)
            }
            Self::NoChanges(Some(stack)) => {
                write!(f, "Stack {} is unchanged ({})", stack.name, stack.status)
            }
            Self::NoChanges(None) => write!(f, "No changes"),
        }
    }
}

/// Decision returned by a change-set reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Apply the update.
    Approved,
    /// Abort without mutating the stack.
    Rejected,
}

/// Presents a populated preview change set for approval.
///
/// The console implementation lives in the CLI; tests script the
/// decision. By the time the reviewer is asked, the preview change set
/// has already been deleted.
#[async_trait]
pub trait ChangeSetReviewer: Send + Sync {
    /// Reviews a populated change set.
    async fn review(&self, change_set: &ChangeSetDescriptor) -> Result<ReviewDecision>;
}

/// The stack reconciler.
pub struct StackReconciler {
    /// Provider API.
    api: Arc<dyn StackApi>,
    /// Change-set reviewer.
    reviewer: Arc<dyn ChangeSetReviewer>,
    /// Shared poller.
    poller: StackPoller,
    /// Change-set manager.
    change_sets: ChangeSetManager,
    /// Bucket drainer.
    drainer: BucketDrainer,
    /// Template stager.
    stager: TemplateStager,
}

/// Generates a unique change-set name.
fn generated_change_set_name() -> String {
    format!("stackpilot-{}", Uuid::new_v4())
}

impl StackReconciler {
    /// Creates a reconciler with the default polling configuration.
    #[must_use]
    pub fn new(
        api: Arc<dyn StackApi>,
        store: Arc<dyn ObjectStore>,
        reviewer: Arc<dyn ChangeSetReviewer>,
    ) -> Self {
        let config = PollConfig::default();
        Self {
            poller: StackPoller::new(Arc::clone(&api)).with_config(config),
            change_sets: ChangeSetManager::new(Arc::clone(&api), config),
            drainer: BucketDrainer::new(Arc::clone(&store)),
            stager: TemplateStager::new(store),
            api,
            reviewer,
        }
    }

    /// Sets the polling configuration.
    #[must_use]
    pub fn with_poll_config(mut self, config: PollConfig) -> Self {
        self.poller = StackPoller::new(Arc::clone(&self.api)).with_config(config);
        self.change_sets = ChangeSetManager::new(Arc::clone(&self.api), config);
        self
    }

    /// Whether the stack exists.
    ///
    /// # Errors
    ///
    /// A "does not exist" probe result is `Ok(false)`; any other
    /// provider error propagates instead of being misread as absence.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.api.describe_stack(name).await?.is_some())
    }

    /// Brings the named stack to the desired state.
    ///
    /// Creates the stack when absent, updates it when present, and
    /// routes transform-bearing templates through change sets. With
    /// `options.review` a preview change set is presented before any
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing local template (before any
    /// remote call), a rejected review, a terminal failure status, or
    /// any provider error.
    pub async fn upsert(
        &self,
        name: &str,
        template: TemplateSource,
        parameters: &[Parameter],
        options: &UpsertOptions,
    ) -> Result<UpsertOutcome> {
        // The transform scan reads the body once; a missing local file
        // fails here, before any API call.
        let transforms = match options.contains_transforms {
            Some(transforms) => transforms,
            None => template
                .read_body()?
                .is_some_and(|body| contains_transforms(&body)),
        };

        // Stage a local template first, then continue against the
        // remote URL with the transform flag carried forward.
        let template = match options.s3_bucket.as_deref() {
            Some(bucket) if matches!(&template, TemplateSource::Path(_)) => {
                let body = template.read_body()?.unwrap_or_default();
                let url = self
                    .stager
                    .stage(bucket, options.s3_prefix.as_deref(), name, &body)
                    .await?;
                TemplateSource::Url(url)
            }
            _ => template,
        };

        let location = template.resolve()?;
        let existing = self.api.describe_stack(name).await?;

        match existing {
            None => self.create(name, location, parameters, transforms).await,
            Some(_) if options.review => {
                self.update_with_review(name, location, parameters, transforms)
                    .await
            }
            Some(_) => self.update(name, location, parameters, transforms).await,
        }
    }

    /// ABSENT branch: create the stack, via change set when the
    /// template carries transforms.
    async fn create(
        &self,
        name: &str,
        location: TemplateLocation,
        parameters: &[Parameter],
        transforms: bool,
    ) -> Result<UpsertOutcome> {
        info!("Stack {name} does not exist, creating");

        if transforms {
            return self
                .apply_via_change_set(name, ChangeSetType::Create, location, parameters)
                .await;
        }

        // Rollback is disabled so a failed create leaves its resources
        // inspectable instead of vanishing mid-diagnosis.
        let input =
            StackOperationInput::new(name, location, parameters).with_rollback_disabled();
        self.api.create_stack(&input).await?;

        let stack = self.poller.wait_for_stack(name).await?.ok_or_else(|| {
            StackError::NotFound {
                name: name.to_string(),
            }
        })?;
        Ok(UpsertOutcome::Applied(stack))
    }

    /// EXISTS branch without review: direct update, or change set when
    /// the template carries transforms.
    async fn update(
        &self,
        name: &str,
        location: TemplateLocation,
        parameters: &[Parameter],
        transforms: bool,
    ) -> Result<UpsertOutcome> {
        if transforms {
            return self
                .apply_via_change_set(name, ChangeSetType::Update, location, parameters)
                .await;
        }

        let input = StackOperationInput::new(name, location, parameters);
        match self.api.update_stack(&input).await? {
            UpdateDispatch::Started => {
                let stack = self.poller.wait_for_stack(name).await?.ok_or_else(|| {
                    StackError::NotFound {
                        name: name.to_string(),
                    }
                })?;
                Ok(UpsertOutcome::Applied(stack))
            }
            UpdateDispatch::NoChanges => {
                let stack = self.api.describe_stack(name).await?;
                Ok(UpsertOutcome::NoChanges(stack))
            }
        }
    }

    /// EXISTS branch with review: preview change set, operator
    /// decision, then apply-or-abort.
    async fn update_with_review(
        &self,
        name: &str,
        location: TemplateLocation,
        parameters: &[Parameter],
        transforms: bool,
    ) -> Result<UpsertOutcome> {
        let preview_name = generated_change_set_name();
        let input = ChangeSetInput::new(
            name,
            &preview_name,
            ChangeSetType::Update,
            location.clone(),
            parameters,
        );
        let preview = self.change_sets.create(&input).await?;

        // The preview is deleted before apply-or-abort, regardless of
        // the outcome; it is never left behind.
        self.change_sets.delete(name, &preview_name).await?;

        let Some(preview) = preview else {
            debug!("Preview change set for {name} contained no changes");
            let stack = self.poller.wait_for_stack(name).await?;
            return Ok(UpsertOutcome::NoChanges(stack));
        };

        match self.reviewer.review(&preview).await? {
            ReviewDecision::Approved => {
                info!("Change set for {name} approved, applying");
                self.update(name, location, parameters, transforms).await
            }
            ReviewDecision::Rejected => Err(ReconcileError::ReviewRejected {
                stack_name: name.to_string(),
                change_set: preview_name,
            }
            .into()),
        }
    }

    /// Creates and executes a change set, resolving a no-op as
    /// `NoChanges`. Used for every transform-bearing template.
    async fn apply_via_change_set(
        &self,
        name: &str,
        change_set_type: ChangeSetType,
        location: TemplateLocation,
        parameters: &[Parameter],
    ) -> Result<UpsertOutcome> {
        let change_set_name = generated_change_set_name();
        let input = ChangeSetInput::new(
            name,
            &change_set_name,
            change_set_type,
            location,
            parameters,
        );

        let Some(change_set) = self.change_sets.create(&input).await? else {
            // The failed no-op record is still cleared.
            self.change_sets.delete(name, &change_set_name).await?;
            let stack = self.api.describe_stack(name).await?;
            return Ok(UpsertOutcome::NoChanges(stack));
        };

        let stack = self.change_sets.execute(name, &change_set.name).await?;
        Ok(UpsertOutcome::Applied(stack))
    }

    /// Deletes the named stack, emptying its buckets first.
    ///
    /// Output keys ending in `Bucket` name object stores that must be
    /// drained before deletion can succeed; independent buckets are
    /// drained concurrently and joined before the delete call. Deleting
    /// a stack that does not exist is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if any drain fails (the delete call is then not
    /// issued), if the delete request is rejected, or if the stack ends
    /// in `DELETE_FAILED`.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let Some(stack) = self.api.describe_stack(name).await? else {
            info!("Stack {name} does not exist, nothing to delete");
            return Ok(());
        };

        let buckets: Vec<&str> = stack
            .outputs
            .iter()
            .filter(|(key, _)| key.ends_with(BUCKET_OUTPUT_SUFFIX))
            .map(|(_, value)| value.as_str())
            .collect();

        if !buckets.is_empty() {
            info!(
                "Emptying {} bucket(s) before deleting stack {name}",
                buckets.len()
            );
            try_join_all(buckets.iter().map(|bucket| self.drainer.drain(bucket))).await?;
        }

        self.api.delete_stack(name).await?;
        self.poller.wait_for_stack(name).await?;

        info!("Stack {name} deleted");
        Ok(())
    }

    /// Returns the stack's output key/value mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::NotFound`] if the stack does not exist.
    pub async fn describe_outputs(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let stack = self.api.describe_stack(name).await?.ok_or_else(|| {
            StackError::NotFound {
                name: name.to_string(),
            }
        })?;
        Ok(stack.outputs)
    }
}
