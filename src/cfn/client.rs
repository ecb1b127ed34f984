//! `CloudFormation` API client implementation.
//!
//! This module defines the [`StackApi`] seam the reconciler is built
//! against, plus the production implementation backed by
//! `aws-sdk-cloudformation`. "Stack does not exist" and "change set does
//! not exist" are mapped to `None` rather than errors so callers can tell
//! absence apart from transport failures.

use async_trait::async_trait;
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{
    Capability, ChangeSetType as SdkChangeSetType, Parameter as SdkParameter,
};
use tracing::{debug, info};

use crate::error::{NoOpReason, Result, StackError};

use super::types::{
    ChangeSetDescriptor, ChangeSetInput, ChangeSetStatus, ChangeSetType, Parameter,
    ResourceChange, StackDescriptor, StackOperationInput, StackStatus, TemplateLocation,
    UpdateDispatch,
};

/// Interface to the stack provider's control plane.
///
/// All reconciler logic depends on this trait so tests can script the
/// provider's behavior.
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Describes a stack by name.
    ///
    /// Returns `None` if the stack does not exist. Any other provider
    /// error propagates unchanged.
    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescriptor>>;

    /// Submits a create-stack request. Completion is asynchronous.
    async fn create_stack(&self, input: &StackOperationInput) -> Result<()>;

    /// Submits an update-stack request.
    ///
    /// A provider rejection matching a recognized no-op reason resolves
    /// as [`UpdateDispatch::NoChanges`] rather than an error.
    async fn update_stack(&self, input: &StackOperationInput) -> Result<UpdateDispatch>;

    /// Submits a delete-stack request. Completion is asynchronous.
    async fn delete_stack(&self, name: &str) -> Result<()>;

    /// Submits a create-change-set request. Completion is asynchronous.
    async fn create_change_set(&self, input: &ChangeSetInput) -> Result<()>;

    /// Describes a change set.
    ///
    /// Returns `None` if the change set does not exist.
    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Option<ChangeSetDescriptor>>;

    /// Triggers execution of a change set. Completion is polled on the
    /// stack, not the change set.
    async fn execute_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()>;

    /// Requests deletion of a change set.
    async fn delete_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()>;
}

/// `CloudFormation`-backed [`StackApi`] implementation.
#[derive(Debug, Clone)]
pub struct CfnClient {
    /// SDK client.
    client: Client,
}

impl CfnClient {
    /// Creates a client from a shared AWS configuration.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Creates a client from an existing SDK client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Maps our parameter type onto the SDK's.
fn sdk_parameters(parameters: &[Parameter]) -> Vec<SdkParameter> {
    parameters
        .iter()
        .map(|p| {
            SdkParameter::builder()
                .parameter_key(&p.key)
                .parameter_value(&p.value)
                .build()
        })
        .collect()
}

fn sdk_capabilities(capabilities: &[String]) -> Vec<Capability> {
    capabilities
        .iter()
        .map(|c| Capability::from(c.as_str()))
        .collect()
}

/// Whether a provider error is the "stack with id X does not exist"
/// validation rejection, as opposed to a transport/auth/throttling error.
fn is_stack_not_found(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("ValidationError")
        && message.is_some_and(|m| m.contains("does not exist"))
}

fn map_stack(stack: &aws_sdk_cloudformation::types::Stack) -> StackDescriptor {
    let outputs = stack
        .outputs()
        .iter()
        .filter_map(|o| {
            let key = o.output_key()?;
            let value = o.output_value()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect();

    let parameters = stack
        .parameters()
        .iter()
        .filter_map(|p| {
            let key = p.parameter_key()?;
            let value = p.parameter_value()?;
            Some(Parameter::new(key, value))
        })
        .collect();

    StackDescriptor {
        name: stack.stack_name().unwrap_or_default().to_string(),
        stack_id: stack.stack_id().map(ToString::to_string),
        status: stack
            .stack_status()
            .map_or(StackStatus::Unknown, |s| StackStatus::parse(s.as_str())),
        status_reason: stack.stack_status_reason().map(ToString::to_string),
        outputs,
        parameters,
    }
}

#[async_trait]
impl StackApi for CfnClient {
    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescriptor>> {
        debug!("Describing stack: {name}");

        let result = self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.stacks().first().map(map_stack)),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if is_stack_not_found(service_err.code(), service_err.message()) {
                    Ok(None)
                } else {
                    Err(StackError::api(format!("describe-stacks error: {service_err}")).into())
                }
            }
        }
    }

    async fn create_stack(&self, input: &StackOperationInput) -> Result<()> {
        info!("Creating stack: {}", input.stack_name);

        let mut request = self
            .client
            .create_stack()
            .stack_name(&input.stack_name)
            .set_parameters(Some(sdk_parameters(&input.parameters)))
            .set_capabilities(Some(sdk_capabilities(&input.capabilities)))
            .disable_rollback(input.disable_rollback);

        request = match &input.template {
            TemplateLocation::Body(body) => request.template_body(body),
            TemplateLocation::Url(url) => request.template_url(url),
        };

        request.send().await.map_err(|e| {
            let service_err = e.into_service_error();
            StackError::api(format!("create-stack error: {service_err}"))
        })?;

        Ok(())
    }

    async fn update_stack(&self, input: &StackOperationInput) -> Result<UpdateDispatch> {
        info!("Updating stack: {}", input.stack_name);

        let mut request = self
            .client
            .update_stack()
            .stack_name(&input.stack_name)
            .set_parameters(Some(sdk_parameters(&input.parameters)))
            .set_capabilities(Some(sdk_capabilities(&input.capabilities)));

        request = match &input.template {
            TemplateLocation::Body(body) => request.template_body(body),
            TemplateLocation::Url(url) => request.template_url(url),
        };

        match request.send().await {
            Ok(_) => Ok(UpdateDispatch::Started),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                let message = service_err.message().unwrap_or_default();
                if NoOpReason::detect(message) == Some(NoOpReason::NoUpdatesToPerform) {
                    info!("Stack {} has no updates to perform", input.stack_name);
                    Ok(UpdateDispatch::NoChanges)
                } else {
                    Err(StackError::api(format!("update-stack error: {service_err}")).into())
                }
            }
        }
    }

    async fn delete_stack(&self, name: &str) -> Result<()> {
        info!("Deleting stack: {name}");

        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                StackError::api(format!("delete-stack error: {service_err}"))
            })?;

        Ok(())
    }

    async fn create_change_set(&self, input: &ChangeSetInput) -> Result<()> {
        info!(
            "Creating change set {} ({}) on stack {}",
            input.change_set_name,
            input.change_set_type.as_str(),
            input.stack_name
        );

        let mut request = self
            .client
            .create_change_set()
            .stack_name(&input.stack_name)
            .change_set_name(&input.change_set_name)
            .change_set_type(SdkChangeSetType::from(input.change_set_type.as_str()))
            .set_parameters(Some(sdk_parameters(&input.parameters)))
            .set_capabilities(Some(sdk_capabilities(&input.capabilities)));

        request = match &input.template {
            TemplateLocation::Body(body) => request.template_body(body),
            TemplateLocation::Url(url) => request.template_url(url),
        };

        request.send().await.map_err(|e| {
            let service_err = e.into_service_error();
            StackError::api(format!("create-change-set error: {service_err}"))
        })?;

        Ok(())
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<Option<ChangeSetDescriptor>> {
        debug!("Describing change set {change_set_name} on stack {stack_name}");

        let result = self
            .client
            .describe_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await;

        match result {
            Ok(output) => {
                let changes = output
                    .changes()
                    .iter()
                    .filter_map(|c| c.resource_change())
                    .map(|rc| ResourceChange {
                        action: rc
                            .action()
                            .map_or_else(String::new, |a| a.as_str().to_string()),
                        logical_id: rc.logical_resource_id().unwrap_or_default().to_string(),
                        resource_type: rc.resource_type().map(ToString::to_string),
                    })
                    .collect();

                Ok(Some(ChangeSetDescriptor {
                    stack_name: stack_name.to_string(),
                    name: output
                        .change_set_name()
                        .unwrap_or(change_set_name)
                        .to_string(),
                    // The provider does not echo the type back on describe;
                    // the change-set manager patches it from its own input.
                    change_set_type: ChangeSetType::Update,
                    status: output
                        .status()
                        .map_or(ChangeSetStatus::Unknown, |s| {
                            ChangeSetStatus::parse(s.as_str())
                        }),
                    status_reason: output.status_reason().map(ToString::to_string),
                    changes,
                }))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_change_set_not_found_exception() {
                    Ok(None)
                } else {
                    Err(StackError::api(format!(
                        "describe-change-set error: {service_err}"
                    ))
                    .into())
                }
            }
        }
    }

    async fn execute_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        info!("Executing change set {change_set_name} on stack {stack_name}");

        self.client
            .execute_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                StackError::api(format!("execute-change-set error: {service_err}"))
            })?;

        Ok(())
    }

    async fn delete_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        info!("Deleting change set {change_set_name} on stack {stack_name}");

        self.client
            .delete_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                StackError::api(format!("delete-change-set error: {service_err}"))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_requires_validation_error_code() {
        assert!(is_stack_not_found(
            Some("ValidationError"),
            Some("Stack with id app-stack does not exist"),
        ));
        // A throttling error must never be read as absence.
        assert!(!is_stack_not_found(Some("Throttling"), Some("Rate exceeded")));
        assert!(!is_stack_not_found(
            Some("ValidationError"),
            Some("Template format error"),
        ));
        assert!(!is_stack_not_found(None, Some("does not exist")));
    }
}
