//! `CloudFormation` integration: data model, API client, poller, and
//! change-set manager.

pub mod changeset;
pub mod client;
pub mod poller;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use changeset::ChangeSetManager;
pub use client::{CfnClient, StackApi};
pub use poller::{PollConfig, StackPoller};
pub use types::{
    ChangeSetDescriptor, ChangeSetInput, ChangeSetStatus, ChangeSetType, Parameter,
    ResourceChange, StackDescriptor, StackOperationInput, StackStatus, TemplateLocation,
    UpdateDispatch,
};
