//! Scripted [`StackApi`] fake for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, StackError};

use super::client::StackApi;
use super::types::{
    ChangeSetDescriptor, ChangeSetInput, StackDescriptor, StackOperationInput, UpdateDispatch,
};

/// Scripted provider: describe calls pop queued responses (the last one is
/// sticky once the queue runs dry), mutations are recorded for assertions.
#[derive(Default)]
pub(crate) struct FakeStackApi {
    describe_stack_queue: Mutex<VecDeque<std::result::Result<Option<StackDescriptor>, String>>>,
    describe_stack_last: Mutex<Option<StackDescriptor>>,
    describe_stack_count: Mutex<usize>,

    describe_change_set_queue: Mutex<VecDeque<Option<ChangeSetDescriptor>>>,
    describe_change_set_last: Mutex<Option<ChangeSetDescriptor>>,
    describe_change_set_count: Mutex<usize>,

    update_dispatch_queue: Mutex<VecDeque<UpdateDispatch>>,

    created_stacks: Mutex<Vec<StackOperationInput>>,
    updated_stacks: Mutex<Vec<StackOperationInput>>,
    deleted_stacks: Mutex<Vec<String>>,
    created_change_sets: Mutex<Vec<ChangeSetInput>>,
    executed_change_sets: Mutex<Vec<(String, String)>>,
    deleted_change_sets: Mutex<Vec<(String, String)>>,
}

impl FakeStackApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn queue_describe_stack(&self, result: Option<StackDescriptor>) {
        self.describe_stack_queue
            .lock()
            .expect("lock poisoned")
            .push_back(Ok(result));
    }

    pub(crate) fn queue_describe_stack_error(&self, message: &str) {
        self.describe_stack_queue
            .lock()
            .expect("lock poisoned")
            .push_back(Err(message.to_string()));
    }

    pub(crate) fn queue_describe_change_set(&self, result: Option<ChangeSetDescriptor>) {
        self.describe_change_set_queue
            .lock()
            .expect("lock poisoned")
            .push_back(result);
    }

    pub(crate) fn queue_update_dispatch(&self, dispatch: UpdateDispatch) {
        self.update_dispatch_queue
            .lock()
            .expect("lock poisoned")
            .push_back(dispatch);
    }

    pub(crate) fn describe_stack_calls(&self) -> usize {
        *self.describe_stack_count.lock().expect("lock poisoned")
    }

    pub(crate) fn describe_change_set_calls(&self) -> usize {
        *self.describe_change_set_count.lock().expect("lock poisoned")
    }

    pub(crate) fn created_stacks(&self) -> Vec<StackOperationInput> {
        self.created_stacks.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn updated_stacks(&self) -> Vec<StackOperationInput> {
        self.updated_stacks.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn deleted_stacks(&self) -> Vec<String> {
        self.deleted_stacks.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn created_change_sets(&self) -> Vec<ChangeSetInput> {
        self.created_change_sets
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    pub(crate) fn executed_change_sets(&self) -> Vec<(String, String)> {
        self.executed_change_sets
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    pub(crate) fn deleted_change_sets(&self) -> Vec<(String, String)> {
        self.deleted_change_sets
            .lock()
            .expect("lock poisoned")
            .clone()
    }
}

#[async_trait]
impl StackApi for FakeStackApi {
    async fn describe_stack(&self, _name: &str) -> Result<Option<StackDescriptor>> {
        *self.describe_stack_count.lock().expect("lock poisoned") += 1;

        let next = self
            .describe_stack_queue
            .lock()
            .expect("lock poisoned")
            .pop_front();

        match next {
            Some(Ok(result)) => {
                *self.describe_stack_last.lock().expect("lock poisoned") = result.clone();
                Ok(result)
            }
            Some(Err(message)) => Err(StackError::api(message).into()),
            None => Ok(self.describe_stack_last.lock().expect("lock poisoned").clone()),
        }
    }

    async fn create_stack(&self, input: &StackOperationInput) -> Result<()> {
        self.created_stacks
            .lock()
            .expect("lock poisoned")
            .push(input.clone());
        Ok(())
    }

    async fn update_stack(&self, input: &StackOperationInput) -> Result<UpdateDispatch> {
        self.updated_stacks
            .lock()
            .expect("lock poisoned")
            .push(input.clone());

        Ok(self
            .update_dispatch_queue
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(UpdateDispatch::Started))
    }

    async fn delete_stack(&self, name: &str) -> Result<()> {
        self.deleted_stacks
            .lock()
            .expect("lock poisoned")
            .push(name.to_string());
        Ok(())
    }

    async fn create_change_set(&self, input: &ChangeSetInput) -> Result<()> {
        self.created_change_sets
            .lock()
            .expect("lock poisoned")
            .push(input.clone());
        Ok(())
    }

    async fn describe_change_set(
        &self,
        _stack_name: &str,
        _change_set_name: &str,
    ) -> Result<Option<ChangeSetDescriptor>> {
        *self.describe_change_set_count.lock().expect("lock poisoned") += 1;

        let next = self
            .describe_change_set_queue
            .lock()
            .expect("lock poisoned")
            .pop_front();

        match next {
            Some(result) => {
                *self.describe_change_set_last.lock().expect("lock poisoned") = result.clone();
                Ok(result)
            }
            None => Ok(self
                .describe_change_set_last
                .lock()
                .expect("lock poisoned")
                .clone()),
        }
    }

    async fn execute_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        self.executed_change_sets
            .lock()
            .expect("lock poisoned")
            .push((stack_name.to_string(), change_set_name.to_string()));
        Ok(())
    }

    async fn delete_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        self.deleted_change_sets
            .lock()
            .expect("lock poisoned")
            .push((stack_name.to_string(), change_set_name.to_string()));
        Ok(())
    }
}
