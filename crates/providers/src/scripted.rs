//! Scripted provider: replays canned responses in order.
//!
//! Used to drive the workflow without a network. Every prompt it receives
//! is recorded so tests can assert on what was asked.

use async_trait::async_trait;
use scrivener_core::error::ProviderError;
use scrivener_core::provider::*;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue another response behind the ones already scripted.
    pub fn push(&self, response: impl Into<String>) {
        lock(&self.responses).push_back(response.into());
    }

    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Every prompt received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let calls = {
            let mut prompts = lock(&self.prompts);
            prompts.push(request.prompt);
            prompts.len()
        };

        let content = lock(&self.responses)
            .pop_front()
            .ok_or(ProviderError::Exhausted(calls - 1))?;

        Ok(ProviderResponse {
            content,
            usage: None,
            model: request.model,
        })
    }
}
