// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tool definition handed to the model-facing loop.

use crate::core::constants::tool::{ARG_COMMAND_LINE, ARG_SCRIPT};
use crate::core::errors::SandboxError;
use crate::core::models::{ExecutionResult, ScriptRequest};
use crate::sandbox::{NetworkEnforcement, SandboxPolicy, SandboxStrategy};
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

/// Per-call context: cancellation plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

/// Why a running child was stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

impl Interrupt {
    pub fn into_error(self, output: Vec<u8>) -> SandboxError {
        let output = String::from_utf8_lossy(&output).into_owned();
        match self {
            Interrupt::Cancelled => SandboxError::Cancelled { output },
            Interrupt::TimedOut(timeout) => SandboxError::TimedOut { timeout, output },
        }
    }
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing token, e.g. the one the agent loop cancels on Ctrl-C.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves when the call is cancelled or the deadline passes. The
    /// deadline starts counting when this is called, not when first polled.
    pub fn interrupted(&self) -> impl Future<Output = Interrupt> + Send + 'static {
        let cancel = self.cancel.clone();
        let deadline = self
            .timeout
            .map(|timeout| (timeout, tokio::time::sleep(timeout)));
        async move {
            match deadline {
                Some((timeout, sleep)) => tokio::select! {
                    _ = cancel.cancelled() => Interrupt::Cancelled,
                    _ = sleep => Interrupt::TimedOut(timeout),
                },
                None => {
                    cancel.cancelled().await;
                    Interrupt::Cancelled
                }
            }
        }
    }
}

/// One callable tool: name, description, JSON schema and the strategy that
/// executes it.
#[derive(Clone)]
pub struct ToolDefinition {
    strategy: Arc<dyn SandboxStrategy>,
}

impl ToolDefinition {
    pub fn new(strategy: Arc<dyn SandboxStrategy>) -> Self {
        Self { strategy }
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn description(&self) -> &str {
        self.strategy.description()
    }

    pub fn policy(&self) -> &SandboxPolicy {
        self.strategy.policy()
    }

    pub fn network_enforcement(&self) -> NetworkEnforcement {
        self.strategy.network_enforcement()
    }

    /// Human-readable restriction description (profile text, argv, capabilities).
    pub fn describe_policy(&self) -> String {
        self.strategy.describe_policy()
    }

    /// JSON schema of the arguments: one required string `script`.
    pub fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                ARG_SCRIPT: {
                    "type": "string",
                    "description": format!(
                        "The {} script to execute. `{}` is accepted as an alias; send only one of the two.",
                        self.name(),
                        ARG_COMMAND_LINE
                    ),
                }
            },
            "required": [ARG_SCRIPT],
        })
    }

    /// `{"name", "description", "parameters"}` as tool-calling providers expect.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters(),
        })
    }

    /// Run a parsed request. A non-zero exit is still `Ok` here; see
    /// [`ExecutionResult::into_result`].
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        request: ScriptRequest,
    ) -> Result<ExecutionResult, SandboxError> {
        let span = info_span!("tool_call", tool = self.name());
        async {
            debug!(script_len = request.script.len(), "Executing script");
            let result = self.strategy.execute(ctx, &request.script).await;
            match &result {
                Ok(r) => debug!(termination = %r.termination, output_len = r.output.len(), "Script finished"),
                Err(e) => debug!(error = %e, "Script failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Entry point for the tool-call loop: raw JSON arguments in, merged
    /// output out. Errors carry the output captured before the failure.
    pub async fn call(&self, ctx: &ToolContext, arguments: &str) -> Result<String, SandboxError> {
        let request = ScriptRequest::from_json(arguments)?;
        self.execute(ctx, request).await?.into_result()
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name())
            .field("policy", self.policy())
            .finish()
    }
}
