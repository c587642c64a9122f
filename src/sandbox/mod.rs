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

use crate::core::errors::SandboxError;
use crate::core::models::ExecutionResult;
use crate::tool::{ToolContext, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(windows)]
pub mod windows;

#[cfg(any(target_os = "linux", target_os = "macos"))]
mod runner;

pub mod materialize;
pub mod output;
pub mod profiles;

/// The explicit security policy for a sandbox.
/// Start with defaults (all denied) and explicitly grant permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SandboxPolicy {
    /// Allow network access (all or nothing).
    #[serde(default)]
    pub allow_network: bool,
}

impl SandboxPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }
}

/// How strongly the platform blocks network access when it is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkEnforcement {
    /// A kernel-level deny (network namespace, Seatbelt rule).
    Kernel,
    /// The network capability is simply not granted to the AppContainer.
    /// Loopback and some brokered paths may still work.
    CapabilityOmission,
}

/// One platform way of running a script under a [`SandboxPolicy`].
///
/// Exactly one implementation is compiled in per target OS.
#[async_trait]
pub trait SandboxStrategy: Send + Sync {
    /// Tool name advertised to the model.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn policy(&self) -> &SandboxPolicy;

    fn network_enforcement(&self) -> NetworkEnforcement;

    /// The restriction description this strategy would apply, for logs and
    /// `--dry-run`.
    fn describe_policy(&self) -> String;

    /// Run one script to completion, cancellation or timeout.
    ///
    /// `Ok` means the child ran and exited, whatever its exit code.
    async fn execute(&self, ctx: &ToolContext, script: &str)
        -> Result<ExecutionResult, SandboxError>;
}

/// Select the strategy for this host and wrap it as a tool.
///
/// Fails with [`SandboxError::Unavailable`] when the sandboxing primitive is
/// missing; callers must then not advertise the tool. Nothing is executed.
pub fn get_sandbox_tool(allow_network: bool) -> Result<ToolDefinition, SandboxError> {
    let policy = SandboxPolicy::new().allow_network(allow_network);
    let strategy = platform_strategy(policy)?;

    if !allow_network && strategy.network_enforcement() == NetworkEnforcement::CapabilityOmission {
        warn!(
            tool = strategy.name(),
            "Network is denied by capability omission only; this is weaker than a kernel-level deny"
        );
    }
    info!(
        tool = strategy.name(),
        allow_network, "Sandboxed shell tool available"
    );
    Ok(ToolDefinition::new(strategy))
}

/// Tools to advertise for this host: the sandboxed shell if available,
/// otherwise nothing (with a warning).
pub fn shell_tools(allow_network: bool) -> Vec<ToolDefinition> {
    match get_sandbox_tool(allow_network) {
        Ok(tool) => vec![tool],
        Err(e) => {
            warn!(error = %e, "Sandboxed shell tool disabled");
            Vec::new()
        }
    }
}

#[cfg(target_os = "linux")]
fn platform_strategy(policy: SandboxPolicy) -> Result<Arc<dyn SandboxStrategy>, SandboxError> {
    Ok(Arc::new(linux::BubblewrapStrategy::locate(policy)?))
}

#[cfg(target_os = "macos")]
fn platform_strategy(policy: SandboxPolicy) -> Result<Arc<dyn SandboxStrategy>, SandboxError> {
    Ok(Arc::new(macos::SeatbeltStrategy::locate(policy)?))
}

#[cfg(windows)]
fn platform_strategy(policy: SandboxPolicy) -> Result<Arc<dyn SandboxStrategy>, SandboxError> {
    Ok(Arc::new(self::windows::AppContainerStrategy::locate(policy)?))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn platform_strategy(_policy: SandboxPolicy) -> Result<Arc<dyn SandboxStrategy>, SandboxError> {
    Err(SandboxError::Unavailable(format!(
        "no sandbox strategy for {}",
        std::env::consts::OS
    )))
}
