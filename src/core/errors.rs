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

// Sandbox error taxonomy. Setup errors carry no output; execution-class errors
// carry whatever was captured before the failure.

use crate::core::models::Termination;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The step of sandbox construction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SetupStage {
    /// Building the restriction description (profile text, argv, capability SIDs).
    Policy,
    /// Deriving the restricted access token.
    Token,
    /// Creating (or recreating) the AppContainer profile.
    AppContainerProfile,
    /// Granting the sandbox identity access to the scratch directory or script.
    AccessGrant,
    /// Creating the stdout/stderr pipes.
    Pipe,
    /// Building the process attribute list.
    AttributeList,
    /// Creating the child process.
    ProcessCreation,
    /// Waiting for the child process.
    Wait,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetupStage::Policy => "policy construction",
            SetupStage::Token => "token restriction",
            SetupStage::AppContainerProfile => "AppContainer profile creation",
            SetupStage::AccessGrant => "access grant",
            SetupStage::Pipe => "pipe creation",
            SetupStage::AttributeList => "attribute list setup",
            SetupStage::ProcessCreation => "process creation",
            SetupStage::Wait => "wait for exit",
        };
        f.write_str(s)
    }
}

/// Main error type for the sandboxed shell tool
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The sandboxing primitive is missing on this host. The tool must not be
    /// advertised to the model.
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),

    /// The tool-call arguments did not match the schema.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// A temporary file or directory could not be written.
    #[error("failed to materialize {what}: {source}")]
    Materialize {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Policy, token, profile, pipe or process construction failed.
    #[error("{stage} failed: {message}")]
    Setup { stage: SetupStage, message: String },

    /// The script ran but did not exit cleanly.
    #[error("{termination}")]
    Execution {
        termination: Termination,
        output: String,
    },

    /// The caller cancelled the invocation; the child was killed.
    #[error("execution cancelled")]
    Cancelled { output: String },

    /// The caller-supplied deadline elapsed; the child was killed.
    #[error("execution timed out after {}s", .timeout.as_secs_f64())]
    TimedOut { timeout: Duration, output: String },
}

impl SandboxError {
    pub fn setup(stage: SetupStage, message: impl fmt::Display) -> Self {
        SandboxError::Setup {
            stage,
            message: message.to_string(),
        }
    }

    /// Output captured before the failure, if the child got as far as running.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            SandboxError::Execution { output, .. }
            | SandboxError::Cancelled { output }
            | SandboxError::TimedOut { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SandboxError::Unavailable(_))
    }

    /// Text handed back to the model as the tool result when the call failed.
    pub fn user_message(&self) -> String {
        match self.partial_output() {
            Some(output) if !output.is_empty() => format!("{}\n{}", output.trim_end(), self),
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for SandboxError {
    fn from(e: serde_json::Error) -> Self {
        SandboxError::InvalidArguments(e.to_string())
    }
}
