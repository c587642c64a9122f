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

//! Linux: bubblewrap namespaces around `bash -c <script>`.

use crate::core::constants::env::TMPDIR;
use crate::core::constants::linux::{BWRAP, SCRATCH_DIR, SHELL};
use crate::core::constants::tool::NAME_BASH;
use crate::core::errors::SandboxError;
use crate::core::models::ExecutionResult;
use crate::sandbox::profiles::bwrap;
use crate::sandbox::{runner, NetworkEnforcement, SandboxPolicy, SandboxStrategy};
use crate::tool::ToolContext;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

const DESCRIPTION: &str = "Execute a bash script in a sandbox. The filesystem is read-only \
except /tmp, which is empty and discarded afterwards. Network access may be disabled. \
stdout and stderr are merged.";

pub struct BubblewrapStrategy {
    bwrap: PathBuf,
    policy: SandboxPolicy,
}

impl BubblewrapStrategy {
    /// Find `bwrap` and `bash` on `PATH`.
    pub fn locate(policy: SandboxPolicy) -> Result<Self, SandboxError> {
        Self::locate_in(policy, std::env::var_os("PATH"))
    }

    /// Like [`locate`](Self::locate) with an explicit search path.
    pub fn locate_in(
        policy: SandboxPolicy,
        search_path: Option<OsString>,
    ) -> Result<Self, SandboxError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let bwrap = which::which_in(BWRAP, search_path.as_ref(), &cwd).map_err(|e| {
            SandboxError::Unavailable(format!(
                "{} not found ({}); install bubblewrap, e.g. `apt install bubblewrap`",
                BWRAP, e
            ))
        })?;
        which::which_in(SHELL, search_path.as_ref(), &cwd).map_err(|e| {
            SandboxError::Unavailable(format!("{} not found ({})", SHELL, e))
        })?;
        debug!(bwrap = %bwrap.display(), "Located bubblewrap");
        Ok(Self { bwrap, policy })
    }
}

#[async_trait]
impl SandboxStrategy for BubblewrapStrategy {
    fn name(&self) -> &'static str {
        NAME_BASH
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    fn network_enforcement(&self) -> NetworkEnforcement {
        NetworkEnforcement::Kernel
    }

    fn describe_policy(&self) -> String {
        let mut argv = vec![self.bwrap.display().to_string()];
        argv.extend(bwrap::command_args(&self.policy, SHELL, "<script>"));
        argv.join(" ")
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        script: &str,
    ) -> Result<ExecutionResult, SandboxError> {
        let mut command = Command::new(&self.bwrap);
        command
            .args(bwrap::command_args(&self.policy, SHELL, script))
            .env(TMPDIR, SCRATCH_DIR);
        runner::run(command, ctx).await
    }
}
