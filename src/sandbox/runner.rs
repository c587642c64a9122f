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

//! Process launcher shared by the bubblewrap and Seatbelt strategies.

use crate::core::constants::env::LOCALE_VARS;
use crate::core::constants::output::DRAIN_GRACE;
use crate::core::errors::{SandboxError, SetupStage};
use crate::core::models::ExecutionResult;
use crate::sandbox::output::OutputCollector;
use crate::tool::ToolContext;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// The child's process group. Dropping it SIGKILLs every member, so
/// background grandchildren cannot keep the pipes open past the call.
struct ProcessGroup(Option<Pid>);

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.0.take() {
            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => debug!(pgid = pgid.as_raw(), error = %e, "killpg failed"),
            }
        }
    }
}

/// Spawn `command` (already carrying the sandbox wrapper and its arguments),
/// collect merged output, and wait for exit, cancellation or timeout.
pub(crate) async fn run(
    mut command: Command,
    ctx: &ToolContext,
) -> Result<ExecutionResult, SandboxError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);
    for (key, value) in LOCALE_VARS {
        command.env(key, value);
    }

    debug!(command = ?command.as_std(), "Spawning sandboxed process");
    // The deadline covers the whole run, starting before spawn, and still
    // applies while output drains after the child exits
    let interrupted = ctx.interrupted();
    tokio::pin!(interrupted);
    let mut child = command
        .spawn()
        .map_err(|e| SandboxError::setup(SetupStage::ProcessCreation, e))?;
    let group = ProcessGroup(child.id().map(|id| Pid::from_raw(id as i32)));

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(out), Some(err)) => (out, err),
        _ => {
            return Err(SandboxError::setup(
                SetupStage::Pipe,
                "child stdio was not captured",
            ))
        }
    };
    let mut collector = OutputCollector::spawn(stdout, stderr);

    let status = tokio::select! {
        status = child.wait() => status,
        interrupt = &mut interrupted => {
            debug!(?interrupt, "Killing sandboxed process group");
            drop(group);
            let _ = child.kill().await;
            let _ = tokio::time::timeout(DRAIN_GRACE, collector.wait()).await;
            return Err(interrupt.into_error(collector.into_output()));
        }
    };
    drop(group);
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            let _ = child.kill().await;
            return Err(SandboxError::setup(SetupStage::Wait, e));
        }
    };

    // A descendant that left the process group can still hold the pipes
    tokio::select! {
        () = collector.wait() => Ok(ExecutionResult::new(collector.into_output(), status.into())),
        interrupt = &mut interrupted => {
            warn!(?interrupt, "Output still open after exit, abandoning readers");
            Err(interrupt.into_error(collector.into_output()))
        }
    }
}
