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

//! macOS: `sandbox-exec -f <profile> /bin/zsh <script>`.
//!
//! `sandbox-exec` is deprecated by Apple but still ships and still enforces
//! profiles.

use crate::core::constants::env::TMPDIR;
use crate::core::constants::macos::{SANDBOX_EXEC, SHARED_TMP, SHELL};
use crate::core::constants::materialize::{PROFILE_SUFFIX, SHELL_SUFFIX};
use crate::core::constants::tool::NAME_ZSH;
use crate::core::errors::SandboxError;
use crate::core::models::ExecutionResult;
use crate::sandbox::materialize::{MaterializedFile, ScratchDir};
use crate::sandbox::profiles::seatbelt;
use crate::sandbox::{runner, NetworkEnforcement, SandboxPolicy, SandboxStrategy};
use crate::tool::ToolContext;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

const DESCRIPTION: &str = "Execute a zsh script in a sandbox. The filesystem is read-only \
except $TMPDIR (a fresh directory removed afterwards) and /tmp. Network access may be \
disabled. stdout and stderr are merged.";

pub struct SeatbeltStrategy {
    sandbox_exec: PathBuf,
    shell: PathBuf,
    policy: SandboxPolicy,
}

impl SeatbeltStrategy {
    /// Find `sandbox-exec` and `zsh` on `PATH`.
    pub fn locate(policy: SandboxPolicy) -> Result<Self, SandboxError> {
        Self::locate_in(policy, std::env::var_os("PATH"))
    }

    pub fn locate_in(
        policy: SandboxPolicy,
        search_path: Option<OsString>,
    ) -> Result<Self, SandboxError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let find = |binary: &str| {
            which::which_in(binary, search_path.as_ref(), &cwd)
                .map_err(|e| SandboxError::Unavailable(format!("{} not found ({})", binary, e)))
        };
        let sandbox_exec = find(SANDBOX_EXEC)?;
        let shell = find(SHELL)?;
        debug!(
            sandbox_exec = %sandbox_exec.display(),
            shell = %shell.display(),
            "Located Seatbelt"
        );
        Ok(Self {
            sandbox_exec,
            shell,
            policy,
        })
    }
}

#[async_trait]
impl SandboxStrategy for SeatbeltStrategy {
    fn name(&self) -> &'static str {
        NAME_ZSH
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
        seatbelt::profile(&self.policy, &["<scratch>", SHARED_TMP])
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        script: &str,
    ) -> Result<ExecutionResult, SandboxError> {
        // Guards are declared before the run so they outlive the child on
        // every path, including cancellation.
        let scratch = ScratchDir::create()?;
        let profile_text =
            seatbelt::profile(&self.policy, &[scratch.path(), Path::new(SHARED_TMP)]);
        debug!(profile = %profile_text, "Seatbelt profile");
        let profile =
            MaterializedFile::write(profile_text.as_bytes(), PROFILE_SUFFIX, "sandbox profile")?;
        let script_file = MaterializedFile::write(script.as_bytes(), SHELL_SUFFIX, "script")?;

        let mut command = Command::new(&self.sandbox_exec);
        command
            .arg("-f")
            .arg(profile.path())
            .arg(&self.shell)
            .arg(script_file.path())
            .env(TMPDIR, scratch.path());
        runner::run(command, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_unavailable() {
        let empty = tempfile::tempdir().unwrap();
        let err = SeatbeltStrategy::locate_in(SandboxPolicy::new(), Some(empty.path().into()))
            .err()
            .unwrap();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("sandbox-exec"));
    }

    #[test]
    fn test_binaries_are_found_on_the_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        for name in [SANDBOX_EXEC, SHELL] {
            let path = dir.path().join(name);
            std::fs::write(&path, "#!/bin/sh\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let strategy =
            SeatbeltStrategy::locate_in(SandboxPolicy::new(), Some(dir.path().into())).unwrap();
        assert_eq!(strategy.sandbox_exec, dir.path().join(SANDBOX_EXEC));
        assert_eq!(strategy.shell, dir.path().join(SHELL));
    }

    #[test]
    fn test_describe_policy_is_the_profile() {
        let strategy = SeatbeltStrategy {
            sandbox_exec: PathBuf::from("/usr/bin/sandbox-exec"),
            shell: PathBuf::from("/bin/zsh"),
            policy: SandboxPolicy::new(),
        };
        let text = strategy.describe_policy();
        assert!(text.contains("(deny default)"));
        assert!(text.contains(r#"(subpath "/private/tmp")"#));
    }
}
