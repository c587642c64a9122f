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

//! Bubblewrap argument vector.

use crate::core::constants::linux::SCRATCH_DIR;
use crate::sandbox::SandboxPolicy;

/// Namespace and mount flags, independent of any script.
///
/// The host root is visible read-only; `/tmp` is a fresh tmpfs that vanishes
/// with the namespace. `--unshare-pid` plus `--die-with-parent` make the whole
/// process tree die when bwrap does.
pub fn policy_args(policy: &SandboxPolicy) -> Vec<&'static str> {
    let mut args = vec![
        "--ro-bind",
        "/",
        "/",
        "--tmpfs",
        SCRATCH_DIR,
        "--dev",
        "/dev",
        "--proc",
        "/proc",
        "--unshare-pid",
        "--new-session",
        "--die-with-parent",
    ];
    if !policy.allow_network {
        args.push("--unshare-net");
    }
    args
}

/// Full argument vector: policy flags, then `-- <shell> -c <script>`.
pub fn command_args(policy: &SandboxPolicy, shell: &str, script: &str) -> Vec<String> {
    let mut args: Vec<String> = policy_args(policy).into_iter().map(String::from).collect();
    args.push("--".to_string());
    args.push(shell.to_string());
    args.push("-c".to_string());
    args.push(script.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_read_only_and_tmp_is_fresh() {
        let args = policy_args(&SandboxPolicy::new());
        assert_eq!(&args[..3], &["--ro-bind", "/", "/"]);
        let tmpfs = args.iter().position(|a| *a == "--tmpfs").unwrap();
        assert_eq!(args[tmpfs + 1], "/tmp");
        assert!(!args.contains(&"--bind"));
    }

    #[test]
    fn test_network_namespace_only_when_denied() {
        assert!(policy_args(&SandboxPolicy::new()).contains(&"--unshare-net"));
        assert!(!policy_args(&SandboxPolicy::new().allow_network(true)).contains(&"--unshare-net"));
    }

    #[test]
    fn test_script_is_passed_inline_after_separator() {
        let script = "echo hi\necho hello >&2\n";
        let args = command_args(&SandboxPolicy::new(), "bash", script);
        let n = args.len();
        assert_eq!(&args[n - 4..n - 1], &["--", "bash", "-c"]);
        assert_eq!(args[n - 1], script);
    }
}
