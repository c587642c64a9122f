// Runs scripts through the real OS sandbox. Skips (with a message) when the
// sandbox is missing or cannot start on this host.

use regex::Regex;
use shelltool::{get_sandbox_tool, SandboxError, ToolContext, ToolDefinition};
use std::time::{Duration, Instant};

fn args(script: &str) -> String {
    serde_json::json!({ "script": script }).to_string()
}

/// The tool, if it is available and can actually run a trivial script here
/// (user namespaces may be disabled in containers, for instance).
async fn usable_tool(allow_network: bool) -> Option<ToolDefinition> {
    let tool = match get_sandbox_tool(allow_network) {
        Ok(tool) => tool,
        Err(e) => {
            eprintln!("skipping: {}", e);
            return None;
        }
    };
    let probe = if cfg!(windows) {
        "Write-Output ok"
    } else {
        "echo ok"
    };
    match tool.call(&ToolContext::new(), &args(probe)).await {
        Ok(out) if out.trim() == "ok" => Some(tool),
        other => {
            eprintln!("skipping: sandbox cannot run scripts here: {:?}", other);
            None
        }
    }
}

#[tokio::test]
async fn test_stdout_and_stderr_are_merged() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let script = if cfg!(windows) {
        "Write-Output \"hi\"\n[System.Console]::Error.WriteLine(\"hello\")\n"
    } else {
        "echo hi\necho hello >&2\n"
    };
    let out = tool.call(&ToolContext::new(), &args(script)).await.unwrap();
    let mut lines: Vec<&str> = out.lines().map(str::trim_end).collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["hello", "hi"]);
}

#[tokio::test]
async fn test_scratch_directory_is_writable() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let script = if cfg!(windows) {
        "Set-Content -Path \"$env:TEMP\\note.txt\" -Value data\nGet-Content \"$env:TEMP\\note.txt\"\n"
    } else {
        "echo data > \"$TMPDIR/note.txt\"\ncat \"$TMPDIR/note.txt\"\n"
    };
    let out = tool.call(&ToolContext::new(), &args(script)).await.unwrap();
    assert_eq!(out.trim_end(), "data");
}

#[tokio::test]
async fn test_writes_outside_scratch_never_reach_the_host() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let target = std::path::Path::new(env!("CARGO_TARGET_TMPDIR"))
        .join(format!("escape-{}", uuid::Uuid::new_v4().simple()));
    let script = if cfg!(windows) {
        format!(
            "$ErrorActionPreference = 'Stop'\nSet-Content -Path '{}' -Value x",
            target.display()
        )
    } else {
        format!("echo x > '{}'", target.display())
    };
    // macOS keeps the shared /private/tmp writable
    if cfg!(target_os = "macos") && target.starts_with("/private/tmp") {
        eprintln!("skipping: target dir is inside the shared tmp");
        return;
    }
    let result = tool.call(&ToolContext::new(), &args(&script)).await;
    assert!(!target.exists(), "sandbox wrote to {}", target.display());
    assert!(
        matches!(result, Err(SandboxError::Execution { .. })),
        "write outside scratch did not fail: {result:?}"
    );
}

#[tokio::test]
async fn test_nonzero_exit_keeps_output() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let script = if cfg!(windows) {
        "Write-Output partial\nexit 3\n"
    } else {
        "echo partial\nexit 3\n"
    };
    let err = tool
        .call(&ToolContext::new(), &args(script))
        .await
        .unwrap_err();
    match &err {
        SandboxError::Execution { termination, .. } => assert_eq!(termination.exit_code(), 3),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.partial_output().map(str::trim_end), Some("partial"));
    assert_eq!(err.to_string(), "exit code 3");
}

#[tokio::test]
async fn test_timeout_kills_the_script() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let script = if cfg!(windows) {
        "Start-Sleep -Seconds 60"
    } else {
        "sleep 60"
    };
    let ctx = ToolContext::new().with_timeout(Some(Duration::from_millis(500)));
    let start = Instant::now();
    let err = tool.call(&ctx, &args(script)).await.unwrap_err();
    assert!(matches!(err, SandboxError::TimedOut { .. }), "{err:?}");
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_cancellation_kills_the_script() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let script = if cfg!(windows) {
        "Start-Sleep -Seconds 60"
    } else {
        "sleep 60"
    };
    let ctx = ToolContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });
    let start = Instant::now();
    let err = tool.call(&ctx, &args(script)).await.unwrap_err();
    assert!(matches!(err, SandboxError::Cancelled { .. }), "{err:?}");
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[cfg(unix)]
#[tokio::test]
async fn test_background_children_do_not_hang_the_call() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let start = Instant::now();
    let out = tool
        .call(&ToolContext::new(), &args("sleep 60 &\necho done\n"))
        .await
        .unwrap();
    assert_eq!(out.trim_end(), "done");
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_ascii_output_survives() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let out = tool
        .call(&ToolContext::new(), &args("echo 'héllo wörld'"))
        .await
        .unwrap();
    assert_eq!(out, "héllo wörld\n");
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let (a, b) = if cfg!(windows) {
        ("Write-Output first", "Write-Output second")
    } else {
        ("echo first", "echo second")
    };
    let ctx = ToolContext::new();
    let a_json = args(a);
    let b_json = args(b);
    let (ra, rb) = tokio::join!(tool.call(&ctx, &a_json), tool.call(&ctx, &b_json));
    assert_eq!(ra.unwrap().trim_end(), "first");
    assert_eq!(rb.unwrap().trim_end(), "second");
}

#[tokio::test]
async fn test_network_is_denied_by_default() {
    let Some(tool) = usable_tool(false).await else {
        return;
    };
    let script = if cfg!(windows) {
        "try { (Invoke-WebRequest -UseBasicParsing -TimeoutSec 5 https://ifconfig.co/ip).Content } catch { Write-Output 'blocked' }"
    } else {
        "curl -sS --max-time 5 https://ifconfig.co/ip || echo blocked"
    };
    let out = match tool.call(&ToolContext::new(), &args(script)).await {
        Ok(out) => out,
        Err(e) => e.partial_output().unwrap_or_default().to_string(),
    };
    let ipv4 = Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap();
    assert!(!ipv4.is_match(&out), "network reachable: {out:?}");
}

#[tokio::test]
#[ignore = "requires internet access"]
async fn test_network_when_allowed() {
    let Some(tool) = usable_tool(true).await else {
        return;
    };
    let script = if cfg!(windows) {
        "(Invoke-WebRequest -UseBasicParsing -TimeoutSec 10 https://ifconfig.co/ip).Content"
    } else {
        "curl -sS --max-time 10 https://ifconfig.co/ip"
    };
    let out = tool.call(&ToolContext::new(), &args(script)).await.unwrap();
    let ipv4 = Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap();
    assert!(ipv4.is_match(&out), "no address in {out:?}");
}
