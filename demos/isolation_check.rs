//! Example: Isolation Check
//!
//! Reports whether the sandboxed shell tool is available on this host and,
//! if so, runs a short script that probes the write and network restrictions.
//! Usage: cargo run --example isolation_check

use shelltool::{get_sandbox_tool, ToolContext};
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("Running Isolation Environment Check...");
    println!("OS: {}", std::env::consts::OS);

    let tool = match get_sandbox_tool(false) {
        Ok(tool) => tool,
        Err(e) => {
            println!("Status: sandbox UNAVAILABLE ({})", e);
            return;
        }
    };
    println!("Tool: {} (network: {:?})", tool.name(), tool.network_enforcement());
    println!("--- Restrictions ---\n{}", tool.describe_policy());

    #[cfg(windows)]
    let probe = "Write-Output 'inside'\n\
                 try { Set-Content -Path \"$env:USERPROFILE\\shelltool-probe.txt\" -Value x -ErrorAction Stop; 'home write: ALLOWED' } catch { 'home write: denied' }\n\
                 Set-Content -Path \"$env:TEMP\\probe.txt\" -Value x; 'scratch write: ok'";
    #[cfg(not(windows))]
    let probe = "echo inside\n\
                 if touch \"$HOME/.shelltool-probe\" 2>/dev/null; then echo 'home write: ALLOWED'; else echo 'home write: denied'; fi\n\
                 touch \"$TMPDIR/probe\" && echo 'scratch write: ok'";

    let ctx = ToolContext::new().with_timeout(Some(Duration::from_secs(30)));
    match tool
        .call(&ctx, &serde_json::json!({ "script": probe }).to_string())
        .await
    {
        Ok(output) => println!("--- Probe output ---\n{}", output),
        Err(e) => println!("--- Probe failed ---\n{}", e.user_message()),
    }

    println!("Isolation Check Complete.");
}
