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

// Main entry point: run one script through the sandboxed shell tool
use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use shelltool::config::Config;
use shelltool::{get_sandbox_tool, SandboxError, ScriptRequest, ToolContext};

/// sysexits EX_USAGE
const EXIT_USAGE: u8 = 64;
/// sysexits EX_UNAVAILABLE
const EXIT_UNAVAILABLE: u8 = 69;
/// sysexits EX_SOFTWARE
const EXIT_SETUP: u8 = 70;
/// Same as coreutils `timeout`
const EXIT_TIMEOUT: u8 = 124;
/// 128 + SIGINT
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(version, about = "Run a script in the OS-native sandbox", long_about = None)]
struct Cli {
    /// Script to run. Read from stdin when neither this nor --args-json is given.
    script: Option<String>,

    /// Allow network access inside the sandbox
    #[arg(long)]
    allow_net: bool,

    /// Kill the script after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path to a YAML config file
    #[arg(long, value_name = "YAML")]
    config: Option<PathBuf>,

    /// Raw tool-call arguments, e.g. '{"script": "echo hi"}'
    #[arg(long, value_name = "JSON", conflicts_with = "script")]
    args_json: Option<String>,

    /// Print the tool definition (name, description, JSON schema) and exit
    #[arg(long)]
    schema: bool,

    /// Print the effective sandbox configuration and exit
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    install_panic_hook();

    // 1. Environment (base layer)
    let mut config = Config::from_env().unwrap_or_else(|e| {
        eprintln!(
            "Warning: Failed to load config from env, using defaults: {}",
            e
        );
        Config::default()
    });

    // 2. YAML file
    if let Some(path) = cli.config.clone().or_else(|| config.config_path.clone()) {
        config
            .load_yaml(&path)
            .with_context(|| format!("loading {}", path.display()))?;
    }

    // 3. CLI flags (overlay layer)
    if cli.allow_net {
        config.allow_network = true;
    }
    if let Some(secs) = cli.timeout {
        config.timeout_secs = Some(secs);
    }
    if cli.verbose {
        config.log_level = "debug".to_string();
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to init tracing: {}", e);
    }
    debug!(?config, "Effective configuration");

    let tool = match get_sandbox_tool(config.allow_network) {
        Ok(tool) => tool,
        Err(e) => {
            if cli.dry_run {
                let report = json!({
                    "available": false,
                    "reason": e.to_string(),
                    "allow_network": config.allow_network,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                eprintln!("Error: {}", e);
            }
            return Ok(ExitCode::from(EXIT_UNAVAILABLE));
        }
    };

    if cli.schema {
        println!("{}", serde_json::to_string_pretty(&tool.to_json())?);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.dry_run {
        let report = json!({
            "available": true,
            "tool": tool.name(),
            "allow_network": tool.policy().allow_network,
            "network_enforcement": tool.network_enforcement(),
            "timeout_secs": config.timeout_secs,
            "restrictions": tool.describe_policy(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    let arguments = match (cli.args_json, cli.script) {
        (Some(json), _) => json,
        (None, Some(script)) => serde_json::to_string(&ScriptRequest::new(script))?,
        (None, None) => {
            let mut script = String::new();
            tokio::io::stdin()
                .read_to_string(&mut script)
                .await
                .context("reading script from stdin")?;
            serde_json::to_string(&ScriptRequest::new(script))?
        }
    };

    let ctx = ToolContext::new().with_timeout(config.timeout());
    let cancel = ctx.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling script");
            cancel.cancel();
        }
    });

    let result = tool.call(&ctx, &arguments).await;
    let mut stdout = std::io::stdout();
    match result {
        Ok(output) => {
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if let Some(output) = e.partial_output() {
                stdout.write_all(output.as_bytes())?;
                stdout.flush()?;
            }
            eprintln!("{}: {}", tool.name(), e);
            Ok(ExitCode::from(exit_status(&e)))
        }
    }
}

fn exit_status(e: &SandboxError) -> u8 {
    match e {
        SandboxError::Execution { termination, .. } => {
            u8::try_from(termination.exit_code()).unwrap_or(1)
        }
        SandboxError::InvalidArguments(_) => EXIT_USAGE,
        SandboxError::Unavailable(_) => EXIT_UNAVAILABLE,
        SandboxError::TimedOut { .. } => EXIT_TIMEOUT,
        SandboxError::Cancelled { .. } => EXIT_CANCELLED,
        SandboxError::Setup { .. } | SandboxError::Materialize { .. } => EXIT_SETUP,
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC: {} at {}", message, location);
    }));
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("shelltool=debug,info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if config.log_format == "json" {
        subscriber.json().try_init()?;
    } else {
        subscriber.try_init()?;
    }

    Ok(())
}
