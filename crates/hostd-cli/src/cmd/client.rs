use crate::output::print_json;
use anyhow::{anyhow, bail, Context, Result};
use hostd_server::client::HostdClient;
use serde_json::Value;
use std::future::Future;
use std::path::Path;

fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(fut))
}

pub fn health(socket: &Path) -> Result<()> {
    let client = HostdClient::new(socket);
    let (status, json) = block_on(client.health())??;
    print_json(&json)?;
    if !status.is_success() {
        bail!("daemon unhealthy: HTTP {status}");
    }
    Ok(())
}

pub fn busy(socket: &Path) -> Result<()> {
    let client = HostdClient::new(socket);
    let (_, json) = block_on(client.busy())??;
    print_json(&json)
}

pub fn run(socket: &Path, action: &str, args: &str, wait: bool) -> Result<()> {
    let args: Value = serde_json::from_str(args).context("--args must be valid JSON")?;
    if !args.is_object() {
        return Err(anyhow!("--args must be a JSON object"));
    }

    let client = HostdClient::new(socket);
    let (status, json) = block_on(client.run(action, args, wait))??;
    print_json(&json)?;

    if json.get("ok").and_then(Value::as_bool) != Some(true) {
        let reason = json
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| json.get("rc").map(|rc| format!("rc={rc}")))
            .unwrap_or_else(|| "unknown".to_string());
        bail!("{action} failed: HTTP {status} ({reason})");
    }
    Ok(())
}
