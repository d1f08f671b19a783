//! Read-all command - marks every notification read.

use anyhow::{Result, bail};
use clap::Args;
use console::style;

use super::{Context, login_hint};

/// Arguments for the read-all command.
#[derive(Args, Debug)]
pub struct ReadAllArgs {}

/// Run the read-all command.
pub async fn run(_args: ReadAllArgs, ctx: &Context) -> Result<()> {
    let target = ctx.target()?;
    if target.credential.is_none() {
        bail!("not logged in. {}", login_hint());
    }

    let session = target.session();
    let store = target.store(target.api_client(&session)?);

    match store.mark_all_read().await {
        Ok(()) => {}
        Err(e) if e.is_auth_error() => {
            bail!("the server rejected the stored credential. {}", login_hint())
        }
        Err(e) => return Err(e.into()),
    }
    // Refetch so the reported count comes from the server.
    store.get_all().await?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({ "status": "success", "unread_count": store.unread_count() })
        );
    } else {
        println!("{} Marked all notifications read", style("✓").green());
    }
    Ok(())
}
