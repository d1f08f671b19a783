//! List command - prints the notification list.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use stackit_client::Notification;

use super::{Context, login_hint};

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show at most this many notifications
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only show unread notifications
    #[arg(short, long)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
struct ListOutput<'a> {
    unread_count: u64,
    notifications: &'a [Notification],
}

/// Run the list command.
pub async fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let target = ctx.target()?;
    if target.credential.is_none() {
        bail!("not logged in. {}", login_hint());
    }

    let session = target.session();
    let store = target.store(target.api_client(&session)?);

    let mut notifications = match store.get_all().await {
        Ok(n) => n,
        Err(e) if e.is_auth_error() => {
            bail!("the server rejected the stored credential. {}", login_hint())
        }
        Err(e) => return Err(e.into()),
    };
    if args.unread {
        notifications.retain(|n| !n.is_read);
    }
    if let Some(limit) = args.limit {
        notifications.truncate(limit);
    }

    if ctx.json_output {
        let output = ListOutput {
            unread_count: store.unread_count(),
            notifications: &notifications,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!(
        "{} {}",
        style("Notifications").bold(),
        dim.apply_to(format!("({} unread)", store.unread_count()))
    );
    println!("{}", dim.apply_to("─".repeat(40)));

    if notifications.is_empty() {
        println!();
        println!("  {}", dim.apply_to("Nothing here yet."));
    }
    for n in &notifications {
        print_notification(n);
    }
    println!();
    Ok(())
}

pub(crate) fn print_notification(n: &Notification) {
    let dim = Style::new().dim();
    let marker = if n.is_read {
        dim.apply_to("○").to_string()
    } else {
        Style::new().cyan().apply_to("●").to_string()
    };
    let when = n
        .created_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M");
    println!("  {} {} {}", marker, dim.apply_to(when), n.message);
}
