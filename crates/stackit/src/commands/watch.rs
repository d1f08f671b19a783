//! Watch command - stays connected and prints notifications as they arrive.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use stackit_notify::{
    ConnectionState, PushClient, PushEndpoint, PushEvent, RetryPolicy, SessionGate,
    ensure_permission,
};
use tokio::sync::broadcast::error::RecvError;

use super::{Context, login_hint};
use crate::alerter::TerminalAlerter;

/// Arguments for the watch command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds to wait before reconnecting (overrides config)
    #[arg(long)]
    pub retry_delay: Option<u64>,

    /// Don't refetch the list after each event
    #[arg(long)]
    pub no_refresh: bool,
}

/// Run the watch command.
pub async fn run(args: WatchArgs, ctx: &Context) -> Result<()> {
    let target = ctx.target()?;
    if target.credential.is_none() {
        bail!("not logged in. {}", login_hint());
    }

    let settings = &target.settings;
    let session = target.session();
    let store = target.store(target.api_client(&session)?);

    let endpoint =
        PushEndpoint::from_base(target.ws_base.as_deref().unwrap_or(&target.server_url))?;

    let delay = args
        .retry_delay
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.retry_delay());
    let retry = match settings.max_retry_delay() {
        Some(max) => RetryPolicy::exponential(delay, max.max(delay)),
        None => RetryPolicy::fixed(delay),
    };

    let alerter = Arc::new(TerminalAlerter::new(settings.alerts));
    if !ctx.json_output {
        ensure_permission(alerter.as_ref());
    }

    let dim = Style::new().dim();
    match store.get_all().await {
        Ok(_) if !ctx.json_output => println!(
            "{} {}",
            style("Watching notifications").bold(),
            dim.apply_to(format!("({} unread, Ctrl-C to stop)", store.unread_count()))
        ),
        Ok(_) => {}
        Err(e) if e.is_auth_error() => {
            bail!("the server rejected the stored credential. {}", login_hint())
        }
        Err(e) => tracing::warn!(error = %e, "initial fetch failed"),
    }

    let push = PushClient::builder(Arc::new(session.clone()), store.clone(), endpoint)
        .alerter(alerter)
        .alert_title(settings.alert_title.clone())
        .retry_policy(retry)
        .connect_timeout(settings.connect_timeout())
        .spawn();

    let mut status = push.status_receiver();
    let mut events = push.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !ctx.json_output {
                    println!();
                    println!("{}", dim.apply_to("Disconnecting..."));
                }
                break;
            }

            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *status.borrow_and_update();
                print_status(state, ctx);
                if state == ConnectionState::Idle && !session.is_active() {
                    if !ctx.json_output {
                        eprintln!("Session ended. {}", login_hint());
                    }
                    break;
                }
            }

            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event, ctx);
                    if !args.no_refresh && let Err(e) = store.get_all().await {
                        tracing::warn!(error = %e, "refresh after push failed");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "fell behind on push events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    push.shutdown().await;
    Ok(())
}

fn print_status(state: ConnectionState, ctx: &Context) {
    if ctx.json_output {
        println!("{}", serde_json::json!({ "status": state.to_string() }));
        return;
    }
    let styled = match state {
        ConnectionState::Open => Style::new().green().apply_to("● connected"),
        ConnectionState::Connecting => Style::new().yellow().apply_to("● connecting..."),
        ConnectionState::WaitingToRetry => Style::new().yellow().apply_to("● waiting to reconnect"),
        ConnectionState::Closing => Style::new().dim().apply_to("● closing"),
        ConnectionState::Idle => Style::new().red().apply_to("● disconnected"),
    };
    if ctx.verbose || state != ConnectionState::Closing {
        println!("  {}", styled);
    }
}

fn print_event(event: &PushEvent, ctx: &Context) {
    if ctx.json_output {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
        return;
    }
    println!(
        "  {} {}",
        Style::new().dim().apply_to(format!("[{} unread]", event.unread_count)),
        event.message
    );
}
