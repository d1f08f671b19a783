//! Config command - client configuration and contexts.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};

use stackit_config::{AuthConfig, Context as ClientContext};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Switch to a different context
    UseContext {
        /// Context name to switch to
        name: String,
    },

    /// Create or update a context
    SetContext {
        /// Context name
        name: String,

        /// REST server URL (e.g., http://localhost:8000)
        #[arg(long)]
        server: Option<String>,

        /// Push server base URL, if different from the REST server
        #[arg(long)]
        ws_server: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// File holding the bearer token
        #[arg(long)]
        token_file: Option<std::path::PathBuf>,

        /// Environment variable holding the bearer token
        #[arg(long)]
        token_env: Option<String>,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::UseContext { name } => cmd_use_context(ctx, &name),
        ConfigCommand::SetContext {
            name,
            server,
            ws_server,
            timeout,
            token_file,
            token_env,
        } => cmd_set_context(ctx, &name, server, ws_server, timeout, token_file, token_env),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let target = ctx.target()?;

    if ctx.json_output {
        let value = serde_json::json!({
            "path": stackit_config::client_config_path().map(|p| p.display().to_string()),
            "context": target.context,
            "server": target.server_url,
            "authenticated": target.credential.is_some(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style("StackIt Configuration").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    match stackit_config::client_config_path() {
        Some(path) if path.exists() => println!("  {} {}", dim.apply_to("File:"), path.display()),
        Some(path) => println!(
            "  {} {} {}",
            dim.apply_to("File:"),
            path.display(),
            dim.apply_to("(not created, using defaults)")
        ),
        None => println!("  {} {}", dim.apply_to("File:"), "(no config directory)"),
    }
    println!(
        "  {} {}",
        dim.apply_to("Context:"),
        target.context.as_deref().unwrap_or("(none)")
    );
    println!("  {} {}", dim.apply_to("Server:"), target.server_url);
    println!(
        "  {} {}",
        dim.apply_to("Credential:"),
        if target.credential.is_some() {
            style("present").green()
        } else {
            style("missing").red()
        }
    );

    let n = &config.notifications;
    println!();
    println!("  {}", style("Notifications").bold());
    println!("  {} {}s", dim.apply_to("retry-delay:"), n.retry_delay_secs);
    if let Some(max) = n.max_retry_delay_secs {
        println!("  {} {}s", dim.apply_to("max-retry-delay:"), max);
    }
    println!("  {} {}s", dim.apply_to("stale-time:"), n.stale_time_secs);
    if let Some(timeout) = n.connect_timeout_secs {
        println!("  {} {}s", dim.apply_to("connect-timeout:"), timeout);
    }
    println!("  {} {:?}", dim.apply_to("alerts:"), n.alerts);

    if !config.contexts.is_empty() {
        println!();
        println!("  {}", style("Contexts").bold());
        for c in &config.contexts {
            let marker = if config.current_context.as_deref() == Some(c.name.as_str()) {
                "*"
            } else {
                " "
            };
            println!("  {} {:<12} {}", marker, c.name, dim.apply_to(&c.server));
        }
    }

    if ctx.verbose {
        println!();
        println!("{}", dim.apply_to("---"));
        println!("{}", config.to_yaml()?);
    }
    println!();
    Ok(())
}

fn cmd_use_context(ctx: &Context, name: &str) -> Result<()> {
    let mut config = ctx.load_config()?;
    if let Err(e) = config.use_context(name) {
        let available = config.context_names().join(", ");
        if available.is_empty() {
            bail!("{}. No contexts configured; create one with: stackit config set-context", e);
        }
        bail!("{}. Available: {}", e, available);
    }
    stackit_config::save_client_config(&config)?;
    println!("{} Switched to context \"{}\"", style("✓").green(), name);
    Ok(())
}

fn cmd_set_context(
    ctx: &Context,
    name: &str,
    server: Option<String>,
    ws_server: Option<String>,
    timeout: Option<u64>,
    token_file: Option<std::path::PathBuf>,
    token_env: Option<String>,
) -> Result<()> {
    let mut config = ctx.load_config()?;

    let mut context = match config.get_context(name) {
        Some(existing) => existing.clone(),
        None => {
            let Some(server) = server.clone() else {
                bail!("--server is required when creating a new context");
            };
            ClientContext::new(name, server)
        }
    };

    if let Some(server) = server {
        context.server = server;
    }
    if let Some(ws) = ws_server {
        context.ws_server = Some(ws);
    }
    if let Some(timeout) = timeout {
        context.timeout = Some(timeout);
    }
    if token_file.is_some() || token_env.is_some() {
        context.auth = Some(AuthConfig::Bearer {
            token_file,
            token_env,
        });
    }

    let created = config.get_context(name).is_none();
    config.set_context(context);
    if config.current_context.is_none() {
        config.current_context = Some(name.to_string());
    }
    stackit_config::save_client_config(&config)?;

    let verb = if created { "Created" } else { "Updated" };
    println!("{} {} context \"{}\"", style("✓").green(), verb, name);
    Ok(())
}
