//! Token command - manages the stored credential.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use console::{Style, style};

use super::Context;

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Store a credential (reads stdin when TOKEN is omitted)
    Set {
        /// The bearer token
        token: Option<String>,
    },

    /// Delete the stored credential
    Clear,

    /// Show where the credential comes from
    Show {
        /// Print the full token instead of a masked one
        #[arg(long)]
        reveal: bool,
    },
}

/// Run the token command.
pub async fn run(args: TokenArgs, ctx: &Context) -> Result<()> {
    let target = ctx.target()?;
    let path = target
        .token_path
        .clone()
        .context("could not determine the credential file location")?;

    match args.command {
        TokenCommand::Set { token } => cmd_set(&path, token),
        TokenCommand::Clear => cmd_clear(&path, ctx),
        TokenCommand::Show { reveal } => cmd_show(&path, target.credential.as_deref(), reveal, ctx),
    }
}

fn cmd_set(path: &Path, token: Option<String>) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line
        }
    };
    if token.trim().is_empty() {
        bail!("token is empty");
    }

    stackit_config::save_token(path, &token)?;
    println!("{} Saved credential to {}", style("✓").green(), path.display());
    Ok(())
}

fn cmd_clear(path: &Path, ctx: &Context) -> Result<()> {
    let removed = stackit_config::clear_token(path)?;
    if ctx.json_output {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else if removed {
        println!("{} Removed {}", style("✓").green(), path.display());
    } else {
        println!("No stored credential at {}", path.display());
    }
    Ok(())
}

fn cmd_show(path: &Path, credential: Option<&str>, reveal: bool, ctx: &Context) -> Result<()> {
    let shown = credential.map(|t| if reveal { t.to_string() } else { mask(t) });

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "path": path.display().to_string(),
                "present": credential.is_some(),
                "token": shown,
            }))?
        );
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("  {} {}", dim.apply_to("File:"), path.display());
    match shown {
        Some(token) => println!("  {} {}", dim.apply_to("Token:"), token),
        None => println!("  {} {}", dim.apply_to("Token:"), style("(none)").red()),
    }
    Ok(())
}

/// Keep the first and last four characters.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
