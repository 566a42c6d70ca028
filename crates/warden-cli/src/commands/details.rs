//! details command - show profile and group memberships

use super::CommandContext;
use anyhow::Result;
use colored::Colorize;
use warden_auth::UserDetails;

pub async fn execute(ctx: &CommandContext, username: &str) -> Result<()> {
    let details = ctx.provider.get_details(username).await?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        print!("{}", render(&details));
    }

    Ok(())
}

fn render(details: &UserDetails) -> String {
    let mut out = String::new();

    out.push_str(&format!("{:<14}{}\n", "Username:".bold(), details.username));
    out.push_str(&format!("{:<14}{}\n", "Display name:".bold(), details.display_name));
    out.push_str(&format!("{:<14}{}\n", "Emails:".bold(), details.emails.join(", ")));
    out.push_str(&format!("{:<14}", "Groups:".bold()));
    if details.groups.is_empty() {
        out.push_str(&format!("{}\n", "(none)".dimmed()));
    } else {
        out.push('\n');
        for group in &details.groups {
            out.push_str(&format!("  - {}\n", group));
        }
    }

    out
}
