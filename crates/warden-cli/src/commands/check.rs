//! check command - validate a user's password

use super::{secret_or_line, CommandContext};
use anyhow::{bail, Result};
use colored::Colorize;
use serde_json::json;

pub async fn execute(ctx: &CommandContext, username: &str, password: Option<String>) -> Result<()> {
    let password = secret_or_line(password, std::io::stdin().lock(), "password")?;

    match ctx.provider.check_user_password(username, &password).await {
        Ok(valid) => {
            if ctx.is_json() {
                println!("{}", json!({ "username": username, "valid": valid }));
            } else {
                ctx.info(&format!("{}: {}", "valid".green(), username));
            }
            Ok(())
        }
        Err(e) if e.kind().is_credential_failure() => {
            tracing::debug!("Credential check failed: {}", e);
            if ctx.is_json() {
                println!("{}", json!({ "username": username, "valid": false }));
            }
            bail!("Invalid credentials for {}", username)
        }
        Err(e) => Err(e.into()),
    }
}
