//! passwd command - set a new password

use super::{secret_or_line, CommandContext};
use anyhow::Result;
use colored::Colorize;

pub async fn execute(
    ctx: &CommandContext,
    username: &str,
    new_password: Option<String>,
) -> Result<()> {
    let new_password = secret_or_line(new_password, std::io::stdin().lock(), "new password")?;

    ctx.provider.update_password(username, &new_password).await?;

    ctx.info(&format!("{}: {}", "password_updated".green(), username));
    Ok(())
}
