//! ping command - check the service account can bind

use super::CommandContext;
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;

pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let url = &ctx.provider.config().url;

    ctx.provider
        .check_connection()
        .await
        .with_context(|| format!("Directory {} is not reachable", url))?;

    if ctx.is_json() {
        println!("{}", json!({ "url": url, "reachable": true }));
    } else {
        ctx.info(&format!("{}: {}", "ok".green(), url));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, directory, ADMIN_DN};
    use crate::OutputFormat;
    use warden_core::DirectoryError;

    #[tokio::test]
    async fn test_ping_binds_service_account() {
        let directory = directory();
        let ctx = context(&directory, OutputFormat::Text);

        execute(&ctx).await.unwrap();

        assert_eq!(directory.binds()[0].1, ADMIN_DN);
        assert_eq!(directory.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_ping_reports_unreachable_directory() {
        let directory = directory().fail_dial(DirectoryError::Transport("refused".to_string()));
        let ctx = context(&directory, OutputFormat::Text);

        let err = execute(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Directory ldap://127.0.0.1:389 is not reachable");
    }
}
