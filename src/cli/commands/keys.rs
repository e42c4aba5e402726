//! Keys Command
//!
//! Manage the primary and backup API keys.
//!
//! Usage:
//!   buildwright keys set-primary [KEY] [--force]
//!   buildwright keys set-backup [KEY] [--force]
//!   buildwright keys status [-f json]
//!   buildwright keys failover
//!   buildwright keys restore
//!   buildwright keys clear --yes
//!
//! Keys not given on the command line are read from the terminal without echo.
//! Malformed keys are refused unless `--force` is given.

use console::Term;
use secrecy::SecretString;

use crate::ai::{CredentialRole, CredentialVault, validate_key_format};
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{BuildwrightError, Result};

pub fn set(
    ctx: &CommandContext,
    role: CredentialRole,
    key: Option<String>,
    force: bool,
) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => prompt_key(role)?,
    };
    let key = prepare_key(&key, force)?;
    let vault = ctx.open_vault()?;
    store_key(&vault, role, key)?;

    let status = vault.status();
    let masked = match role {
        CredentialRole::Primary => status.primary,
        CredentialRole::Backup => status.backup,
    };
    Output::new().success(&format!("Stored {} key {} in {}", role, masked, status.store));
    Ok(())
}

/// Trim `raw` and check its format unless `force` is set
fn prepare_key(raw: &str, force: bool) -> Result<SecretString> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(BuildwrightError::InvalidInput("No key entered".to_string()));
    }
    if force {
        tracing::warn!("Storing API key without format check");
    } else {
        validate_key_format(key)?;
    }
    Ok(SecretString::from(key.to_string()))
}

fn store_key(vault: &CredentialVault, role: CredentialRole, key: SecretString) -> Result<()> {
    match role {
        CredentialRole::Primary => {
            vault.set_primary(key)?;
            vault.mark_setup_complete()
        }
        CredentialRole::Backup => vault.set_backup(key),
    }
}

fn prompt_key(role: CredentialRole) -> Result<String> {
    let term = Term::stderr();
    term.write_str(&format!("Enter {} API key: ", role))?;
    Ok(term.read_secure_line()?)
}

pub fn status(ctx: &CommandContext, format: &str) -> Result<()> {
    let status = ctx.open_vault()?.status();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let out = Output::new();
    out.header("API Keys");
    out.field("Store", &status.store);
    out.field(
        "Primary",
        format!("{} (failures: {})", status.primary, status.primary_failures),
    );
    out.field(
        "Backup",
        format!("{} (failures: {})", status.backup, status.backup_failures),
    );
    out.field("Active", status.active);
    match &status.setup_timestamp {
        Some(at) => out.field("Setup", format!("complete ({})", at)),
        None => out.field("Setup", "incomplete"),
    }

    if !status.has_primary {
        println!();
        out.info("Run 'buildwright keys set-primary' to configure a key");
    }
    Ok(())
}

pub fn failover(ctx: &CommandContext) -> Result<()> {
    let out = Output::new();
    if ctx.open_vault()?.failover()? {
        out.success("Backup key is now active");
    } else {
        out.warning("No backup key configured; primary stays active");
    }
    Ok(())
}

pub fn restore(ctx: &CommandContext) -> Result<()> {
    ctx.open_vault()?.restore_primary()?;
    Output::new().success("Primary key is active again");
    Ok(())
}

pub fn clear(ctx: &CommandContext, confirmed: bool) -> Result<()> {
    let out = Output::new();
    if !confirmed {
        out.warning("This deletes both keys and all failover state. Re-run with --yes.");
        return Ok(());
    }
    ctx.open_vault()?.clear()?;
    out.success("All stored keys removed");
    Ok(())
}
