//! Config Command
//!
//! Manage buildwright configuration.
//!
//! Usage:
//!   buildwright config show [-f json]
//!   buildwright config path
//!   buildwright config init [-g] [--force]

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the effective configuration
pub fn show(ctx: &CommandContext, format: &str) -> Result<()> {
    println!("{}", ConfigLoader::render(&ctx.config, format == "json")?);
    Ok(())
}

/// Show configuration paths
pub fn path(ctx: &CommandContext) -> Result<()> {
    let mark = |exists: bool| if exists { "✓" } else { "✗" };

    println!("Configuration paths:");
    println!();
    match ConfigLoader::global_config_path() {
        Some(global) => println!("  Global:  {} {}", mark(global.exists()), global.display()),
        None => println!("  Global:  (not available)"),
    }
    let project = ConfigLoader::project_config_path();
    println!("  Project: {} {}", mark(project.exists()), project.display());
    if let Some(explicit) = &ctx.config_path {
        println!(
            "  --config: {} {}",
            mark(explicit.exists()),
            explicit.display()
        );
    }
    Ok(())
}

/// Initialize global or project configuration
pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };
    Output::new().success(&format!(
        "Initialized {} configuration",
        if global { "global" } else { "project" }
    ));
    println!("  Config:    {}", path.display());
    Ok(())
}
