use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::config::AppConfig;
use crate::core::error::ReportError;

pub fn init(path: &Path) -> Result<()> {
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    AppConfig::default()
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Generated config at {}", path.display());
    println!("  Set report.property_id and auth.credentials_path before running `ga4xl report`.");
    Ok(())
}

pub fn check(path: &Path) -> Result<()> {
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `ga4xl config init` to create one.");
        return Ok(());
    }

    let config = AppConfig::load_from(path).map_err(ReportError::from)?;
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        if config.report.property_id.is_empty() {
            println!("  No property_id set; pass --property or GA4_PROPERTY_ID.");
        } else {
            println!("  Property: {}", config.report.property_id);
        }
        println!("  Metrics: {}", config.report.metrics.join(", "));
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        return Err(ReportError::Configuration(format!(
            "{} issue{} in {}",
            issues.len(),
            if issues.len() == 1 { "" } else { "s" },
            path.display()
        ))
        .into());
    }
    Ok(())
}

/// Print the effective configuration (file, environment and defaults merged).
pub fn show(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Text => print!("{}", config.to_toml()?),
        OutputFormat::Json => {
            let json = if opts.pretty {
                serde_json::to_string_pretty(config)?
            } else {
                serde_json::to_string(config)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}
