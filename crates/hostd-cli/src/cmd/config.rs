use crate::output::print_json;
use anyhow::{anyhow, Result};
use clap::Subcommand;
use hostd_core::config::{HostdConfig, WarnLevel};

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Print the effective configuration as YAML
    Show,
    /// Check the effective configuration for problems
    Validate,
}

pub fn run(config: &HostdConfig, subcommand: ConfigSubcommand, json: bool) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => show(config, json),
        ConfigSubcommand::Validate => validate(config, json),
    }
}

fn show(config: &HostdConfig, json: bool) -> Result<()> {
    if json {
        return print_json(config);
    }
    print!("{}", config.to_yaml().map_err(|e| anyhow!("{e}"))?);
    Ok(())
}

fn validate(config: &HostdConfig, json: bool) -> Result<()> {
    let warnings = config.validate();
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&warnings)?;
    } else if warnings.is_empty() {
        println!("config ok");
    } else {
        for w in &warnings {
            let tag = match w.level {
                WarnLevel::Error => "error",
                WarnLevel::Warning => "warning",
            };
            println!("{tag}: {}", w.message);
        }
    }

    if errors > 0 {
        return Err(anyhow!("config has {errors} error(s)"));
    }
    Ok(())
}
