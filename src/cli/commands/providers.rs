//! Providers command - list known providers and their key status.

use crate::cli::Output;
use crate::config::{api_key_env_var, builtin, lookup_api_key, mask_key, Settings};
use console::style;

/// Print every provider, marking `active`.
pub fn print_providers(settings: &Settings, active: &str) {
    Output::header("Providers");
    for name in settings.provider_names() {
        let profile = builtin(&name);
        let custom = settings.providers.get(&name);

        let model = custom
            .map(|c| c.model.as_str())
            .filter(|m| !m.is_empty())
            .or(profile.map(|p| p.model))
            .unwrap_or("-");

        let explicit = if name == settings.provider.name {
            settings.provider.api_key.as_str()
        } else {
            custom.map(|c| c.api_key.as_str()).unwrap_or("")
        };
        let key = match lookup_api_key(&name, explicit) {
            Some(key) => style(mask_key(&key)).green().to_string(),
            None if profile.is_some_and(|p| !p.requires_key) => {
                style("not needed").dim().to_string()
            }
            None => style(format!("missing ({})", api_key_env_var(&name))).yellow().to_string(),
        };

        let marker = if name == active { style("*").green().bold() } else { style(" ") };
        println!("  {} {:<12} {:<32} {}", marker, style(&name).bold(), model, key);
    }
    println!();
}

pub fn run_providers(settings: &Settings) -> anyhow::Result<()> {
    print_providers(settings, &settings.provider.name);
    Ok(())
}
