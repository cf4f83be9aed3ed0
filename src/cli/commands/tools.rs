//! Tools command - list the tool catalog.

use crate::cli::Output;
use crate::tools::{catalog, indicator};
use console::style;

/// Print every tool with its parameters, grouped by category.
pub fn print_tools() {
    let mut category = "";
    for def in catalog() {
        let ind = indicator(def.name);
        if ind.category != category {
            category = ind.category;
            Output::header(&capitalize(category));
        }

        let params = def
            .parameters
            .iter()
            .map(|p| {
                if def.is_required(p) {
                    style(*p).bold().to_string()
                } else {
                    format!("[{}]", p)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        println!(
            "  {} {:<18} {} {}",
            ind.icon,
            style(def.name).cyan(),
            def.description,
            style(params).dim()
        );
    }
    println!();
}

pub fn run_tools() -> anyhow::Result<()> {
    print_tools();
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
