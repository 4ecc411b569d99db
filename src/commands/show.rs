// src/commands/show.rs

//! Show command - print formula metadata

use anyhow::Result;

pub fn cmd_show(formula_path: &str) -> Result<()> {
    let formula = super::load_formula(formula_path)?;
    let package = &formula.package;

    println!("Name:         {}", package.name);
    println!("Version:      {}", package.version);
    if let Some(summary) = &package.summary {
        println!("Summary:      {}", summary);
    }
    if let Some(homepage) = &package.homepage {
        println!("Homepage:     {}", homepage);
    }
    if let Some(head) = &package.head {
        println!("Head:         {}", head);
    }
    println!("Source:       {}", formula.source_url());
    println!(
        "Checksum:     {}",
        formula.source.checksum.as_deref().unwrap_or("(none)")
    );

    if !formula.build.dependencies.is_empty() {
        let deps: Vec<&str> = formula.build.dependencies.iter().map(String::as_str).collect();
        println!("Build deps:   {}", deps.join(", "));
    }

    if !formula.install.is_empty() {
        println!("Installs:");
        for (built, installed) in &formula.install {
            println!("  {} -> {}", built, formula.substitute(installed, None, None));
        }
    }

    if let Some(test) = &formula.test {
        println!("Test:         {}", test.command);
    }
    Ok(())
}
