//=====================================================
// File: main.rs
//=====================================================
// Goal: pklrt command line entry point
// Objective: Evaluate a configuration module and print its value
//=====================================================

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use pklrt::resolve::ModuleSource;
use pklrt::session::EvaluatorBuilder;
use pklrt::settings::Settings;
use pklrt::stdlib::ModuleId;

#[derive(Parser)]
#[command(name = "pklrt", about = "Evaluate a configuration module")]
struct Cli {
    /// Module file to evaluate
    file: PathBuf,
    /// Require the module to amend the given standard library module,
    /// e.g. `settings`
    #[arg(long)]
    expect: Option<String>,
    /// Print the configured editor URL scheme from the user settings file
    /// before evaluating
    #[arg(long)]
    show_editor: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();

    if cli.show_editor {
        let settings = Settings::load_default().context("failed loading user settings")?;
        println!("editor: {}", settings.editor.url_scheme());
    }

    let evaluator = EvaluatorBuilder::preconfigured().build();
    let source = ModuleSource::path(&cli.file);
    let value = match &cli.expect {
        Some(name) => evaluator.evaluate_output_as(&source, &ModuleId::new(name)),
        None => evaluator.evaluate(&source),
    }
    .with_context(|| format!("failed evaluating {}", cli.file.display()))?;

    println!("{value}");
    Ok(())
}

//=====================================================
// End of file
//=====================================================
