#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::style)]

use anyhow::Context;
use clap::Parser;
use subforge::cli::{Args, Command};
use subforge::converter::{Converter, ConverterConfig};
use subforge::emit::emit_config;
use subforge::validator::validate_yaml;
use tracing::Level;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let is_verbose = args.verbose;
    tracing_subscriber::fmt()
        .with_max_level(if is_verbose {
            Level::TRACE
        } else {
            Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded
async fn run(args: Args) -> anyhow::Result<bool> {
    match args.command {
        Command::Convert {
            config,
            inputs,
            format,
            output,
        } => {
            let mut config = match config {
                Some(path) => {
                    tracing::info!("Loading converter config from: {}", path);
                    ConverterConfig::load(&path).await?
                }
                None => ConverterConfig::from_inputs(&inputs),
            };
            if !inputs.is_empty() {
                config.sources = ConverterConfig::from_inputs(&inputs).sources;
            }
            if format.is_some() {
                config.format = format;
            }
            config.validate()?;

            let converter = Converter::new(config);
            converter.convert_to_output(output.as_deref()).await?;

            tracing::info!("Conversion complete!");
            Ok(true)
        }
        Command::Validate { path, fix_output } => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path))?;
            let result = validate_yaml(&content)?;
            for issue in &result.issues {
                tracing::warn!("{}", issue);
            }

            let json = serde_json::to_string_pretty(&result).context("Failed to serialize validation result")?;
            println!("{}", json);

            if let (Some(fix_path), Some(fixed)) = (fix_output, result.fixed_config.as_ref()) {
                tokio::fs::write(&fix_path, emit_config(fixed))
                    .await
                    .with_context(|| format!("Failed to write fixed config to {}", fix_path))?;
                tracing::info!("Fixed config written to {}", fix_path);
            }
            Ok(result.valid)
        }
    }
}
