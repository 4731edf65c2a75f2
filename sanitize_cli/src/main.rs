extern crate env_logger;
extern crate serde_json;
extern crate sanitize;

pub mod error;
pub mod options;

use clap::Parser;
use error::CliError;
use options::{Cli, Commands};
use sanitize::{sanitize_text, Policy, PolicyBuilder, PolicyOverrides, Preset};
use serde_json::json;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        use env_logger::Env;
        let env = Env::default()
            .filter_or("RUST_LOG", "info")
            .write_style_or("RUST_LOG_STYLE", "always");

        env_logger::init_from_env(env);
    }

    let result = match cli.command {
        Some(Commands::PRESETS { json }) => list_presets(json),
        None => run(&cli),
    };

    if let Err(e) = result {
        eprintln!("sanitize: {}", e);
        std::process::exit(1);
    }
}

/// Sanitize the input with the policy the flags describe.
fn run(cli: &Cli) -> Result<(), CliError> {
    let policy = build_policy(cli)?;
    let markup = read_input(cli.input.as_deref())?;
    let clean = sanitize_text(&markup, &policy);

    log::info!(
        "sanitized {} bytes into {} bytes with the {} preset",
        markup.len(),
        clean.len(),
        cli.preset
    );

    match cli.out {
        Some(ref path) => fs::write(path, clean)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(clean.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Preset, then the `--config` overrides, then individual flags.
fn build_policy(cli: &Cli) -> Result<Policy, CliError> {
    let preset = Preset::from_name(&cli.preset)?;
    let mut builder = PolicyBuilder::from(preset.policy());

    if let Some(ref path) = cli.config {
        let json = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;

        PolicyOverrides::from_json(&json)?.merge_into(&mut builder)?;
    }

    if let Some(ref output) = cli.output {
        builder.with_output(output);
    }

    if cli.allow_comments {
        builder.with_allow_comments(true);
    }

    if !cli.trusted_prefix.is_empty() {
        builder.with_trusted_prefixes(cli.trusted_prefix.iter().cloned());
    }

    Ok(builder.build()?)
}

fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => {
            let mut markup = String::new();
            io::stdin()
                .read_to_string(&mut markup)
                .map_err(CliError::Stdin)?;
            Ok(markup)
        }
    }
}

fn list_presets(as_json: bool) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();

    for preset in Preset::all() {
        let policy = preset.policy();
        let mut elements: Vec<&str> = policy.allowed_elements().iter().map(|e| e.as_str()).collect();
        elements.sort_unstable();

        if as_json {
            let mut attributes: Vec<(&String, Vec<&String>)> = policy
                .allowed_attributes()
                .iter()
                .map(|(element, names)| {
                    let mut names: Vec<&String> = names.iter().collect();
                    names.sort_unstable();
                    (element, names)
                })
                .collect();
            attributes.sort_unstable();

            let j = json!({
                "name": preset.to_string(),
                "elements": elements,
                "attributes": attributes,
                "output": policy.output_mode().to_string(),
            });

            writeln!(stdout, "{}", j)?;
        } else {
            writeln!(stdout, "{}: {}", preset, elements.join(" "))?;
        }
    }

    Ok(())
}
