//! Display formatting for CLI output

use clap::ValueEnum;
use console::style;
use kustwrap_core::ResourceObject;

use crate::error::{CliError, Result};

/// Output format for generated objects and images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Multi-document YAML stream
    #[default]
    Yaml,
    /// JSON array
    Json,
}

/// Render objects as a YAML stream or a JSON array
pub fn render_objects(objects: &[ResourceObject], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => {
            let mut out = String::new();
            for object in objects {
                let yaml = object.to_yaml().map_err(|e| CliError::Other {
                    message: format!("failed to serialize {}: {}", object.display_name(), e),
                })?;
                out.push_str("---\n");
                out.push_str(&yaml);
            }
            Ok(out)
        }
        OutputFormat::Json => to_json(objects),
    }
}

/// Render images one per line, or as a JSON array
pub fn render_images(images: &[String], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(images.iter().map(|i| format!("{}\n", i)).collect()),
        OutputFormat::Json => to_json(images),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map(|json| json + "\n")
        .map_err(|e| CliError::Other {
            message: format!("failed to serialize JSON: {}", e),
        })
}

/// Print the command log to stderr
pub fn print_commands(commands: &[String]) {
    eprintln!("{}", style("# Commands").cyan().bold());
    for command in commands {
        eprintln!("{}", style(command).dim());
    }
}
