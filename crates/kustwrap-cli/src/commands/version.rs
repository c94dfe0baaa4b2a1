//! Version command - show the detected kustomize version

use console::style;
use kustwrap_engine::{UNKNOWN_VERSION, parse_version};

use crate::error::Result;

pub fn run(binary: &str) -> Result<()> {
    let text = kustwrap_engine::version(binary)?;
    println!("{} {}", style("kustomize:").bold(), text);

    match parse_version(&text) {
        Ok(version) => println!("{} {}", style("version:").bold(), version),
        Err(e) => {
            tracing::warn!("{}", e);
            println!(
                "{} {} {}",
                style("version:").bold(),
                UNKNOWN_VERSION,
                style("(unparsable, all features assumed available)").yellow()
            );
        }
    }
    Ok(())
}
