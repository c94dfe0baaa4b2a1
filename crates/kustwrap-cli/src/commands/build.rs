//! Build command - apply customizations and print the generated objects

use std::io::Write;

use crate::commands::{BuildArgs, BuildRequest};
use crate::config::KustwrapConfig;
use crate::display::{print_commands, render_objects};
use crate::error::Result;

pub fn run(args: &BuildArgs, config: &KustwrapConfig) -> Result<()> {
    let request = BuildRequest::from_args(args, config)?;
    let output = request.run()?;

    let rendered = render_objects(&output.objects, args.output)?;
    std::io::stdout().write_all(rendered.as_bytes())?;

    if args.show_commands {
        print_commands(&output.commands);
    }

    tracing::info!("generated {} object(s)", output.objects.len());
    Ok(())
}
