//! Images command - list the container images of the generated objects

use std::io::Write;

use crate::commands::{BuildArgs, BuildRequest};
use crate::config::KustwrapConfig;
use crate::display::{print_commands, render_images};
use crate::error::Result;

pub fn run(args: &BuildArgs, config: &KustwrapConfig) -> Result<()> {
    let output = BuildRequest::from_args(args, config)?.run()?;

    let rendered = render_images(&output.images, args.output)?;
    std::io::stdout().write_all(rendered.as_bytes())?;

    if args.show_commands {
        print_commands(&output.commands);
    }
    Ok(())
}
