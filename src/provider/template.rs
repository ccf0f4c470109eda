// src/provider/template.rs

//! Template provider
//!
//! Runs in the configure phase, after the package's files exist on the
//! image: reads the packaged source, renders it against the evaluation
//! scope, and writes the output path with the declared mode.

use super::{chown_best_effort, Context};
use crate::action::{parse_mode, Template};
use crate::error::Result;
use crate::template::render;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tracing::debug;

pub fn configure(action: &Template, ctx: &Context) -> Result<()> {
    let source = ctx.image_path(&action.source);
    let output = ctx.image_path(&action.output);

    let text = fs::read_to_string(&source)?;
    let rendered = render(&text, ctx.scope)?;

    fs::write(&output, rendered)?;
    let mode = parse_mode(&action.mode)?;
    fs::set_permissions(&output, fs::Permissions::from_mode(mode))?;
    chown_best_effort(&output, &action.owner, &action.group, true);

    debug!(
        "rendered template {} => {}",
        source.display(),
        output.display()
    );
    Ok(())
}
