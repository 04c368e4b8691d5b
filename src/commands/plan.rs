use anyhow::Result;

use super::{call_context, connect, state_path};
use crate::Context;
use crate::cli::{ConnectionArgs, ManifestArgs};
use crate::manifest::Manifest;
use crate::plan::{self, Mode};
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, conn: &ConnectionArgs, args: &ManifestArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let client = connect(conn, &manifest.provider)?;
    let state = StateFile::load(&state_path(conn)?)?;

    if !ctx.quiet {
        ui::header("sentryctl plan");
        ui::kv("Manifest", &args.manifest.display().to_string());
        ui::kv("Declared", &manifest.count().to_string());
        ui::kv("Tracked", &state.resources.len().to_string());
    }

    let plan = plan::build(&client, &manifest, &state, call_context(conn), Mode::Converge)?;
    plan::display(&plan, ctx.verbose > 0);
    Ok(())
}
