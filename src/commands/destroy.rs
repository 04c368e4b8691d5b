use anyhow::Result;
use reconcile::ExecuteOptions;

use super::{call_context, connect, execute_plan, state_path};
use crate::Context;
use crate::cli::{ConnectionArgs, DestroyArgs};
use crate::manifest::Manifest;
use crate::plan::{self, Mode};
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, conn: &ConnectionArgs, args: &DestroyArgs) -> Result<()> {
    // Only connection settings are taken from the manifest
    let manifest = if args.manifest.manifest.exists() {
        Manifest::load(&args.manifest.manifest)?
    } else {
        log::debug!(
            "{} not found, using connection defaults",
            args.manifest.manifest.display()
        );
        Manifest::default()
    };
    let client = connect(conn, &manifest.provider)?;
    let path = state_path(conn)?;
    let mut state = StateFile::load(&path)?;

    if state.resources.is_empty() {
        ui::info("Nothing is tracked, nothing to destroy");
        return Ok(());
    }
    if !ctx.quiet {
        ui::header("sentryctl destroy");
        ui::kv("State", &path.display().to_string());
    }

    let plan = plan::build(&client, &manifest, &state, call_context(conn), Mode::Destroy)?;
    plan::display(&plan, ctx.verbose > 0);

    let opts = ExecuteOptions {
        jobs: args.jobs,
        ..ExecuteOptions::default()
    };
    execute_plan(ctx, conn, plan, &mut state, &path, opts, args.yes)
}
