use anyhow::Result;
use reconcile::ExecuteOptions;

use super::{call_context, connect, execute_plan, state_path};
use crate::Context;
use crate::cli::{ApplyArgs, ConnectionArgs};
use crate::manifest::Manifest;
use crate::plan::{self, Mode};
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, conn: &ConnectionArgs, args: &ApplyArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest.manifest)?;
    let client = connect(conn, &manifest.provider)?;
    let path = state_path(conn)?;
    let mut state = StateFile::load(&path)?;

    if !ctx.quiet {
        ui::header("sentryctl apply");
        ui::kv("Manifest", &args.manifest.manifest.display().to_string());
        ui::kv("State", &path.display().to_string());
    }

    let plan = plan::build(&client, &manifest, &state, call_context(conn), Mode::Converge)?;
    plan::display(&plan, ctx.verbose > 0);
    if plan.is_empty() {
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
        ..ExecuteOptions::default()
    };
    execute_plan(ctx, conn, plan, &mut state, &path, opts, args.yes)
}
