use anyhow::{Context as _, Result, bail};
use reconcile::{CallContext, Reconciler};
use sentry_provider::SentryClient;
use std::collections::BTreeMap;

use super::{call_context, connect, state_path};
use crate::Context;
use crate::cli::{ConnectionArgs, ImportArgs};
use crate::kinds::{KindVisitor, Managed, address};
use crate::manifest::ProviderSettings;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, conn: &ConnectionArgs, args: &ImportArgs) -> Result<()> {
    if args.name.is_empty() || args.name.contains('.') {
        bail!("Name {:?} must be non-empty and must not contain '.'", args.name);
    }
    let addr = address(args.kind, &args.name);

    let path = state_path(conn)?;
    let mut state = StateFile::load(&path)?;
    if let Some(existing) = state.get(&addr) {
        bail!("{addr} already tracks {}; destroy or forget it first", existing.id);
    }

    let client = connect(conn, &ProviderSettings::default())?;
    let imported = args.kind.visit(&mut Importer {
        client: &client,
        ctx: call_context(conn),
        name: &args.name,
        raw_id: &args.id,
    })?;

    state.track(&addr, args.kind.name(), &imported.id);
    state.save(&path)?;

    ui::success(&format!("Imported {addr} ({})", imported.id));
    if !ctx.quiet {
        ui::dim("Add this to your manifest:");
        println!();
        println!("{}", imported.snippet);
    }
    Ok(())
}

struct Imported {
    id: String,
    /// Manifest TOML declaring the imported object
    snippet: String,
}

struct Importer<'c, 'a> {
    client: &'c SentryClient,
    ctx: CallContext,
    name: &'a str,
    raw_id: &'a str,
}

impl<'c> KindVisitor<'c> for Importer<'c, '_> {
    type Output = Result<Imported>;

    fn visit<K: Managed<'c>>(&mut self) -> Self::Output {
        let kind = K::connect(self.client);
        let applied = Reconciler::new(&kind, self.ctx)
            .import(self.raw_id)
            .with_context(|| format!("Could not import {} {}", K::NAME, self.raw_id))?;

        let section = BTreeMap::from([(K::NAME, BTreeMap::from([(self.name, &applied.state)]))]);
        let snippet = toml::to_string_pretty(&section)
            .with_context(|| format!("Could not render {} as TOML", K::NAME))?;

        Ok(Imported {
            id: applied.id,
            snippet,
        })
    }
}
