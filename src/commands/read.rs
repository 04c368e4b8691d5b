use anyhow::{Context as _, Result, bail};
use reconcile::{CallContext, Observed, Reconciler};
use sentry_provider::SentryClient;
use serde_json::Value;

use super::{call_context, connect};
use crate::Context;
use crate::cli::{ConnectionArgs, ReadArgs};
use crate::kinds::{KindVisitor, Managed};
use crate::manifest::ProviderSettings;

pub fn run(_ctx: &Context, conn: &ConnectionArgs, args: &ReadArgs) -> Result<()> {
    let client = connect(conn, &ProviderSettings::default())?;
    let observed = args.kind.visit(&mut Reader {
        client: &client,
        ctx: call_context(conn),
        id: &args.id,
    })?;

    let Some(state) = observed else {
        bail!("{} {} does not exist", args.kind, args.id);
    };
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// Canonical state as JSON, `None` when the object is gone
struct Reader<'c, 'a> {
    client: &'c SentryClient,
    ctx: CallContext,
    id: &'a str,
}

impl<'c> KindVisitor<'c> for Reader<'c, '_> {
    type Output = Result<Option<Value>>;

    fn visit<K: Managed<'c>>(&mut self) -> Self::Output {
        let kind = K::connect(self.client);
        let observed = Reconciler::new(&kind, self.ctx)
            .read(self.id)
            .with_context(|| format!("Could not read {} {}", K::NAME, self.id))?;

        match observed {
            Observed::Present(state) => Ok(Some(serde_json::to_value(state)?)),
            Observed::Gone => Ok(None),
        }
    }
}
