pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod read;

use anyhow::{Context as _, Result};
use colored::Colorize;
use reconcile::{
    ApplyResult, AutoConfirm, CallContext, ExecuteOptions, ExecuteReport, ExecuteSummary, execute,
};
use sentry_provider::{ProviderConfig, SentryClient};
use std::path::PathBuf;
use std::time::Duration;

use crate::Context;
use crate::cli::ConnectionArgs;
use crate::kinds::parse_address;
use crate::manifest::ProviderSettings;
use crate::paths;
use crate::plan::Plan;
use crate::progress::{BarProgress, PromptConfirm};
use crate::state::StateFile;

/// Client configured from flags, then the manifest, then the environment
pub fn connect(conn: &ConnectionArgs, settings: &ProviderSettings) -> Result<SentryClient> {
    let config = provider_config(conn, settings, |name| std::env::var(name).ok())?;
    log::debug!("Using Sentry API at {}", config.base_url());
    Ok(SentryClient::new(config))
}

fn provider_config<E>(
    conn: &ConnectionArgs,
    settings: &ProviderSettings,
    env: E,
) -> Result<ProviderConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let mut builder = ProviderConfig::builder();
    if let Some(token) = &conn.token {
        builder = builder.token(token.clone());
    }
    if let Some(base_url) = conn.base_url.as_ref().or(settings.base_url.as_ref()) {
        builder = builder.base_url(base_url.clone());
    }
    if let Some(secs) = conn.timeout.or(settings.timeout_secs) {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder
        .build_with_env(env)
        .context("Could not configure the Sentry client")
}

/// Deadline shared by the calls of one operation
pub fn call_context(conn: &ConnectionArgs) -> CallContext {
    deadline(conn).map_or_else(CallContext::unbounded, CallContext::with_timeout)
}

fn deadline(conn: &ConnectionArgs) -> Option<Duration> {
    conn.deadline.map(Duration::from_secs)
}

pub fn state_path(conn: &ConnectionArgs) -> Result<PathBuf> {
    match &conn.state {
        Some(path) => Ok(path.clone()),
        None => paths::state_file(),
    }
}

/// Run a plan's changes, persist the resulting bindings and print a summary.
///
/// Fails when any change failed, after the successful ones were recorded.
pub fn execute_plan(
    ctx: &Context,
    conn: &ConnectionArgs,
    plan: Plan<'_>,
    state: &mut StateFile,
    state_path: &std::path::Path,
    opts: ExecuteOptions,
    yes: bool,
) -> Result<()> {
    let opts = ExecuteOptions {
        call_timeout: deadline(conn),
        ..opts
    };
    let pending = plan.pending();

    let mut progress = BarProgress::new(ctx.quiet);
    let report = if yes {
        execute(plan.changes, &opts, &mut progress, &mut AutoConfirm)?
    } else {
        execute(plan.changes, &opts, &mut progress, &mut PromptConfirm)?
    };

    if opts.dry_run {
        crate::ui::info(&format!("Dry run: {pending} change(s) not applied"));
        return Ok(());
    }
    if report.results.is_empty() {
        crate::ui::warn("Aborted, nothing was changed");
        return Ok(());
    }

    if record(state, &report) {
        state.save(state_path)?;
    }
    print_summary(&report.summary);

    if !report.summary.is_success() {
        for (address, result) in &report.results {
            if let ApplyResult::Failed { error } = result {
                crate::ui::error(&format!("{address}: {error}"));
            }
        }
        anyhow::bail!("{} change(s) failed", report.summary.failed);
    }
    Ok(())
}

/// Apply executor results to the tracked bindings. Returns whether anything changed.
fn record(state: &mut StateFile, report: &ExecuteReport) -> bool {
    let mut changed = false;
    for (address, result) in &report.results {
        let Some((kind, _)) = parse_address(address) else {
            log::warn!("Not recording unexpected address {address}");
            continue;
        };

        if let Some(id) = result.tracked_id() {
            if state.get(address).is_none_or(|t| t.id != id) {
                state.track(address, kind.name(), id);
                changed = true;
            }
        } else if matches!(result, ApplyResult::Deleted | ApplyResult::AlreadyAbsent) {
            changed |= state.forget(address).is_some();
        }
    }
    changed
}

fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn test_flag_beats_manifest_beats_env() {
        let settings = ProviderSettings {
            base_url: Some("https://manifest.example.com/api/".into()),
            timeout_secs: Some(5),
        };
        let env = env_of(&[
            ("SENTRY_AUTH_TOKEN", "env-token"),
            ("SENTRY_BASE_URL", "https://env.example.com/api/"),
        ]);

        let config = provider_config(&ConnectionArgs::default(), &settings, &env).unwrap();
        assert_eq!(config.base_url().as_str(), "https://manifest.example.com/api/");
        assert_eq!(config.token(), "env-token");
        assert_eq!(config.timeout(), Duration::from_secs(5));

        let conn = ConnectionArgs {
            token: Some("flag-token".into()),
            base_url: Some("https://flag.example.com/api/".into()),
            timeout: Some(9),
            ..ConnectionArgs::default()
        };
        let config = provider_config(&conn, &settings, &env).unwrap();
        assert_eq!(config.base_url().as_str(), "https://flag.example.com/api/");
        assert_eq!(config.token(), "flag-token");
        assert_eq!(config.timeout(), Duration::from_secs(9));

        let config =
            provider_config(&ConnectionArgs::default(), &ProviderSettings::default(), &env)
                .unwrap();
        assert_eq!(config.base_url().as_str(), "https://env.example.com/api/");
    }

    #[test]
    fn test_missing_token() {
        let err = provider_config(
            &ConnectionArgs::default(),
            &ProviderSettings::default(),
            env_of(&[]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("SENTRY_AUTH_TOKEN"));
    }

    #[test]
    fn test_record() {
        let mut state = StateFile::default();
        state.track("team.old", "team", "acme/old");
        state.track("team.gone", "team", "acme/gone");
        state.track("project.web", "project", "acme/web");

        let report = ExecuteReport {
            summary: ExecuteSummary::default(),
            results: vec![
                ("team.core".into(), ApplyResult::Created { id: "acme/core-team".into() }),
                ("team.old".into(), ApplyResult::Deleted),
                ("team.gone".into(), ApplyResult::AlreadyAbsent),
                ("project.web".into(), ApplyResult::Updated { id: "acme/web-app".into() }),
                ("project.api".into(), ApplyResult::Failed { error: "boom".into() }),
            ],
        };

        assert!(record(&mut state, &report));
        assert_eq!(state.get("team.core").unwrap().id, "acme/core-team");
        assert_eq!(state.get("team.core").unwrap().kind, "team");
        assert!(state.get("team.old").is_none());
        assert!(state.get("team.gone").is_none());
        assert_eq!(state.get("project.web").unwrap().id, "acme/web-app");
        assert!(state.get("project.api").is_none());
    }

    #[test]
    fn test_record_unchanged_is_noop() {
        let mut state = StateFile::default();
        state.track("team.core", "team", "acme/core-team");

        let report = ExecuteReport {
            summary: ExecuteSummary::default(),
            results: vec![(
                "team.core".into(),
                ApplyResult::Unchanged { id: "acme/core-team".into() },
            )],
        };
        assert!(!record(&mut state, &report));
    }
}
