//! Example: reconcile a team against a scripted server
//!
//! Run with: cargo run -p sentry-provider --example offline_team

use reconcile::{CallContext, Reconciler};
use sentry_provider::{
    HttpResponse, Method, MockTransport, ProviderConfig, SentryClient, TeamKind, TeamState,
};
use serde_json::json;

fn main() -> reconcile::Result<()> {
    let team = json!({"id": "4502", "slug": "core-team", "name": "core-team"});
    let mock = MockTransport::new();
    mock.on(
        Method::Post,
        "0/organizations/acme/teams/",
        HttpResponse::json(201, team.clone()),
    );
    mock.on(Method::Get, "0/teams/acme/core-team/", HttpResponse::json(200, team));

    let config = ProviderConfig::builder()
        .token("example-token")
        .build_with_env(|_| None)?;
    let client = SentryClient::with_transport(config, mock.clone());
    let teams = TeamKind::new(&client);
    let reconciler = Reconciler::new(&teams, CallContext::unbounded());

    let desired = TeamState {
        organization: "acme".into(),
        name: "core-team".into(),
        slug: None,
    };

    let created = reconciler.create(&desired)?;
    println!("created {} ({:?})", created.id, created.action);

    let again = reconciler.update(&created.id, &desired)?;
    println!("update {} ({:?})", again.id, again.action);

    for request in mock.requests() {
        println!("  {} {}", request.method, request.url);
    }
    println!("writes issued: {}", mock.write_count());
    Ok(())
}
