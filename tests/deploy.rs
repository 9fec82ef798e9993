// ABOUTME: End-to-end deploy tests through the orchestrator and the fake engine.
// ABOUTME: Template selection, terminal events, failures and the update/cleanup flow.

mod support;

use exoframe::cleanup::CleanupOutcome;
use exoframe::config::{ServerConfig, SharedServerConfig};
use exoframe::deploy::{DeployOutcome, DeployRequest, Orchestrator};
use exoframe::diagnostics::Diagnostics;
use exoframe::launch::{LABEL_PROJECT, LABEL_USER};
use exoframe::plugins::PluginRegistry;
use exoframe::proxy::ProxyOutcome;
use exoframe::runtime::Runtime;
use exoframe::secrets::MemorySecretStore;
use exoframe::status::{Level, StatusEvent};
use exoframe::templates::TemplateRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use support::fake_runtime::FakeRuntime;

fn orchestrator(fake: &Arc<FakeRuntime>, server: ServerConfig) -> Orchestrator {
    let runtime: Arc<dyn Runtime> = fake.clone();
    let mut secrets = MemorySecretStore::new();
    secrets.insert("admin", "apikey", "k-123");
    Orchestrator::new(
        runtime,
        TemplateRegistry::builtin(),
        PluginRegistry::new(Vec::new(), &mut Diagnostics::default()),
        SharedServerConfig::new(server),
        Arc::new(secrets),
    )
}

fn fast_server() -> ServerConfig {
    ServerConfig {
        cleanup_settle_delay: Duration::ZERO,
        cleanup_max_attempts: 3,
        ..Default::default()
    }
}

async fn run(orch: &Orchestrator, request: DeployRequest) -> (Vec<StatusEvent>, DeployOutcome) {
    let mut handle = orch.resolve_and_deploy(request);
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    let outcome = handle.finished.await.unwrap();
    (events, outcome)
}

fn terminal_events(events: &[StatusEvent]) -> Vec<&StatusEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}

fn single_error(events: &[StatusEvent]) -> &StatusEvent {
    let errors: Vec<_> = events.iter().filter(|e| e.level == Level::Error).collect();
    assert_eq!(errors.len(), 1, "expected exactly one error event: {events:#?}");
    assert!(events.iter().all(|e| e.deployments.is_none()));
    assert_eq!(events.last().map(|e| e.level), Some(Level::Error));
    errors[0]
}

#[tokio::test]
async fn node_project_builds_and_launches() {
    support::init_tracing();
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo", "env": {"API_KEY": "@apikey"}}"#),
        ("package.json", r#"{"name": "demo"}"#),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    fake.script_build(&[r#"{"stream":"Step 1/6 : FROM node:lts-alpine\n"}"#]);
    let orch = orchestrator(&fake, ServerConfig::default());

    let (events, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(outcome.succeeded);
    assert!(outcome.cleanup.is_none());
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert!(std::ptr::eq(terminal[0], events.last().unwrap()));

    let deployments = terminal[0].deployments.as_ref().unwrap();
    assert_eq!(deployments.len(), 1);
    let record = &deployments[0];
    assert_eq!(record.label(LABEL_PROJECT), Some("demo"));
    assert_eq!(record.label(LABEL_USER), Some("admin"));
    assert!(!record.labels.keys().any(|k| k.ends_with(".rule")));

    assert!(dir.path().join("Dockerfile").is_file());
    let builds = fake.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].tag, "exo-admin-demo:latest");

    let container = fake.container_named(&record.name).unwrap();
    assert!(container.config.env.contains(&"API_KEY=k-123".to_string()));

    let build_line = events
        .iter()
        .position(|e| e.message.starts_with("Step 1/6"))
        .unwrap();
    assert!(build_line < events.len() - 1);
}

#[tokio::test]
async fn base_domain_adds_routing_rule() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("index.html", "<h1>hi</h1>"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let server = ServerConfig {
        base_domain: Some(".example.com".to_string()),
        ..Default::default()
    };
    let orch = orchestrator(&fake, server);

    let (events, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(outcome.succeeded, "{events:#?}");
    let record = &outcome.deployments[0];
    assert!(
        record
            .labels
            .values()
            .any(|v| v == "Host(`demo.example.com`)")
    );
    let dockerfile = std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
    assert!(dockerfile.contains("nginx"));
}

#[tokio::test]
async fn missing_name_fails_before_engine_calls() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"domain": "x.test"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    let (events, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(!outcome.succeeded);
    assert_eq!(events.len(), 1);
    single_error(&events);
    assert!(fake.builds().is_empty());
    assert!(fake.networks().is_empty());
}

#[tokio::test]
async fn missing_manifest_is_a_config_error() {
    let dir = support::project_dir(&[("Dockerfile", "FROM alpine\n")]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    let (events, _) = run(&orch, DeployRequest::new("admin", dir.path())).await;
    let error = single_error(&events);
    assert!(error.message.contains("exoframe.json"));
}

#[tokio::test]
async fn nothing_matches_gives_template_not_found() {
    let dir = support::project_dir(&[("exoframe.json", r#"{"name": "demo"}"#)]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    let (events, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(!outcome.succeeded);
    let error = single_error(&events);
    assert!(error.message.contains("no deployment template"));
}

#[tokio::test]
async fn unknown_explicit_template_is_not_found_even_if_another_matches() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo", "template": "rails"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    let (events, _) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    let error = single_error(&events);
    assert!(error.message.contains("rails"));
    assert!(fake.builds().is_empty());
}

#[tokio::test]
async fn build_failure_ends_with_one_error_carrying_the_log() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("Dockerfile", "FROM nowhere\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    fake.script_build(&[
        r#"{"stream":"Step 1/1 : FROM nowhere\n"}"#,
        r#"{"error":"pull access denied for nowhere"}"#,
    ]);
    let orch = orchestrator(&fake, ServerConfig::default());

    let (events, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(!outcome.succeeded);
    let error = single_error(&events);
    assert!(error.message.contains("pull access denied"));
    assert_eq!(
        error.log.as_deref(),
        Some(
            &[
                "Step 1/1 : FROM nowhere\n".to_string(),
                "pull access denied for nowhere".to_string(),
            ][..]
        )
    );
    assert!(fake.containers().is_empty());
}

#[tokio::test]
async fn image_project_pulls_missing_image() {
    let dir = support::project_dir(&[(
        "exoframe.json",
        r#"{"name": "web", "image": "nginx:alpine", "restart": "always"}"#,
    )]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    let (_, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(outcome.succeeded);
    assert_eq!(fake.pulls(), vec!["nginx:alpine".to_string()]);
    assert!(fake.builds().is_empty());
    let container = fake.container_named(&outcome.deployments[0].name).unwrap();
    assert_eq!(container.image, "nginx:alpine");
}

#[tokio::test]
async fn image_file_is_loaded_instead_of_pulled() {
    let dir = support::project_dir(&[
        (
            "exoframe.json",
            r#"{"name": "web", "image": "web:local", "imageFile": "web.tar"}"#,
        ),
        ("web.tar", "not really a tarball"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    let (_, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(outcome.succeeded);
    assert_eq!(fake.loads(), 1);
    assert!(fake.pulls().is_empty());
}

async fn update_flow(project_dir: &Path, fake: &Arc<FakeRuntime>) -> CleanupOutcome {
    let orch = orchestrator(fake, fast_server());
    let (_, first) = run(&orch, DeployRequest::new("admin", project_dir)).await;
    assert!(first.succeeded);

    let request = DeployRequest::new("admin", project_dir).updating();
    let (_, second) = run(&orch, request).await;
    assert!(second.succeeded);
    second.cleanup.unwrap().await.unwrap()
}

#[tokio::test]
async fn update_retires_previous_generation() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());

    let outcome = update_flow(dir.path(), &fake).await;

    assert!(matches!(outcome, CleanupOutcome::Done { .. }));
    assert_eq!(fake.containers().len(), 1);
    assert_eq!(fake.removed().len(), 1);
}

#[tokio::test]
async fn update_keeps_old_generation_while_replacement_is_not_up() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, fast_server());
    let (_, first) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    fake.start_as("restarting", "Restarting (1) 1 second ago");
    let (_, second) = run(&orch, DeployRequest::new("admin", dir.path()).updating()).await;
    let outcome = second.cleanup.unwrap().await.unwrap();

    assert!(matches!(
        outcome,
        CleanupOutcome::Abandoned { attempts: 3, .. }
    ));
    assert!(fake.container_named(&first.deployments[0].name).is_some());
}

#[tokio::test]
async fn concurrent_deploys_of_one_project_both_finish() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    let (a, b) = tokio::join!(
        run(&orch, DeployRequest::new("admin", dir.path())),
        run(&orch, DeployRequest::new("admin", dir.path())),
    );

    assert!(a.1.succeeded && b.1.succeeded);
    assert_eq!(fake.containers().len(), 2);
}

#[tokio::test]
async fn concurrent_updates_leave_one_generation_running() {
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, fast_server());
    let (_, initial) = run(&orch, DeployRequest::new("admin", dir.path())).await;
    assert!(initial.succeeded);

    let (a, b) = tokio::join!(
        run(&orch, DeployRequest::new("admin", dir.path()).updating()),
        run(&orch, DeployRequest::new("admin", dir.path()).updating()),
    );
    let (a, b) = (a.1, b.1);
    assert!(a.succeeded && b.succeeded);
    let cleanups = (a.cleanup.unwrap().await.unwrap(), b.cleanup.unwrap().await.unwrap());
    assert!(matches!(cleanups.0, CleanupOutcome::Done { .. }));
    assert!(matches!(cleanups.1, CleanupOutcome::Done { .. }));

    let live: Vec<String> = fake
        .containers()
        .into_iter()
        .filter(|c| c.state == "running")
        .map(|c| c.name)
        .collect();
    assert_eq!(live.len(), 1, "{live:?}");
    let newest = [&a.deployments[0].name, &b.deployments[0].name];
    assert!(newest.contains(&&live[0]));
    assert!(fake.container_named(&initial.deployments[0].name).is_none());
}

#[tokio::test]
async fn proxy_is_bootstrapped_before_deploying() {
    let config_dir = tempfile::tempdir().unwrap();
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    let orch = orchestrator(&fake, ServerConfig::default());

    assert_eq!(
        orch.bootstrap_proxy(config_dir.path()).await,
        Some(ProxyOutcome::Created)
    );
    let (_, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(outcome.succeeded);
    let proxy = fake.container_named("exoframe-traefik").unwrap();
    assert_eq!(proxy.state, "running");
    assert!(config_dir.path().join("traefik").join("traefik.yml").is_file());
}

#[tokio::test]
async fn failed_proxy_bootstrap_does_not_block_deploys() {
    let config_dir = tempfile::tempdir().unwrap();
    let dir = support::project_dir(&[
        ("exoframe.json", r#"{"name": "demo"}"#),
        ("Dockerfile", "FROM alpine\n"),
    ]);
    let fake = Arc::new(FakeRuntime::new());
    fake.fail_pulls();
    let orch = orchestrator(&fake, ServerConfig::default());

    assert_eq!(orch.bootstrap_proxy(config_dir.path()).await, None);
    let (_, outcome) = run(&orch, DeployRequest::new("admin", dir.path())).await;

    assert!(outcome.succeeded);
    assert!(fake.container_named("exoframe-traefik").is_none());
}
