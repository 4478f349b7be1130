//! Lifespan protocol: hooks run once per event and each event is acknowledged.

mod common;

use common::harness::run;
use common::scopes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use viewcore::app::App;
use viewcore::config::AppConfig;
use viewcore::protocol::Outbound;
use viewcore::DispatchError;

#[tokio::test]
async fn test_startup_and_shutdown_hooks() {
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let mut app = App::new(&AppConfig::default()).unwrap();
    let counter = Arc::clone(&started);
    app.on_startup(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { anyhow::Ok(()) }
    });
    let counter = Arc::clone(&stopped);
    app.on_cleanup(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { anyhow::Ok(()) }
    });
    let app = Arc::new(app);

    let (sent, outcome) = run(
        &app,
        scopes::lifespan(),
        [scopes::message("lifespan.startup"), scopes::message("lifespan.shutdown")],
    )
    .await;
    outcome.unwrap();
    assert_eq!(
        sent.messages(),
        vec![Outbound::LifespanStartupComplete, Outbound::LifespanShutdownComplete]
    );
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_hooks_still_acknowledges() {
    let app = Arc::new(App::new(&AppConfig::default()).unwrap());
    let (sent, outcome) = run(
        &app,
        scopes::lifespan(),
        [scopes::message("lifespan.startup"), scopes::message("lifespan.shutdown")],
    )
    .await;
    outcome.unwrap();
    assert_eq!(sent.types(), vec!["lifespan.startup.complete", "lifespan.shutdown.complete"]);
}

#[tokio::test]
async fn test_failing_startup_hook_fails_the_task() {
    let mut app = App::new(&AppConfig::default()).unwrap();
    app.on_startup(|| async { Err(anyhow::anyhow!("database unreachable")) });
    let app = Arc::new(app);

    let (sent, outcome) = run(&app, scopes::lifespan(), [scopes::message("lifespan.startup")]).await;
    let err = outcome.unwrap_err();
    assert!(matches!(err, DispatchError::Task(_)));
    assert!(err.to_string().contains("database unreachable"));
    assert!(sent.messages().is_empty());
}

#[tokio::test]
async fn test_unexpected_event_is_a_protocol_error() {
    let app = Arc::new(App::new(&AppConfig::default()).unwrap());
    let (_, outcome) = run(&app, scopes::lifespan(), [scopes::message("http.request")]).await;
    assert!(matches!(outcome, Err(DispatchError::Protocol(_))));
}
