//! WebSocket routes end to end: handshake, echo, handler failure and
//! rejection of unknown paths.

mod common;

use common::harness::run;
use common::scopes;
use std::sync::Arc;
use viewcore::app::App;
use viewcore::config::AppConfig;
use viewcore::protocol::{Outbound, Payload};
use viewcore::results::HandlerResult;
use viewcore::route::{handler, Args, RouteInput, RouteSpec};
use viewcore::websocket::NORMAL_CLOSURE;

fn echo_app(dev: bool) -> Arc<App> {
    let mut app = App::new(&AppConfig {
        dev,
        ..AppConfig::default()
    })
    .unwrap();
    app.websocket(
        "/echo",
        RouteSpec::new(handler(|args: Args| async move {
            let ws = args.websocket().cloned().ok_or_else(|| anyhow::anyhow!("no websocket"))?;
            ws.accept().await?;
            while let Some(payload) = ws.receive().await? {
                if let Payload::Text(text) = payload {
                    ws.send(format!("echo: {text}")).await?;
                }
            }
            anyhow::Ok(HandlerResult::Empty)
        }))
        .input(RouteInput::WebSocket),
    )
    .unwrap();
    app.websocket(
        "/hello",
        RouteSpec::new(handler(|args: Args| async move {
            let ws = args.websocket().cloned().ok_or_else(|| anyhow::anyhow!("no websocket"))?;
            ws.accept().await?;
            anyhow::Ok(HandlerResult::from("welcome"))
        }))
        .input(RouteInput::WebSocket),
    )
    .unwrap();
    app.websocket(
        "/broken",
        RouteSpec::new(handler(|args: Args| async move {
            let ws = args.websocket().cloned().ok_or_else(|| anyhow::anyhow!("no websocket"))?;
            ws.accept().await?;
            Err(anyhow::anyhow!("socket handler exploded"))
        }))
        .input(RouteInput::WebSocket),
    )
    .unwrap();
    app.websocket(
        "/polite",
        RouteSpec::new(handler(|args: Args| async move {
            let ws = args.websocket().cloned().ok_or_else(|| anyhow::anyhow!("no websocket"))?;
            ws.accept().await?;
            ws.close(NORMAL_CLOSURE, Some("bye".into())).await?;
            anyhow::Ok(HandlerResult::Empty)
        }))
        .input(RouteInput::WebSocket),
    )
    .unwrap();
    Arc::new(app)
}

#[tokio::test]
async fn test_echo_until_disconnect() {
    let app = echo_app(false);
    let (sent, outcome) = run(
        &app,
        scopes::websocket("/echo"),
        [
            scopes::message("websocket.connect"),
            scopes::ws_text("hi"),
            scopes::ws_text("there"),
            scopes::message("websocket.disconnect"),
        ],
    )
    .await;
    outcome.unwrap();
    assert_eq!(
        sent.messages(),
        vec![
            Outbound::WebSocketAccept,
            Outbound::WebSocketSend(Payload::Text("echo: hi".into())),
            Outbound::WebSocketSend(Payload::Text("echo: there".into())),
        ]
    );
}

#[tokio::test]
async fn test_returned_body_is_sent_as_frame() {
    let app = echo_app(false);
    let (sent, outcome) = run(&app, scopes::websocket("/hello"), [scopes::message("websocket.connect")]).await;
    outcome.unwrap();
    assert_eq!(
        sent.messages(),
        vec![
            Outbound::WebSocketAccept,
            Outbound::WebSocketSend(Payload::Text("welcome".into())),
        ]
    );
}

#[tokio::test]
async fn test_handler_failure_closes_with_1006() {
    let app = echo_app(false);
    let (sent, outcome) = run(&app, scopes::websocket("/broken"), [scopes::message("websocket.connect")]).await;
    outcome.unwrap();
    assert_eq!(
        sent.messages().last(),
        Some(&Outbound::WebSocketClose {
            code: 1006,
            reason: None
        })
    );

    let app = echo_app(true);
    let (sent, _) = run(&app, scopes::websocket("/broken"), [scopes::message("websocket.connect")]).await;
    assert_eq!(
        sent.messages().last(),
        Some(&Outbound::WebSocketClose {
            code: 1006,
            reason: Some("socket handler exploded".into())
        })
    );
}

#[tokio::test]
async fn test_handler_close() {
    let app = echo_app(false);
    let (sent, outcome) = run(&app, scopes::websocket("/polite"), [scopes::message("websocket.connect")]).await;
    outcome.unwrap();
    assert_eq!(
        sent.messages().last(),
        Some(&Outbound::WebSocketClose {
            code: 1000,
            reason: Some("bye".into())
        })
    );
}

#[tokio::test]
async fn test_unknown_path_rejects_handshake() {
    let app = echo_app(false);
    let (sent, outcome) = run(&app, scopes::websocket("/nope"), []).await;
    outcome.unwrap();
    assert_eq!(
        sent.types(),
        vec!["websocket.http.response.start", "websocket.http.response.body"]
    );
    assert_eq!(sent.status(), Some(404));
    assert_eq!(sent.body(), "Not Found");
}

#[tokio::test]
async fn test_wrong_first_event_fails_handler() {
    let app = echo_app(false);
    let (sent, _) = run(&app, scopes::websocket("/echo"), [scopes::ws_text("too early")]).await;
    assert_eq!(
        sent.messages(),
        vec![Outbound::WebSocketClose {
            code: 1006,
            reason: None
        }]
    );
}
