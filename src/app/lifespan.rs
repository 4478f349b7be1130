//! Lifespan protocol: run the startup hook on `lifespan.startup` and the
//! cleanup hook on `lifespan.shutdown`, acknowledging each.

use super::dispatch::{defer, received, sent, Flow};
use super::{App, Hook};
use crate::awaitable::{CallbackError, Callbacks, Task, TaskError};
use crate::protocol::{message_type, Outbound, ProtocolError, Receiver, Sender};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

pub(super) fn start(
    app: &Arc<App>,
    task: &mut Task<Flow>,
    receive: Arc<dyn Receiver>,
    send: Arc<dyn Sender>,
) -> Result<(), TaskError> {
    let app = Arc::clone(app);
    task.add_await(received(&receive), next_event(app, receive, send))
}

fn next_event(app: Arc<App>, receive: Arc<dyn Receiver>, send: Arc<dyn Sender>) -> Callbacks<Flow> {
    Callbacks::then(move |task, flow| on_event(task, flow, app, receive, send))
}

fn run_hook(hook: Option<Hook>, stage: &'static str) -> impl Future<Output = Result<Flow, TaskError>> + Send + 'static {
    async move {
        if let Some(hook) = hook {
            hook().await.map_err(|e| {
                error!(stage, error = %e, "lifespan hook failed");
                TaskError::failed(e)
            })?;
        }
        info!(stage, "lifespan hook complete");
        Ok(Flow::Done)
    }
}

fn on_event(
    task: &mut Task<Flow>,
    flow: Flow,
    app: Arc<App>,
    receive: Arc<dyn Receiver>,
    send: Arc<dyn Sender>,
) -> Result<(), CallbackError> {
    let event = flow.into_received()?;
    match message_type(&event).map_err(defer)? {
        "lifespan.startup" => {
            task.add_await(run_hook(app.startup.clone(), "startup"), Callbacks::none())?;
            task.add_await(sent(&send, Outbound::LifespanStartupComplete), Callbacks::none())?;
            task.add_await(received(&receive), next_event(app, Arc::clone(&receive), send))?;
        }
        "lifespan.shutdown" => {
            task.add_await(run_hook(app.cleanup.clone(), "cleanup"), Callbacks::none())?;
            task.add_await(sent(&send, Outbound::LifespanShutdownComplete), Callbacks::none())?;
        }
        other => {
            return Err(defer(ProtocolError::UnexpectedMessage {
                expected: "lifespan.startup",
                got: other.to_owned(),
            }))
        }
    }
    Ok(())
}
