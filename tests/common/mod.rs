#![allow(dead_code)]

pub mod transport {
    use futures_util::future::BoxFuture;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use viewcore::protocol::{Outbound, Receiver, Sender};
    use viewcore::value::Value;

    /// Records every message the app sends.
    #[derive(Clone, Default)]
    pub struct Recorder {
        sent: Arc<Mutex<Vec<Outbound>>>,
    }

    impl Recorder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn messages(&self) -> Vec<Outbound> {
            self.sent.lock().clone()
        }

        pub fn types(&self) -> Vec<&'static str> {
            self.sent.lock().iter().map(Outbound::message_type).collect()
        }

        /// Status of the last response start.
        pub fn status(&self) -> Option<u16> {
            self.sent.lock().iter().rev().find_map(|m| match m {
                Outbound::ResponseStart { status, .. } => Some(*status),
                _ => None,
            })
        }

        /// Body of the last response, as text.
        pub fn body(&self) -> String {
            self.sent
                .lock()
                .iter()
                .rev()
                .find_map(|m| match m {
                    Outbound::ResponseBody { body, .. } => Some(String::from_utf8_lossy(body).into_owned()),
                    _ => None,
                })
                .unwrap_or_default()
        }

        pub fn header(&self, name: &str) -> Option<String> {
            self.sent.lock().iter().rev().find_map(|m| match m {
                Outbound::ResponseStart { headers, .. } => headers
                    .iter()
                    .find(|(k, _)| k.as_slice() == name.as_bytes())
                    .map(|(_, v)| String::from_utf8_lossy(v).into_owned()),
                _ => None,
            })
        }

        pub fn clear(&self) {
            self.sent.lock().clear();
        }

        pub fn sender(&self) -> Arc<dyn Sender> {
            Arc::new(self.clone())
        }
    }

    impl Sender for Recorder {
        fn send(&self, message: Outbound) -> BoxFuture<'static, anyhow::Result<()>> {
            self.sent.lock().push(message);
            Box::pin(async { Ok(()) })
        }
    }

    /// Replays a fixed list of inbound events.
    #[derive(Clone, Default)]
    pub struct Script {
        events: Arc<Mutex<VecDeque<Value>>>,
    }

    impl Script {
        pub fn new(events: impl IntoIterator<Item = Value>) -> Self {
            Self {
                events: Arc::new(Mutex::new(events.into_iter().collect())),
            }
        }

        pub fn remaining(&self) -> usize {
            self.events.lock().len()
        }

        pub fn receiver(&self) -> Arc<dyn Receiver> {
            Arc::new(self.clone())
        }
    }

    impl Receiver for Script {
        fn receive(&self) -> BoxFuture<'static, anyhow::Result<Value>> {
            let next = self.events.lock().pop_front();
            Box::pin(async move { next.ok_or_else(|| anyhow::anyhow!("no more scripted events")) })
        }
    }
}

pub mod scopes {
    use viewcore::value::{Dict, Value};

    fn event(kind: &str) -> Dict {
        let mut map = Dict::new();
        map.insert("type".into(), Value::from(kind));
        map
    }

    fn connection(kind: &str, path: &str, query: &str, headers: &[(&str, &str)]) -> Dict {
        let mut scope = event(kind);
        scope.insert("scheme".into(), Value::from("http"));
        scope.insert("http_version".into(), Value::from("1.1"));
        scope.insert("path".into(), Value::from(path));
        scope.insert("query_string".into(), Value::Bytes(query.as_bytes().to_vec()));
        scope.insert(
            "headers".into(),
            Value::List(
                headers
                    .iter()
                    .map(|(k, v)| {
                        Value::List(vec![
                            Value::Bytes(k.as_bytes().to_vec()),
                            Value::Bytes(v.as_bytes().to_vec()),
                        ])
                    })
                    .collect(),
            ),
        );
        scope.insert(
            "client".into(),
            Value::List(vec![Value::from("127.0.0.1"), Value::Int(50123)]),
        );
        scope.insert("server".into(), Value::Null);
        scope
    }

    pub fn http(method: &str, path: &str) -> Value {
        http_with(method, path, "", &[])
    }

    pub fn http_with(method: &str, path: &str, query: &str, headers: &[(&str, &str)]) -> Value {
        let mut scope = connection("http", path, query, headers);
        scope.insert("method".into(), Value::from(method));
        Value::Dict(scope)
    }

    pub fn websocket(path: &str) -> Value {
        Value::Dict(connection("websocket", path, "", &[]))
    }

    pub fn lifespan() -> Value {
        Value::Dict(event("lifespan"))
    }

    /// An `http.request` chunk.
    pub fn body(chunk: &str, more_body: bool) -> Value {
        let mut map = event("http.request");
        map.insert("body".into(), Value::Bytes(chunk.as_bytes().to_vec()));
        map.insert("more_body".into(), Value::Bool(more_body));
        Value::Dict(map)
    }

    pub fn message(kind: &str) -> Value {
        Value::Dict(event(kind))
    }

    pub fn ws_text(text: &str) -> Value {
        let mut map = event("websocket.receive");
        map.insert("text".into(), Value::from(text));
        Value::Dict(map)
    }
}

pub mod harness {
    use super::transport::{Recorder, Script};
    use std::sync::Arc;
    use viewcore::app::App;
    use viewcore::value::Value;
    use viewcore::DispatchError;

    /// Run one connection to completion and return what was sent.
    pub async fn run(
        app: &Arc<App>,
        scope: Value,
        events: impl IntoIterator<Item = Value>,
    ) -> (Recorder, Result<(), DispatchError>) {
        let recorder = Recorder::new();
        let script = Script::new(events);
        let outcome = app.handle(scope, script.receiver(), recorder.sender()).await;
        (recorder, outcome)
    }
}
