use crate::context::Context;
use crate::results::HandlerResult;
use crate::value::Value;
use crate::websocket::WebSocket;
use futures::future::BoxFuture;
use smallvec::SmallVec;
use std::future::Future;
use std::sync::Arc;

/// Inline capacity for handler arguments.
pub const MAX_INLINE_ARGS: usize = 4;

/// One positional handler argument.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A path parameter, query value or body value after casting.
    Value(Value),
    Context(Arc<Context>),
    WebSocket(WebSocket),
}

/// Positional handler arguments: path parameters first, then declared inputs.
#[derive(Debug, Clone, Default)]
pub struct Args {
    items: SmallVec<[Arg; MAX_INLINE_ARGS]>,
}

impl Args {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, arg: Arg) {
        self.items.push(arg);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.items.get(index)
    }

    /// The value at `index`, if that argument is a plain value.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.items.get(index)? {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The value at `index` as a string slice.
    #[must_use]
    pub fn str(&self, index: usize) -> Option<&str> {
        self.value(index)?.as_str()
    }

    /// First request-context argument.
    #[must_use]
    pub fn context(&self) -> Option<&Arc<Context>> {
        self.items.iter().find_map(|arg| match arg {
            Arg::Context(ctx) => Some(ctx),
            _ => None,
        })
    }

    /// First WebSocket argument.
    #[must_use]
    pub fn websocket(&self) -> Option<&WebSocket> {
        self.items.iter().find_map(|arg| match arg {
            Arg::WebSocket(ws) => Some(ws),
            _ => None,
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.items.iter()
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self {
            items: values.into_iter().map(Arg::Value).collect(),
        }
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = smallvec::IntoIter<[Arg; MAX_INLINE_ARGS]>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A route, error or lifecycle handler.
pub trait Handler: Send + Sync {
    fn call(&self, args: Args) -> BoxFuture<'static, anyhow::Result<HandlerResult>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<HandlerResult>> + Send + 'static,
{
    fn call(&self, args: Args) -> BoxFuture<'static, anyhow::Result<HandlerResult>> {
        Box::pin(self(args))
    }
}

/// Box a closure as a shared [`Handler`].
pub fn handler<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<HandlerResult>> + Send + 'static,
{
    Arc::new(f)
}
