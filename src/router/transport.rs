//! Transport trie for routes with path parameters.
//!
//! Each node stands for one path segment. Literal children live in a
//! [`ViewMap`] keyed by `"/segment"`; the single parameter branch is taken
//! when no literal child matches. A node carries a route only when a
//! registration ends on it; nodes without one are pure transports.
//!
//! Lookup for `GET /app/12345/index` with parts `["app", {param}, "index"]`:
//!
//! - `table["/app"]` is the root node.
//! - `"/12345"` is not a literal child, so the parameter branch is taken and
//!   `"12345"` is captured.
//! - `"/index"` is a literal child of the parameter node and carries the route.
//!
//! Literal children always win over the parameter branch, and a failed match
//! never backtracks into the parameter branch. An empty segment (`/app//index`)
//! is never captured as a parameter value, so such a path does not match.

use super::{ParamVec, PathPart, RegistrationError};
use crate::map::{MapError, ViewMap};
use crate::route::Route;
use std::sync::Arc;

/// Initial capacity of a node's literal-children map.
const CHILD_CAPACITY: usize = 2;

/// One segment of the route table.
#[derive(Default)]
pub struct RouteNode {
    pub(crate) route: Option<Arc<Route>>,
    children: Option<ViewMap<RouteNode>>,
    param: Option<Box<RouteNode>>,
}

impl RouteNode {
    /// The route registered at this node, if it is not a bare transport.
    #[must_use]
    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    #[must_use]
    pub fn has_param(&self) -> bool {
        self.param.is_some()
    }

    fn literal(&self, key: &str) -> Option<&RouteNode> {
        self.children.as_ref()?.get(key)
    }

    fn literal_mut(&mut self, key: &str) -> Result<&mut RouteNode, MapError> {
        let children = match self.children.take() {
            Some(children) => children,
            None => ViewMap::new(CHILD_CAPACITY)?,
        };
        self.children
            .insert(children)
            .get_or_insert_with(key, RouteNode::default)
    }
}

impl std::fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteNode")
            .field("route", &self.route.is_some())
            .field(
                "children",
                &self
                    .children
                    .as_ref()
                    .map(|c| c.keys().collect::<Vec<_>>())
                    .unwrap_or_default(),
            )
            .field("param", &self.param)
            .finish()
    }
}

fn segment_key(segment: &str) -> String {
    let mut key = String::with_capacity(segment.len() + 1);
    key.push('/');
    key.push_str(segment);
    key
}

/// Thread `parts` through `table`, creating transport nodes as needed, and
/// attach `route` to the last one. Returns the route it displaced, if any.
pub(crate) fn insert(
    table: &mut ViewMap<RouteNode>,
    path: &str,
    parts: &[PathPart],
    route: Arc<Route>,
) -> Result<Option<Arc<Route>>, RegistrationError> {
    let (first, rest) = match parts.split_first() {
        Some((PathPart::Literal(first), rest)) => (first, rest),
        Some((PathPart::Param, _)) => return Err(RegistrationError::LeadingParameter(path.to_owned())),
        None => return Err(RegistrationError::EmptyParts(path.to_owned())),
    };

    let mut node = table.get_or_insert_with(&segment_key(first), RouteNode::default)?;
    for part in rest {
        node = match part {
            PathPart::Literal(segment) => node.literal_mut(&segment_key(segment))?,
            PathPart::Param => &mut **node.param.get_or_insert_with(Box::default),
        };
    }
    Ok(node.route.replace(route))
}

/// Walk `path` through the trie rooted in `table`.
///
/// Returns the route at the final node together with the captured parameter
/// values, or `None` when a segment has neither a literal child nor a
/// parameter branch, when an empty segment would be captured, or when the
/// final node carries no route.
pub(crate) fn walk(table: &ViewMap<RouteNode>, path: &str) -> Option<(Arc<Route>, ParamVec)> {
    let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');
    let mut key = String::with_capacity(path.len());

    key.push('/');
    key.push_str(segments.next()?);
    let mut node = table.get(&key)?;
    let mut params = ParamVec::new();

    for segment in segments {
        key.clear();
        key.push('/');
        key.push_str(segment);
        node = match node.literal(&key) {
            Some(child) => child,
            None => {
                if segment.is_empty() {
                    return None;
                }
                let branch = node.param.as_deref()?;
                params.push(segment.to_owned());
                branch
            }
        };
    }

    node.route.clone().map(|route| (route, params))
}
