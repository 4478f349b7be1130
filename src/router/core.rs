use super::transport::{self, RouteNode};
use super::{normalize_path, MethodTable, ParamVec, PathPart, RegistrationError};
use crate::map::{MapError, ViewMap};
use crate::route::Route;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of resolving a request path.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A route matched. `params` are the captured path parameters in order.
    Found { route: Arc<Route>, params: ParamVec },
    /// The path is registered, but not for this method.
    MethodNotAllowed,
    NotFound,
}

/// Route tables for every method plus the WebSocket table.
///
/// Direct routes live under their full normalised path. Routes with path
/// parameters live in the transport trie, whose root nodes share the same
/// per-method maps. `all_paths` records every registered path (parameterised
/// ones by their template) to tell 404 from 405.
pub struct RouteTable {
    get: ViewMap<RouteNode>,
    post: ViewMap<RouteNode>,
    put: ViewMap<RouteNode>,
    patch: ViewMap<RouteNode>,
    delete: ViewMap<RouteNode>,
    options: ViewMap<RouteNode>,
    websocket: ViewMap<RouteNode>,
    all_paths: ViewMap<()>,
    has_path_params: bool,
}

impl RouteTable {
    pub fn new(capacity: usize) -> Result<Self, MapError> {
        Ok(Self {
            get: ViewMap::new(capacity)?,
            post: ViewMap::new(capacity)?,
            put: ViewMap::new(capacity)?,
            patch: ViewMap::new(capacity)?,
            delete: ViewMap::new(capacity)?,
            options: ViewMap::new(capacity)?,
            websocket: ViewMap::new(capacity)?,
            all_paths: ViewMap::new(capacity)?,
            has_path_params: false,
        })
    }

    /// True once any route with path parameters is registered.
    #[must_use]
    pub fn has_path_params(&self) -> bool {
        self.has_path_params
    }

    fn table(&self, which: MethodTable) -> &ViewMap<RouteNode> {
        match which {
            MethodTable::Get => &self.get,
            MethodTable::Post => &self.post,
            MethodTable::Put => &self.put,
            MethodTable::Patch => &self.patch,
            MethodTable::Delete => &self.delete,
            MethodTable::Options => &self.options,
            MethodTable::WebSocket => &self.websocket,
        }
    }

    fn table_mut(&mut self, which: MethodTable) -> &mut ViewMap<RouteNode> {
        match which {
            MethodTable::Get => &mut self.get,
            MethodTable::Post => &mut self.post,
            MethodTable::Put => &mut self.put,
            MethodTable::Patch => &mut self.patch,
            MethodTable::Delete => &mut self.delete,
            MethodTable::Options => &mut self.options,
            MethodTable::WebSocket => &mut self.websocket,
        }
    }

    /// Register `route` under `path`.
    ///
    /// With `parts` the route goes into the transport trie; otherwise it is
    /// stored under the normalised path. Registering the same path twice
    /// replaces the earlier route.
    pub fn insert(
        &mut self,
        which: MethodTable,
        path: &str,
        parts: Option<&[PathPart]>,
        route: Arc<Route>,
    ) -> Result<(), RegistrationError> {
        let path = normalize_path(path);
        let replaced = match parts {
            Some(parts) if parts.iter().any(|p| matches!(p, PathPart::Param)) => {
                let replaced = transport::insert(self.table_mut(which), path, parts, route)?;
                self.has_path_params = true;
                replaced
            }
            _ => {
                let node = self
                    .table_mut(which)
                    .get_or_insert_with(path, RouteNode::default)?;
                node.route.replace(route)
            }
        };
        if replaced.is_some() {
            warn!(path = %path, table = ?which, "route registered twice, replacing");
        }
        self.all_paths.set(path, ())?;
        debug!(path = %path, table = ?which, "route registered");
        Ok(())
    }

    /// Resolve `path` in the table for `which`.
    ///
    /// A direct hit wins. Otherwise, if any parameterised route exists, the
    /// transport trie is walked. On a miss, a path registered under another
    /// method is a 405; WebSocket lookups never report 405.
    #[must_use]
    pub fn resolve(&self, which: MethodTable, path: &str) -> Resolution {
        let path = normalize_path(path);
        let table = self.table(which);

        if let Some(route) = table.get(path).and_then(RouteNode::route) {
            return Resolution::Found {
                route: Arc::clone(route),
                params: ParamVec::new(),
            };
        }

        if self.has_path_params {
            if let Some((route, params)) = transport::walk(table, path) {
                return Resolution::Found { route, params };
            }
        }

        if which != MethodTable::WebSocket && self.all_paths.contains_key(path) {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }

    /// Every registered path, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.all_paths.keys()
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("paths", &self.all_paths.len())
            .field("has_path_params", &self.has_path_params)
            .finish_non_exhaustive()
    }
}
