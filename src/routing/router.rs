//! Ordered route table
//!
//! Routes are tried in registration order and the first pattern that
//! matches wins. Overlapping patterns must therefore be registered most
//! specific first; there is no best-match disambiguation.

use std::collections::BTreeMap;
use std::fmt;

use regex::{Captures, Regex};
use tracing::{debug, trace};

use super::uri::Params;
use crate::error::{NavError, Result};
use crate::item::Navigation;

/// A route handler, invoked with the router context and the matched request
pub type Handler<C> = fn(&C, &NavRequest<'_>) -> Result<Navigation>;

/// A compiled pattern bound to its handler
pub struct RoutePattern<C> {
    regex: Regex,
    handler: Handler<C>,
    /// Registration index; lower is tried first
    priority: usize,
}

impl<C> RoutePattern<C> {
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl<C> fmt::Debug for RoutePattern<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutePattern")
            .field("pattern", &self.regex.as_str())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Named captures of a matched route
///
/// Every named group of the pattern has an entry. Groups that did not
/// participate in the match, or matched the empty string, are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    values: BTreeMap<String, Option<String>>,
}

impl RouteMatch {
    fn from_captures(regex: &Regex, caps: &Captures<'_>) -> Self {
        let values = regex
            .capture_names()
            .flatten()
            .map(|name| {
                let value = caps
                    .name(name)
                    .map(|m| m.as_str())
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                (name.to_string(), value)
            })
            .collect();
        Self { values }
    }

    /// Value of an optional group
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_deref())
    }

    /// Value of a group the handler cannot do without
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| NavError::MissingParameter(name.to_string()))
    }
}

/// A request as seen by a handler
#[derive(Debug, Clone)]
pub struct NavRequest<'a> {
    pub path: &'a str,
    pub params: &'a Params,
    pub route: RouteMatch,
}

/// Registration-ordered list of routes
pub struct Router<C> {
    routes: Vec<RoutePattern<C>>,
}

impl<C> Router<C> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Append a route. The pattern is compiled here, once.
    pub fn register(&mut self, pattern: &str, handler: Handler<C>) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|source| NavError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let priority = self.routes.len();
        trace!(pattern = pattern, priority = priority, "Registered route");
        self.routes.push(RoutePattern {
            regex,
            handler,
            priority,
        });
        Ok(())
    }

    /// Find the first route matching `path`
    pub fn resolve(&self, path: &str) -> Result<(&RoutePattern<C>, RouteMatch)> {
        // Linear scan; fine for a few dozen routes
        for route in &self.routes {
            if let Some(caps) = route.regex.captures(path) {
                let matched = RouteMatch::from_captures(&route.regex, &caps);
                debug!(
                    path = path,
                    pattern = route.pattern(),
                    priority = route.priority,
                    "Route matched"
                );
                return Ok((route, matched));
            }
        }
        Err(NavError::RouteNotFound(path.to_string()))
    }

    /// Resolve `path` and run the bound handler
    pub fn dispatch(&self, ctx: &C, path: &str, params: &Params) -> Result<Navigation> {
        let (route, matched) = self.resolve(path)?;
        let request = NavRequest {
            path,
            params,
            route: matched,
        };
        (route.handler)(ctx, &request)
    }

    /// All routes in priority order
    pub fn routes(&self) -> &[RoutePattern<C>] {
        &self.routes
    }
}

impl<C> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}
