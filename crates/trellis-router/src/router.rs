//! Section tree construction and resolution.
//!
//! The router is built once from `(method, pattern) -> handler` routes and
//! is immutable afterwards; resolution is read-only and lock-free.
//!
//! Resolution descends every viable branch in parallel, keeping a single
//! best candidate ordered by `(level, weight)`: a deeper match always beats
//! a shallower one, and among matches at the same depth the more specific
//! variant wins (static > typed-format > named-regex > regex > named >
//! match-all).

use std::collections::HashMap;

use http::Method;
use trellis_core::PathParams;

use crate::section::{classify, PatternError, SectionKind};

/// The nine standard HTTP methods routes may bind to.
pub const ALLOWED_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// Errors raised while building a router.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RouterBuildError {
    /// The same (pattern, method) pair was registered twice.
    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute {
        /// The conflicting pattern.
        pattern: String,
        /// The conflicting method.
        method: Method,
    },

    /// A pattern segment failed to classify.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The method is not one of the nine standard methods.
    #[error("http method '{method}' not allowed")]
    MethodNotAllowed {
        /// The offending method.
        method: Method,
    },

    /// The pattern is empty or missing its leading slash.
    #[error("invalid pattern '{pattern}': a leading '/' is required")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
    },
}

#[derive(Debug)]
struct Node<H> {
    level: usize,
    parent: Option<usize>,
    pattern: String,
    kind: SectionKind,
    children: Vec<usize>,
    handlers: Vec<(Method, H)>,
}

impl<H> Node<H> {
    fn handler(&self, method: &Method) -> Option<&H> {
        self.handlers
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, h)| h)
    }
}

/// A successful route resolution.
#[derive(Debug)]
pub struct ResolvedRoute<'a, H> {
    /// The handler bound to the matched (pattern, method).
    pub handler: &'a H,
    /// Parameters captured by named and named-regex sections.
    pub params: PathParams,
}

/// Builder accumulating routes before the tree is frozen.
pub struct RouterBuilder<H> {
    routes: Vec<(Method, String, H)>,
}

impl<H> Default for RouterBuilder<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> RouterBuilder<H> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    #[must_use]
    pub fn route(mut self, method: Method, pattern: impl Into<String>, handler: H) -> Self {
        self.routes.push((method, pattern.into(), handler));
        self
    }

    /// Builds the immutable section tree.
    ///
    /// # Errors
    ///
    /// Fails on duplicate (pattern, method) pairs, unrecognized pattern
    /// segments, invalid regexes, non-standard methods, and patterns
    /// missing their leading slash.
    pub fn build(self) -> Result<Router<H>, RouterBuildError> {
        let mut router = Router {
            nodes: vec![Node {
                level: 0,
                parent: None,
                pattern: "/".to_string(),
                kind: SectionKind::Root,
                children: Vec::new(),
                handlers: Vec::new(),
            }],
            route_count: 0,
        };
        for (method, pattern, handler) in self.routes {
            router.insert(method, &pattern, handler)?;
        }
        Ok(router)
    }
}

/// The immutable section tree.
#[derive(Debug)]
pub struct Router<H> {
    nodes: Vec<Node<H>>,
    route_count: usize,
}

impl<H> Router<H> {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RouterBuilder<H> {
        RouterBuilder::new()
    }

    /// Number of (method, pattern) routes registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// True if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }

    fn insert(&mut self, method: Method, pattern: &str, handler: H) -> Result<(), RouterBuildError> {
        if !ALLOWED_METHODS.contains(&method) {
            return Err(RouterBuildError::MethodNotAllowed { method });
        }

        let normalized = normalize(pattern);
        if normalized == "/" {
            return self.add_handler(0, method, handler, pattern);
        }
        let Some(rest) = normalized.strip_prefix('/') else {
            return Err(RouterBuildError::InvalidPattern {
                pattern: pattern.to_string(),
            });
        };

        let mut current = 0usize;
        for part in rest.split('/') {
            let existing = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].pattern == part);
            current = match existing {
                Some(child) => child,
                None => {
                    let kind = classify(part)?;
                    let idx = self.nodes.len();
                    let level = self.nodes[current].level + 1;
                    self.nodes.push(Node {
                        level,
                        parent: Some(current),
                        pattern: part.to_string(),
                        kind,
                        children: Vec::new(),
                        handlers: Vec::new(),
                    });
                    self.nodes[current].children.push(idx);
                    idx
                }
            };
        }
        self.add_handler(current, method, handler, pattern)
    }

    fn add_handler(
        &mut self,
        node: usize,
        method: Method,
        handler: H,
        pattern: &str,
    ) -> Result<(), RouterBuildError> {
        if self.nodes[node].handler(&method).is_some() {
            return Err(RouterBuildError::DuplicateRoute {
                pattern: pattern.to_string(),
                method,
            });
        }
        self.nodes[node].handlers.push((method, handler));
        self.route_count += 1;
        Ok(())
    }

    /// Resolves a method and raw request path to a handler.
    ///
    /// Returns `None` when nothing matches; a path that matches a pattern
    /// whose handler set lacks the method also resolves to `None` (the
    /// framework renders both as 404).
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<ResolvedRoute<'_, H>> {
        let path = normalize(path);
        if path.is_empty() || path == "/" {
            return self.nodes[0].handler(method).map(|handler| ResolvedRoute {
                handler,
                params: PathParams::new(),
            });
        }

        let rest = path.strip_prefix('/').unwrap_or(&path);
        let parts: Vec<&str> = rest.split('/').collect();

        let mut best: Option<usize> = None;
        let mut captures: HashMap<usize, (String, String)> = HashMap::new();
        for &child in &self.nodes[0].children {
            self.descend(child, 0, &parts, method, &mut captures, &mut best);
        }

        let terminal = best?;
        let mut params = PathParams::new();
        let mut cursor = Some(terminal);
        while let Some(idx) = cursor {
            if let Some((name, value)) = captures.get(&idx) {
                // Walk starts at the terminal, so the deepest capture of a
                // name wins.
                params.insert_if_absent(name.clone(), value.clone());
            }
            cursor = self.nodes[idx].parent;
        }

        self.nodes[terminal]
            .handler(method)
            .map(|handler| ResolvedRoute { handler, params })
    }

    fn descend(
        &self,
        node_idx: usize,
        i: usize,
        parts: &[&str],
        method: &Method,
        captures: &mut HashMap<usize, (String, String)>,
        best: &mut Option<usize>,
    ) {
        let node = &self.nodes[node_idx];
        let part = parts[i];
        let is_last = i == parts.len() - 1;

        if is_last && node.handler(method).is_some() && node.kind.accepts(&node.pattern, part) {
            if self.candidate_beats_best(node_idx, *best) {
                *best = Some(node_idx);
                if let Some((name, value)) = node.kind.capture(part) {
                    captures.insert(node_idx, (name.to_string(), value.to_string()));
                }
            }
        }

        let continues = !is_last
            && !node.children.is_empty()
            && !matches!(node.kind, SectionKind::EmptyFinal)
            && node.kind.accepts(&node.pattern, part);
        if continues {
            if let Some((name, value)) = node.kind.capture(part) {
                captures.insert(node_idx, (name.to_string(), value.to_string()));
            }
            for &child in &node.children {
                self.descend(child, i + 1, parts, method, captures, best);
            }
        }
    }

    fn candidate_beats_best(&self, candidate: usize, best: Option<usize>) -> bool {
        let Some(best) = best else {
            return true;
        };
        let c = &self.nodes[candidate];
        let b = &self.nodes[best];
        c.level > b.level || (c.level == b.level && c.kind.weight() > b.kind.weight())
    }
}

/// Collapses repeated slashes and trims surrounding whitespace.
fn normalize(path: &str) -> String {
    let mut out = path.trim().to_string();
    while out.contains("//") {
        out = out.replace("//", "/");
    }
    out
}
