//! # Trellis Router
//!
//! A weighted, multi-variant section tree that resolves a method + path to
//! a unique handler among overlapping patterns.
//!
//! # Pattern grammar
//!
//! | Segment | Variant | Weight |
//! |---|---|---:|
//! | `users` | static literal (`[\w.-]+`) | 64 |
//! | `%s` / `%d` | typed format (non-empty / i64) | 56 |
//! | `{id:~[0-9]+}` | named regex capture | 52 |
//! | `~[0-9]+` | regex | 48 |
//! | `{id}` | named capture | 8 |
//! | `*` | match-all | 4 |
//!
//! A leading `/` is required; repeated slashes fold. Deeper matches beat
//! shallower ones; among equal depth the higher weight wins.
//!
//! # Example
//!
//! ```
//! use trellis_router::Router;
//! use http::Method;
//!
//! let router = Router::builder()
//!     .route(Method::GET, "/users/{id}", "getUser")
//!     .route(Method::GET, "/users/me", "currentUser")
//!     .build()
//!     .unwrap();
//!
//! let hit = router.resolve(&Method::GET, "/users/42").unwrap();
//! assert_eq!(*hit.handler, "getUser");
//! assert_eq!(hit.params.get("id"), Some("42"));
//!
//! let hit = router.resolve(&Method::GET, "/users/me").unwrap();
//! assert_eq!(*hit.handler, "currentUser");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod router;
mod section;

pub use router::{ResolvedRoute, Router, RouterBuilder, RouterBuildError, ALLOWED_METHODS};
pub use section::{
    classify, Format, PatternError, SectionKind, WEIGHT_FORMAT, WEIGHT_MATCH_ALL, WEIGHT_NAMED,
    WEIGHT_NAMED_REGEX, WEIGHT_REGEX, WEIGHT_STATIC,
};

pub use trellis_core::PathParams;
