//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming exchange (method, path, headers, query)
//!     → router.rs (method table, most specific template)
//!     → template.rs (match path, capture {params} and *)
//!     → matcher.rs (evaluate route predicates, in registration order)
//!     → Dispatch: matched handler, or the fallback
//!
//! Route Compilation (at deployment):
//!     route definitions
//!     → predicate.rs (parse predicate expressions)
//!     → Freeze as immutable RoutingHandler
//! ```
//!
//! # Design Decisions
//! - Routing tables are immutable once built
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod predicate;
pub mod router;
pub mod template;

pub use matcher::Predicate;
pub use predicate::{PredicateError, PredicateParser};
pub use router::{RoutingError, RoutingHandler};
pub use template::{PathTemplate, TemplateError};
