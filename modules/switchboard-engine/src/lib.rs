//! Typed, in-process event mediator.
//!
//! One owned context, changed only through `send`: snapshot → modify →
//! middleware → commit → notify. Listeners observe committed state; ordered
//! middleware can rewrite pending changes or cancel a dispatch outright.
//!
//! Consumers pick a context type by implementing `Context` (deep-copyable,
//! shallow-mergeable). `JsonObject` works out of the box.

pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod json;
pub mod listeners;
pub mod mediator;
pub mod middleware;
pub mod traits;

pub use context::{deep_copy, Snapshot};
pub use engine::Engine;
pub use error::MediatorError;
pub use event::{EventKey, EventName, WILDCARD};
pub use json::JsonObject;
pub use listeners::{Listener, ListenerRegistry};
pub use mediator::{Mediator, MediatorOptions};
pub use middleware::{MiddlewareEntry, MiddlewareInput, MiddlewareOutcome, Pipeline};
pub use traits::{Context, Middleware};
