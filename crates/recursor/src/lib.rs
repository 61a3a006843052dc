//! Recursive DNS resolution: a shared answer cache, a resolver that walks
//! the delegation hierarchy from the root servers, and the server handler
//! that fronts them.

pub mod cache;
pub mod handler;
pub mod resolver;

pub use cache::AnswerCache;
pub use handler::RecursorHandler;
pub use resolver::{Exchanger, ResolveError, Resolver, UdpExchanger, MAX_DEPTH, ROOTS};
