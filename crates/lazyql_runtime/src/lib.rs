//! Runtime core for lazyql.
//!
//! This crate provides the client-side runtime behind generated lazyql clients:
//! - `client`: The client context and its `query` / `mutation` / `subscription` roots
//! - `accessor`: Lazy object, union and list accessors over the schema
//! - `cache`: The normalized cache
//! - `interceptor`: Selection tracking for the fetch layer
//! - `events`: Cache change notifications
//! - `value`: Values read from and written through accessors
//! - `config`: Client configuration
//! - `error`: Client errors
//!
//! Cache writes (`Client::set_cache`) and selection replay (`Client::assign_selections`) are
//! methods on the client.

pub mod accessor;
mod accessor_cache;
mod assign;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod interceptor;
mod set_cache;
pub mod value;

pub use accessor::{ArrayAccessor, FieldFn, ObjectAccessor};
pub use cache::{CacheRef, ClientCache, InMemoryCache};
pub use client::Client;
pub use config::{ClientConfig, NormalizationConfig};
pub use error::{ClientError, ClientResult, ErrorCode};
pub use events::{CacheChangeEvent, EventHandler, ListenerId};
pub use interceptor::{Interceptor, InterceptorManager};
pub use set_cache::CacheTarget;
pub use value::{Data, FieldValue};
