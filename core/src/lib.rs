//! Bounded-concurrency HTTP request pipeline.
//!
//! # Overview
//! A caller describes a request with a `RequestDescriptor` and hands it to a
//! `RequestManager`, which runs at most `max_concurrent` requests at a time.
//! Each request is encoded, sent through a `Transport`, checked for faults,
//! decoded into the caller's type with serde and delivered to a completion,
//! optionally on a chosen `CompletionContext`.
//!
//! # Design
//! - Encoding (`encoder`) and fault classification (`executor`) are pure, so
//!   the I/O boundary sits entirely behind the `Transport` trait.
//! - The transport is injected; `UreqTransport` is the default.
//! - Completion is delivered exactly once, or never if the request was
//!   cancelled first.

pub mod config;
pub mod context;
pub mod encoder;
pub mod error;
pub mod executor;
pub mod http;
pub mod logging;
pub mod manager;
pub mod request;
pub mod transport;

pub use config::{ManagerConfig, MimePolicy, DEFAULT_MAX_CONCURRENT};
pub use context::{CompletionContext, CompletionQueue};
pub use encoder::encode;
pub use error::{ClassifiedError, ConfigError, ManagerError, TransportError};
pub use executor::TaskState;
pub use http::{HttpMethod, TransportRequest, TransportResponse};
pub use logging::{FaultLogger, TracingFaultLogger};
pub use manager::{RequestManager, TaskHandle};
pub use request::{RequestDescriptor, DEFAULT_MIME_TYPE, DEFAULT_TIMEOUT, MIN_PATH_LEN};
pub use transport::{Transport, UreqTransport};
