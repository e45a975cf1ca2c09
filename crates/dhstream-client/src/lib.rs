//! Client library for the digital-human stream backend.
//!
//! Provides the HTTP transport, the typed action client, the persisted
//! configuration store and the task/drive controller.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use api::{Ack, Action, ApiClient, CreateTaskRequest};
pub use config::{Config, ConfigError, ConfigStore, DEFAULT_SERVER_URL};
pub use controller::{DestroyReport, StartedTask, TaskController, TaskEvent, DEFAULT_ROOM_PREFIX};
pub use error::{ApiError, ErrorKind, TransportError};
pub use transport::{HttpTransport, Method, Transport};
