//! dhstream Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - HTTP transport
//! - Persistence
//! - Runtime specifics
//!
//! All types here describe digital-human stream tasks as the backend
//! reports them.

pub mod digital_human;
pub mod error;
pub mod ids;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use digital_human::DigitalHumanInfo;
pub use error::CoreError;
pub use ids::{TaskId, UserId};
pub use status::{DriveType, OutputMode, TaskStatus};
pub use task::{CreatedTask, Task};
