//! ReBloom library crate
//!
//! A gamified micro-habit coach: completing tiny tasks earns XP, XP grows a
//! garden, and a model-backed coach supplies both the task suggestions and
//! the conversational encouragement.

pub mod api;
pub mod cli;
pub mod garden;
pub mod models;
pub mod providers;
pub mod service;

// Re-export commonly used types
pub use garden::{stage_for, GardenStage};
pub use models::{
    Category, ChatMessage, Core, Difficulty, Role, Session, SessionResponse, Task, UserStats,
};
pub use service::{Service, ServiceError};
