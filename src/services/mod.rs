//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers stay focused on request validation and response shaping.

pub mod assistant;
pub mod chat;
pub mod tracking;
