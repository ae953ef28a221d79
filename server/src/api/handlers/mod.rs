//! API request handlers

pub mod containers;
pub mod health;
pub mod resources;
pub mod system;
pub mod terminal;
