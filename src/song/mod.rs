//! Song selection input

pub mod models;

pub use models::*;
