//! HTTP request handlers for the terrain API.

pub mod common;
pub mod health;
pub mod pyramid;
pub mod terrain;
pub mod tiles;
