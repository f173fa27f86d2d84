//! helpers module
//!
//! small shared types used across several components

pub mod vec3;
