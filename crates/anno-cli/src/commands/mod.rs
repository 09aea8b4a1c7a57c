//! Command handlers

pub mod annotation;
pub mod config;
pub mod highlight;
pub mod status;
pub mod sync;
