//! Request extractors and middleware.

pub mod auth;
pub mod feature;
