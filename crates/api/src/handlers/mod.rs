//! HTTP handlers, one module per resource.

pub mod imports;
pub mod preview;
pub mod templates;
pub mod uploads;
