//! Domain logic for SheetPort spreadsheet imports.
//!
//! Everything in this crate is pure: no database, no network, no clock
//! reads except where a caller passes `now` in. The `db`, `pipeline`,
//! `worker` and `api` crates build on these types.

pub mod audit;
pub mod error;
pub mod hashing;
pub mod imports;
pub mod pagination;
pub mod roles;
pub mod types;
