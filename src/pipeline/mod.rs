//! Pipeline module - the record rewriting core
//!
//! This module contains the following submodules:
//! - `field_path`: location of a value inside a record
//! - `walker`: depth-first enumeration of string leaves
//! - `link`: image link validation
//! - `retry`: bounded retry with a fixed delay
//! - `fetch`: image download and size check
//! - `report`: per-run outcome summary
//! - `processor`: orchestration of the steps above

pub mod fetch;
pub mod field_path;
pub mod link;
pub mod processor;
pub mod report;
pub mod retry;
pub mod walker;

pub use processor::{ContentProcessor, ImageSource, Processed};
pub use report::{RunReport, SkipReason};
