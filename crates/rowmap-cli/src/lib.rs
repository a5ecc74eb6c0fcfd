//! Library side of the `rowmap` command: mapping files, logging setup,
//! the map pipeline and report tables.

#![deny(unsafe_code)]

pub mod logging;
pub mod mapping;
pub mod pipeline;
pub mod report;
