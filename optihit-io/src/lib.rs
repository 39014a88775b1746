//! optihit-io: Output sinks for optihit event rows.
//!
//! This crate provides [`optihit_core::RowSink`] implementations writing
//! JSON lines and, with the `hdf5` feature, chunked HDF5 datasets.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod jsonl;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{Hdf5RowSink, Hdf5WriteOptions};
pub use jsonl::JsonLinesSink;
