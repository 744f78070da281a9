//! Building scaling relations from adsorption energy data.
//!
//! [`builder::Builder`] fits relations over a borrowed
//! [`EadsTable`](crate::core::data::eads::EadsTable) using the grouping
//! declared in [`descriptors::Descriptors`], reporting progress through
//! [`progress::ProgressReporter`].

pub mod builder;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod progress;
