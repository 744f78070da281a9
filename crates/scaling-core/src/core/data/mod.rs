//! Provides the adsorption energy table that scaling relations are fitted on.
//!
//! The table is a dense `samples x adsorbates` matrix with named axes. It can
//! be built in memory or loaded from CSV, and supports the column/row access,
//! insertion, removal and sorting operations needed to curate a data set before
//! fitting.

pub mod eads;
