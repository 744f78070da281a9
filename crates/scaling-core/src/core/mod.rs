//! # Core Module
//!
//! The stateless foundation of the crate: data containers, chemical value
//! objects, the regression primitive and the fitted relation types.
//!
//! - **Adsorption energies** ([`data`]) - The samples x adsorbates energy table
//! - **Chemistry** ([`models`]) - Species, reaction steps and reactions
//! - **Fitting** ([`regression`]) - Single-variable least squares
//! - **Results** ([`relation`]) - Adsorption energy and reaction energy relations
//! - **Quality notices** ([`diagnostics`]) - Non-fatal warnings raised along the way

pub mod data;
pub mod diagnostics;
pub mod models;
pub mod regression;
pub mod relation;
