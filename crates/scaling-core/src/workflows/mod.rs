//! # Workflows Module
//!
//! End-to-end procedures built from the `core` models and the `engine` builder.
//!
//! - **Scaling workflow** ([`scaling`]) loads an adsorption energy table, builds
//!   the relation with the configured method and, when the job names a reaction,
//!   derives the reaction energy relation.
//! - **Reaction energy conversion** ([`convert`]) combines a fitted relation
//!   with reaction stoichiometry and reference energies.

pub mod convert;
pub mod scaling;
