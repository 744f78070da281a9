//! # Catalysis Scaling Relations
//!
//! Builds linear scaling relations between adsorption energies of surface
//! species across a set of catalyst samples, and turns them into reaction
//! energy changes for multi-step surface reactions.
//!
//! ## Architecture
//!
//! - **[`core`]: Data and models.** Species and reaction value objects, the
//!   adsorption energy table, the regression primitive, and the fitted
//!   [`Relation`](core::relation::Relation) and
//!   [`DeltaERelation`](core::relation::DeltaERelation) outputs.
//!
//! - **[`engine`]: Relation building.** The [`Builder`](engine::builder::Builder)
//!   with its traditional and adaptive methods, descriptor specifications,
//!   configuration and progress reporting.
//!
//! - **[`workflows`]: The public entry points.** Reaction energy conversion and
//!   the complete load, build and convert job.

pub mod core;
pub mod engine;
pub mod workflows;
