//! # Core Models Module
//!
//! Value objects describing the chemistry that scaling relations are applied to.
//!
//! - [`species`] - A species with its reference energy, correction and physical state
//! - [`reaction`] - Elementary reaction steps and ordered reaction pathways
//!
//! Both are immutable once validated, and both can be parsed from the compact
//! text notation used in input files:
//!
//! ```ignore
//! use cat_scaling::core::models::reaction::ReactionStep;
//!
//! let step: ReactionStep = "*A(-1, 0) + 2H2O_g(-2, 3) -> 2*B(-4, 0)".parse()?;
//! ```

pub mod reaction;
pub mod species;
