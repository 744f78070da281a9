//! # Relation Module
//!
//! Fitted linear scaling relations, represented as coefficient matrices.
//!
//! For any species `Z` and two descriptors `X` and `Y`:
//!
//! ```text
//!              Descriptor_X   Descriptor_Y   Constant
//! Eads(I)   =  a_I            b_I            c_I
//! Eads(II)  =  a_II           b_II           c_II
//! ```
//!
//! - [`eads`] - The adsorption energy relation produced by the builder
//! - [`delta_e`] - Per-step reaction energy changes derived from it

pub mod delta_e;
pub mod eads;

pub use delta_e::{DeltaERelation, DeltaERelationError};
pub use eads::{Relation, RelationError};
