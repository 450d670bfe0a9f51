//! PaStA core library — patch clustering, similarity rating, and upstream tracking.
//!
//! The central structure is [`cluster::ClusterStore`], which tracks which
//! patches are the same logical change. It is fed by the
//! pre-selection → evaluation → rating pipeline:
//! [`preselect`] narrows candidate pairs, [`evaluate`] scores them with
//! [`similarity`], and [`rating::RatingSession`] decides which pairs merge.

pub mod cluster;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluate;
pub mod preselect;
pub mod progress;
pub mod rating;
pub mod similarity;
pub mod types;
