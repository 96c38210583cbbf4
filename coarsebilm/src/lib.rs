//! coarsebilm crate root
//!
//! Bilingual coarse language model feature for phrase-based decoders. Each
//! hypothesis expansion is scored by up to four n-gram models over coarse
//! representations of the new target words: two target cluster models and
//! two bitoken models pairing target clusters with the clusters of their
//! aligned source words.
//!
//! Public API exported here:
//! - `CoarseBiLm` / `CoarseBiLmBuilder` from `scorer`
//! - `ScorerState` from `state`
//! - `CoarseBiLmConfig`, `ScoringStages`, `CachePolicy` from `config`
//! - `Alignment` from `alignment`
//! - `Component`, `MapRole`, `ScoreVector` from `component`

pub mod alignment;
pub mod bitoken;
pub mod component;
pub mod config;
pub mod scorer;
pub mod state;

pub use alignment::Alignment;
pub use component::{Component, MapRole, ScoreVector, NUM_COMPONENTS};
pub use config::{CachePolicy, CoarseBiLmConfig, ScoringStages};
pub use scorer::{CoarseBiLm, CoarseBiLmBuilder};
pub use state::ScorerState;
