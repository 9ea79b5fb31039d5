//! Classification policy for chain responses.

pub mod classifier;

pub use classifier::{
    Classification, IdempotencyClassifier, PhraseRule, DEFAULT_ACTION_PHRASES, DEFAULT_PHRASES,
};
