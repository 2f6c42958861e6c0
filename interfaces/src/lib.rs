pub mod defs;

pub use defs::{
    Entity, EntityAnnotation, EntityMatch, EntitySpan, LabeledUtterance, NluBatchTestClient,
    Utterance,
};
