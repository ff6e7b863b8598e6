//! Shared data model for the lore knowledge-retrieval daemon.
//!
//! Everything that crosses a crate or process boundary lives here: the query
//! and candidate shapes, scored hits, intent classification, session states,
//! routine outputs, the versioned result bundle, and the HTTP wire types.

mod bundle;
mod model;
mod wire;

pub use bundle::{
    BUNDLE_SCHEMA_VERSION, BundleMetadata, ErrorBundle, QueryOutput, ResultBundle,
};
pub use model::{
    CandidateDoc, DocType, IntentClass, IntentClassification, Query, RawCandidate, RoutineKind,
    RoutineResult, RoutineStatus, ScoredHit, SessionState,
};
pub use wire::{ErrorCode, ErrorPayload, PROTOCOL_VERSION, SearchRequest, StatusResponse};
