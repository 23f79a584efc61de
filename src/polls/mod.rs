//! Historical poll storage and selection of poll context for personas.

pub mod sample;
pub mod selector;
pub mod storage;

pub use sample::load_sample_poll_data;
pub use selector::{
    age_range, identify_topics, HistoricalPattern, PollDataSelector, ScoredPoll,
    DEFAULT_MAX_POLLS, DEFAULT_RECENCY_WEIGHT,
};
pub use storage::{
    DemographicSlice, EventMagnitude, EventRelationship, EventType, LinkedEvent, MajorEvent,
    PollDatabase, PollQuery, PollRecord, SliceValue,
};
