//! Built-in seed data: a few well-known events and national polls.

use crate::polls::storage::{EventMagnitude, EventType, MajorEvent, PollDatabase, PollRecord};
use crate::utilities::errors::StorageError;

/// Seed events.
pub fn sample_events() -> Vec<MajorEvent> {
    vec![
        MajorEvent {
            event_id: "covid_19_pandemic".into(),
            name: "COVID-19 Pandemic".into(),
            date: "2020-03-11".into(),
            event_type: EventType::Health,
            description: "Global pandemic declaration by WHO".into(),
            magnitude: EventMagnitude::Global,
            duration_days: Some(1095),
            end_date: None,
        },
        MajorEvent {
            event_id: "2008_financial_crisis".into(),
            name: "2008 Financial Crisis".into(),
            date: "2008-09-15".into(),
            event_type: EventType::Economic,
            description: "Lehman Brothers collapse triggering global financial crisis".into(),
            magnitude: EventMagnitude::Global,
            duration_days: Some(730),
            end_date: None,
        },
        MajorEvent {
            event_id: "2016_election".into(),
            name: "2016 Presidential Election".into(),
            date: "2016-11-08".into(),
            event_type: EventType::Political,
            description: "Donald Trump elected President".into(),
            magnitude: EventMagnitude::National,
            duration_days: None,
            end_date: None,
        },
    ]
}

/// Seed polls.
pub fn sample_polls() -> Vec<PollRecord> {
    vec![
        PollRecord::new(
            "gallup_healthcare_2024_01",
            "Gallup",
            "2024-01-15",
            "healthcare",
            "Do you support universal healthcare?",
            1200,
        )
        .with_slice("age_range", "25-34")
        .with_slice("education", "college")
        .with_slice("race_ethnicity", "hispanic")
        .with_response("support", 0.73)
        .with_response("oppose", 0.19)
        .with_response("neutral", 0.08),
        PollRecord::new(
            "pew_economy_2024_02",
            "Pew Research",
            "2024-02-01",
            "economy",
            "How confident are you in the current economy?",
            2500,
        )
        .with_slice("age_range", "35-44")
        .with_slice("education", "college")
        .with_slice("location_type", "suburban")
        .with_response("confident", 0.45)
        .with_response("concerned", 0.41)
        .with_response("neutral", 0.14),
        PollRecord::new(
            "cnn_politics_2024_03",
            "CNN",
            "2024-03-01",
            "politics",
            "Do you approve of the current administration?",
            1800,
        )
        .with_slice("age_range", "45-54")
        .with_slice("race_ethnicity", "white")
        .with_slice("location_type", "rural")
        .with_response("approve", 0.38)
        .with_response("disapprove", 0.54)
        .with_response("neutral", 0.08),
    ]
}

/// Insert (or refresh) the seed events and polls. Returns the number of
/// polls written.
pub fn load_sample_poll_data(db: &PollDatabase) -> Result<usize, StorageError> {
    for event in sample_events() {
        db.add_event(&event)?;
    }
    let polls = sample_polls();
    for poll in &polls {
        db.add_poll(poll)?;
    }
    log::info!(
        "Loaded {} sample polls into {}",
        polls.len(),
        db.path().display()
    );
    Ok(polls.len())
}
