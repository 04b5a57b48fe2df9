use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::types::{ControllerState, Event, JobId, Status};
use std::time::Duration;


/// Generous bound for anything the scripted fetcher does
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the job's next terminal `StatusChanged`
async fn wait_for_terminal(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    id: JobId,
) -> (Status, Option<String>) {
    match wait_for_event(rx, EVENT_TIMEOUT, |e| {
        matches!(e, Event::StatusChanged { id: eid, status, .. } if *eid == id && status.is_terminal())
    })
    .await
    {
        Event::StatusChanged { status, error, .. } => (status, error),
        other => unreachable!("predicate only matches StatusChanged, got {other:?}"),
    }
}

/// Wait for a `LogLine` with exactly `text`
async fn wait_for_log_line(rx: &mut tokio::sync::broadcast::Receiver<Event>, text: &str) {
    wait_for_event(rx, EVENT_TIMEOUT, |e| {
        matches!(e, Event::LogLine { line, .. } if line == text)
    })
    .await;
}

fn log_lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::LogLine { line, .. } => Some(line.clone()),
            _ => None,
        })
        .collect()
}
