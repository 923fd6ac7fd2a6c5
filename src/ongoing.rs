use crate::error::StartggError;
use crate::sets::fetch_sets_with_fallback;
use crate::startgg::{value_to_i64, value_to_string, StartggClient};
use crate::types::*;
use serde_json::Value;
use tracing::info;

/// Ongoing sets of one event plus how they were fetched.
#[derive(Debug)]
pub struct OngoingSets {
  pub event: EventHandle,
  pub mode: FetchMode,
  pub downgraded: bool,
  pub sets: Vec<StartggSetNode>,
}

pub fn map_set_lifecycle(value: Option<&Value>) -> Option<SetLifecycle> {
  let raw = value?;
  if let Some(text) = raw.as_str() {
    let lower = text.to_lowercase();
    if lower.contains("progress") {
      return Some(SetLifecycle::InProgress);
    }
    if lower.contains("complete") {
      return Some(SetLifecycle::Completed);
    }
    if text.trim().parse::<i64>().is_err() {
      return Some(SetLifecycle::Unsettled);
    }
  }
  match value_to_i64(raw)? {
    2 => Some(SetLifecycle::InProgress),
    3 => Some(SetLifecycle::Completed),
    _ => Some(SetLifecycle::Unsettled),
  }
}

/// Start time, preferring `startedAt` and falling back to `startAt`. Zero counts as unset.
pub fn set_start_time(set: &StartggSetNode) -> Option<i64> {
  set
    .started_at
    .filter(|ts| *ts != 0)
    .or_else(|| set.start_at.filter(|ts| *ts != 0))
}

fn has_winner(set: &StartggSetNode) -> bool {
  match set.winner_id.as_ref() {
    None | Some(Value::Null) => false,
    Some(Value::String(raw)) => !raw.trim().is_empty(),
    Some(Value::Number(num)) => num.as_i64() != Some(0),
    Some(_) => true,
  }
}

/// Heuristic: started, and either no completion time or no winner yet.
///
/// An in-progress or completed `state` wins when the set carries one. Created, ready,
/// called and unknown states fall through to the timestamps.
pub fn is_set_ongoing(set: &StartggSetNode) -> bool {
  match map_set_lifecycle(set.state.as_ref()) {
    Some(SetLifecycle::InProgress) => return true,
    Some(SetLifecycle::Completed) => return false,
    Some(SetLifecycle::Unsettled) | None => {}
  }
  if set_start_time(set).is_none() {
    return false;
  }
  let completed = set.completed_at.filter(|ts| *ts != 0).is_some();
  !completed || !has_winner(set)
}

pub fn classify_ongoing(sets: Vec<StartggSetNode>) -> Vec<StartggSetNode> {
  sets.into_iter().filter(is_set_ongoing).collect()
}

/// Resolve, fetch with fallback, then keep the ongoing sets.
pub fn fetch_ongoing_sets(
  client: &StartggClient,
  event_ref: &str,
  options: &FetchOptions,
) -> Result<OngoingSets, StartggError> {
  let event = client.resolve_event(event_ref)?;
  let outcome = fetch_sets_with_fallback(client, event, options)?;
  let total = outcome.sets.len();
  let sets = classify_ongoing(outcome.sets);
  info!(event = %event, mode = %outcome.mode, total, ongoing = sets.len(), "polled event");
  Ok(OngoingSets {
    event,
    mode: outcome.mode,
    downgraded: outcome.downgraded,
    sets,
  })
}

// ── Display shaping ────────────────────────────────────────────────────

pub fn format_elapsed(seconds: i64) -> String {
  let seconds = seconds.max(0);
  let hours = seconds / 3600;
  let minutes = (seconds % 3600) / 60;
  let secs = seconds % 60;
  if hours > 0 {
    format!("{hours}:{minutes:02}:{secs:02}")
  } else {
    format!("{minutes}:{secs:02}")
  }
}

pub fn station_label(set: &StartggSetNode) -> Option<String> {
  if let Some(number) = set.station.as_ref().and_then(|station| station.number) {
    return Some(format!("Station {number}"));
  }
  set
    .stream
    .as_ref()
    .and_then(|stream| stream.stream_name.as_ref())
    .map(|name| name.trim())
    .filter(|name| !name.is_empty())
    .map(str::to_string)
}

pub fn player_names(set: &StartggSetNode) -> Vec<String> {
  set
    .slots
    .iter()
    .flatten()
    .filter_map(|slot| slot.entrant.as_ref())
    .map(|entrant| {
      entrant
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| {
          let id = entrant.id.as_ref().and_then(value_to_string).unwrap_or_default();
          format!("entrant:{id}")
        })
    })
    .collect()
}

pub fn build_ongoing_set_payload(set: &StartggSetNode, now_secs: i64) -> OngoingSetPayload {
  let started_at = set_start_time(set);
  let elapsed_seconds = started_at.map(|start| (now_secs - start).max(0));
  OngoingSetPayload {
    id: set.id.as_ref().and_then(value_to_string),
    players: player_names(set),
    display_score: set.display_score.clone(),
    started_at,
    elapsed_seconds,
    elapsed: elapsed_seconds.map(format_elapsed),
    station: station_label(set),
    round: set.round,
  }
}

pub fn build_event_payload(
  name: &str,
  event_ref: &str,
  result: Result<OngoingSets, StartggError>,
  now_secs: i64,
) -> EventOngoingPayload {
  match result {
    Ok(ongoing) => EventOngoingPayload {
      name: name.to_string(),
      event: event_ref.to_string(),
      event_id: Some(ongoing.event),
      mode: Some(ongoing.mode),
      downgraded: ongoing.downgraded,
      sets: ongoing
        .sets
        .iter()
        .map(|set| build_ongoing_set_payload(set, now_secs))
        .collect(),
      error: None,
      error_kind: None,
    },
    Err(err) => EventOngoingPayload {
      name: name.to_string(),
      event: event_ref.to_string(),
      event_id: None,
      mode: None,
      downgraded: false,
      sets: Vec::new(),
      error: Some(err.user_message()),
      error_kind: Some(err.kind()),
    },
  }
}

/// Configured events in display order: rotation order first, then the rest by name.
pub fn ordered_events(config: &AppConfig) -> Vec<(String, String)> {
  let mut out: Vec<(String, String)> = Vec::new();
  for name in &config.rotation.order {
    if out.iter().any(|(seen, _)| seen == name) {
      continue;
    }
    if let Some(event_ref) = config.event_slugs.get(name) {
      out.push((name.clone(), event_ref.clone()));
    }
  }
  for (name, event_ref) in &config.event_slugs {
    if !out.iter().any(|(seen, _)| seen == name) {
      out.push((name.clone(), event_ref.clone()));
    }
  }
  out
}
