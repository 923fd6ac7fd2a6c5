use crate::config::*;
use crate::error::StartggError;
use crate::types::*;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tracing::debug;

// ── GraphQL query constants ────────────────────────────────────────────

pub const STARTGG_EVENT_ID_QUERY: &str = r#"
query EventBySlug($slug: String!) {
  event(slug: $slug) {
    id
    name
  }
}
"#;

pub const STARTGG_EVENT_SETS_QUERY: &str = r#"
query EventSets($eventId: ID!, $page: Int!, $perPage: Int!) {
  event(id: $eventId) {
    id
    name
    sets(page: $page, perPage: $perPage, sortType: STANDARD) {
      pageInfo { total page perPage totalPages }
      nodes {
        id
        startAt
        startedAt
        completedAt
        state
        round
        station { number }
        stream { streamName }
        winnerId
        displayScore
        updatedAt
        slots(includeByes: true) {
          id
          entrant { id name }
          standing { id placement }
        }
      }
    }
  }
}
"#;

pub const STARTGG_EVENT_SETS_QUERY_LIGHT: &str = r#"
query EventSetsLight($eventId: ID!, $page: Int!, $perPage: Int!) {
  event(id: $eventId) {
    id
    name
    sets(page: $page, perPage: $perPage, sortType: STANDARD) {
      pageInfo { total page perPage totalPages }
      nodes {
        id
        startAt
        startedAt
        completedAt
        winnerId
        displayScore
        slots(includeByes: true) {
          id
          entrant { id name }
        }
      }
    }
  }
}
"#;

pub fn sets_query_for(mode: FetchMode) -> &'static str {
  match mode {
    FetchMode::Full => STARTGG_EVENT_SETS_QUERY,
    FetchMode::Light => STARTGG_EVENT_SETS_QUERY_LIGHT,
  }
}

// ── Transport ──────────────────────────────────────────────────────────

/// Sends one `{query, variables}` body and hands back the decoded envelope.
pub trait GraphqlTransport: Send + Sync {
  fn post(&self, query: &str, variables: &Value) -> Result<StartggGraphqlResponse<Value>, StartggError>;
}

pub struct HttpTransport {
  client: reqwest::blocking::Client,
  token: String,
  url: String,
}

impl HttpTransport {
  pub fn new(token: &str, timeout: Duration) -> Result<Self, StartggError> {
    let token = token.trim();
    if token.is_empty() {
      return Err(StartggError::MissingToken);
    }
    let client = reqwest::blocking::Client::builder()
      .timeout(timeout)
      .user_agent(STARTGG_USER_AGENT)
      .build()?;
    Ok(Self {
      client,
      token: token.to_string(),
      url: STARTGG_API_URL.to_string(),
    })
  }
}

impl GraphqlTransport for HttpTransport {
  fn post(&self, query: &str, variables: &Value) -> Result<StartggGraphqlResponse<Value>, StartggError> {
    let request_log = {
      let vars = serde_json::to_string_pretty(variables).unwrap_or_else(|_| variables.to_string());
      format!(
        "url: {}\nAuthorization: Bearer [redacted]\nquery:\n{query}\nvariables:\n{vars}",
        self.url
      )
    };
    append_startgg_log("Start.gg request", &request_log);
    let resp = self
      .client
      .post(&self.url)
      .bearer_auth(&self.token)
      .header(reqwest::header::ACCEPT, "application/json")
      .json(&json!({ "query": query, "variables": variables }))
      .send()
      .map_err(|e| {
        append_startgg_log("Start.gg error", &format!("send failed: {e}"));
        StartggError::Transport(e)
      })?;
    let status = resp.status();
    let body = resp.text()?;
    append_startgg_log("Start.gg response", &format!("status: {status}\nbody:\n{body}"));
    if !status.is_success() {
      return Err(StartggError::HttpStatus { status: status.as_u16(), body });
    }
    Ok(serde_json::from_str(&body)?)
  }
}

// ── Complexity classification ──────────────────────────────────────────

/// Decides whether an error message means "query too expensive".
pub type ComplexityPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Case-insensitive substring match against any of `markers`.
pub fn complexity_markers_predicate<I, S>(markers: I) -> ComplexityPredicate
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let markers: Vec<String> = markers
    .into_iter()
    .map(|marker| marker.as_ref().trim().to_lowercase())
    .filter(|marker| !marker.is_empty())
    .collect();
  Arc::new(move |message: &str| {
    let lower = message.to_lowercase();
    markers.iter().any(|marker| lower.contains(marker.as_str()))
  })
}

pub fn default_complexity_predicate() -> ComplexityPredicate {
  complexity_markers_predicate(DEFAULT_COMPLEXITY_MARKERS)
}

// ── Client ─────────────────────────────────────────────────────────────

/// Holds no per-session state, so one client can serve independent fetches on several threads.
#[derive(Clone)]
pub struct StartggClient {
  transport: Arc<dyn GraphqlTransport>,
  is_complexity: ComplexityPredicate,
  page_delay: Duration,
}

impl StartggClient {
  pub fn new(transport: Arc<dyn GraphqlTransport>) -> Self {
    Self {
      transport,
      is_complexity: default_complexity_predicate(),
      page_delay: Duration::from_millis(STARTGG_PAGE_DELAY_MS),
    }
  }

  pub fn from_config(config: &AppConfig) -> Result<Self, StartggError> {
    let transport = HttpTransport::new(
      &config.startgg_token,
      Duration::from_millis(config.request_timeout_ms),
    )?;
    Ok(
      Self::new(Arc::new(transport))
        .with_complexity_predicate(complexity_markers_predicate(&config.complexity_markers))
        .with_page_delay(Duration::from_millis(config.page_delay_ms)),
    )
  }

  pub fn with_complexity_predicate(mut self, predicate: ComplexityPredicate) -> Self {
    self.is_complexity = predicate;
    self
  }

  pub fn with_page_delay(mut self, delay: Duration) -> Self {
    self.page_delay = delay;
    self
  }

  pub fn page_delay(&self) -> Duration {
    self.page_delay
  }

  /// Runs one query and returns its `data`, or the classified error.
  pub fn graphql_request<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, StartggError> {
    let response = self.transport.post(query, &variables)?;
    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
      return Err(self.classify_errors(errors));
    }
    let data = response.data.ok_or(StartggError::MissingData)?;
    Ok(serde_json::from_value(data)?)
  }

  pub fn classify_errors(&self, errors: Vec<GraphqlError>) -> StartggError {
    let complexity = errors
      .iter()
      .map(GraphqlError::message_text)
      .find(|message| (self.is_complexity)(message))
      .map(str::to_string);
    match complexity {
      Some(message) => StartggError::ComplexityRejected(message),
      None => StartggError::Remote(errors),
    }
  }

  /// Fetches one page of sets for `event` with the query shape of `mode`.
  pub fn fetch_event_sets_page(
    &self,
    event: EventHandle,
    mode: FetchMode,
    page: u32,
    per_page: u32,
  ) -> Result<StartggSetConnection, StartggError> {
    debug!(event = %event, %mode, page, per_page, "fetching sets page");
    let data: StartggSetsData = self.graphql_request(
      sets_query_for(mode),
      json!({ "eventId": event.0, "page": page, "perPage": per_page }),
    )?;
    let event_node = data
      .event
      .ok_or_else(|| StartggError::EventNotFound(event.to_string()))?;
    Ok(event_node.sets.unwrap_or_default())
  }

  /// Numeric refs are taken as-is; anything else costs one slug lookup.
  pub fn resolve_event(&self, event_ref: &str) -> Result<EventHandle, StartggError> {
    let trimmed = event_ref.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
      return Ok(EventHandle(id));
    }
    let slug = normalize_event_slug(trimmed)
      .ok_or_else(|| StartggError::EventNotFound(trimmed.to_string()))?;
    let data: StartggEventIdData =
      self.graphql_request(STARTGG_EVENT_ID_QUERY, json!({ "slug": &slug }))?;
    let handle = data
      .event
      .and_then(|event| event.id.as_ref().and_then(value_to_i64))
      .map(EventHandle)
      .ok_or(StartggError::EventNotFound(slug))?;
    debug!(event = %handle, "resolved event slug");
    Ok(handle)
  }
}

/// Reduces a start.gg link or path to `tournament/<t>/event/<e>`.
pub fn normalize_event_slug(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  let without_hash = trimmed.split('#').next().unwrap_or(trimmed);
  let without_query = without_hash.split('?').next().unwrap_or(without_hash);
  let mut path = without_query;
  if let Some(idx) = path.find("start.gg") {
    path = &path[idx + "start.gg".len()..];
  }
  let path = path.trim_matches('/');
  if path.is_empty() {
    return None;
  }
  let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
  let tournament = segments
    .iter()
    .position(|s| *s == "tournament")
    .and_then(|idx| segments.get(idx + 1));
  let event = segments
    .iter()
    .position(|s| *s == "event")
    .and_then(|idx| segments.get(idx + 1));
  match (tournament, event) {
    (Some(tournament), Some(event)) => Some(format!("tournament/{tournament}/event/{event}")),
    _ => Some(segments.join("/")),
  }
}

pub fn value_to_i64(value: &Value) -> Option<i64> {
  match value {
    Value::Number(num) => num.as_i64(),
    Value::String(raw) => raw.trim().parse::<i64>().ok(),
    _ => None,
  }
}

pub fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(raw) => Some(raw.clone()),
    Value::Number(num) => Some(num.to_string()),
    _ => None,
  }
}


#[cfg(test)]
mod tests {
  use super::testing::*;
  use super::*;

  #[test]
  fn complexity_message_is_matched_case_insensitively() {
    let transport = ScriptedTransport::new();
    transport.push_body(errors_body(&["Your query COMPLEXITY is too high. Max is 1000"]));
    let client = client_for(&transport);
    let err = client.fetch_event_sets_page(EventHandle(7), FetchMode::Full, 1, 50).unwrap_err();
    assert!(matches!(err, StartggError::ComplexityRejected(ref msg) if msg.contains("COMPLEXITY")));
  }

  #[test]
  fn object_limit_message_counts_as_complexity() {
    let transport = ScriptedTransport::new();
    transport.push_body(errors_body(&[
      "some unrelated warning",
      "Cannot query more than the Maximum of 1000 objects",
    ]));
    let client = client_for(&transport);
    let err = client.fetch_event_sets_page(EventHandle(7), FetchMode::Full, 1, 50).unwrap_err();
    assert!(matches!(err, StartggError::ComplexityRejected(ref msg) if msg.contains("1000 objects")));
  }

  #[test]
  fn other_errors_are_remote_with_full_list() {
    let transport = ScriptedTransport::new();
    transport.push_body(errors_body(&["Invalid authentication token", "second"]));
    let client = client_for(&transport);
    match client.fetch_event_sets_page(EventHandle(7), FetchMode::Full, 1, 50) {
      Err(StartggError::Remote(errors)) => assert_eq!(errors.len(), 2),
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn custom_predicate_replaces_default_rule() {
    let transport = ScriptedTransport::new();
    transport.push_body(errors_body(&["rate budget exceeded"]));
    let client = client_for(&transport).with_complexity_predicate(complexity_markers_predicate(["budget"]));
    let err = client.fetch_event_sets_page(EventHandle(7), FetchMode::Full, 1, 50).unwrap_err();
    assert_eq!(err.kind(), "complexity");
  }

  #[test]
  fn http_failure_is_passed_through() {
    let transport = ScriptedTransport::new();
    transport.push_error(StartggError::HttpStatus { status: 500, body: "oops".to_string() });
    let client = client_for(&transport);
    let err = client.fetch_event_sets_page(EventHandle(7), FetchMode::Full, 1, 50).unwrap_err();
    assert!(err.is_transport_failure());
    assert_eq!(transport.call_count(), 1);
  }

  #[test]
  fn success_returns_page_envelope_and_sends_variables() {
    let transport = ScriptedTransport::new();
    transport.push_body(sets_page(100, 3, Some(4)));
    let client = client_for(&transport);
    let page = client.fetch_event_sets_page(EventHandle(42), FetchMode::Light, 2, 10).unwrap();
    assert_eq!(page.nodes.as_ref().map(Vec::len), Some(3));
    assert_eq!(page.page_info.and_then(|info| info.total_pages), Some(4));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, STARTGG_EVENT_SETS_QUERY_LIGHT);
    assert_eq!(calls[0].1, json!({ "eventId": 42, "page": 2, "perPage": 10 }));
  }

  #[test]
  fn missing_data_and_null_event() {
    let transport = ScriptedTransport::new();
    transport.push_body(json!({}));
    transport.push_body(json!({ "data": { "event": null } }));
    let client = client_for(&transport);
    assert!(matches!(
      client.fetch_event_sets_page(EventHandle(1), FetchMode::Full, 1, 50),
      Err(StartggError::MissingData)
    ));
    assert!(matches!(
      client.fetch_event_sets_page(EventHandle(1), FetchMode::Full, 1, 50),
      Err(StartggError::EventNotFound(_))
    ));
  }

  #[test]
  fn numeric_ref_skips_network() {
    let transport = ScriptedTransport::new();
    let client = client_for(&transport);
    assert_eq!(client.resolve_event("12345").unwrap(), EventHandle(12345));
    assert_eq!(client.resolve_event(" 99 ").unwrap(), EventHandle(99));
    assert_eq!(transport.call_count(), 0);
  }

  #[test]
  fn slug_ref_issues_exactly_one_lookup() {
    let transport = ScriptedTransport::new();
    transport.push_body(json!({ "data": { "event": { "id": "864200", "name": "Singles" } } }));
    let client = client_for(&transport);
    let handle = client.resolve_event("some-event-slug").unwrap();
    assert_eq!(handle, EventHandle(864200));
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, STARTGG_EVENT_ID_QUERY);
    assert_eq!(calls[0].1, json!({ "slug": "some-event-slug" }));
  }

  #[test]
  fn unknown_slug_is_not_found_not_failure() {
    let transport = ScriptedTransport::new();
    transport.push_body(json!({ "data": { "event": null } }));
    let client = client_for(&transport);
    let err = client.resolve_event("tournament/nope/event/nada").unwrap_err();
    assert!(matches!(err, StartggError::EventNotFound(ref slug) if slug == "tournament/nope/event/nada"));
    assert_eq!(transport.call_count(), 1);
  }

  #[test]
  fn empty_ref_is_not_found_without_network() {
    let transport = ScriptedTransport::new();
    let client = client_for(&transport);
    assert!(matches!(client.resolve_event("  "), Err(StartggError::EventNotFound(_))));
    assert_eq!(transport.call_count(), 0);
  }

  #[test]
  fn links_are_normalized_to_event_slugs() {
    assert_eq!(
      normalize_event_slug("https://www.start.gg/tournament/genesis-x/event/melee-singles/overview?tab=1").as_deref(),
      Some("tournament/genesis-x/event/melee-singles")
    );
    assert_eq!(
      normalize_event_slug("/tournament/a/event/b/").as_deref(),
      Some("tournament/a/event/b")
    );
    assert_eq!(normalize_event_slug("some-event-slug").as_deref(), Some("some-event-slug"));
    assert_eq!(normalize_event_slug("https://start.gg/"), None);
  }
}
