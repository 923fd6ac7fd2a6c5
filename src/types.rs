use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, path::PathBuf};

// ── Constants ──────────────────────────────────────────────────────────

pub const STARTGG_API_URL: &str = "https://api.start.gg/gql/alpha";
pub const STARTGG_USER_AGENT: &str = "startgg-ongoing";
pub const STARTGG_SETS_PER_PAGE: u32 = 50;
pub const STARTGG_LIGHT_PER_PAGE_CAP: u32 = 10;
pub const STARTGG_PAGE_DELAY_MS: u64 = 80;
pub const STARTGG_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_DISPLAY_DIR: &str = "display";
pub const DEFAULT_COMPLEXITY_MARKERS: [&str; 2] = ["complexity", "maximum of 1000 objects"];

// ── Fetch session types ────────────────────────────────────────────────

/// Which query shape a page request uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Full,
    Light,
}

impl FetchMode {
    /// Page size actually sent for this mode. Light mode never asks for more than 10 sets.
    pub fn effective_per_page(self, requested: u32) -> u32 {
        let requested = requested.max(1);
        match self {
            FetchMode::Full => requested,
            FetchMode::Light => requested.min(STARTGG_LIGHT_PER_PAGE_CAP),
        }
    }

    /// The lighter mode to retry with after a complexity rejection. Light has none.
    pub fn downgrade(self) -> Option<FetchMode> {
        match self {
            FetchMode::Full => Some(FetchMode::Light),
            FetchMode::Light => None,
        }
    }

    pub fn initial(force_light: bool) -> Self {
        if force_light {
            FetchMode::Light
        } else {
            FetchMode::Full
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Full => f.write_str("full"),
            FetchMode::Light => f.write_str("light"),
        }
    }
}

/// Numeric start.gg event id, resolved once per fetch session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EventHandle(pub i64);

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    pub per_page: u32,
    pub max_pages: Option<u32>,
    pub force_light: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            per_page: STARTGG_SETS_PER_PAGE,
            max_pages: None,
            force_light: false,
        }
    }
}

/// Records collected by one fetch session and the mode that produced them.
#[derive(Debug)]
pub struct FetchOutcome {
    pub sets: Vec<StartggSetNode>,
    pub mode: FetchMode,
    pub downgraded: bool,
}

/// Lifecycle reported by the optional `state` field of a set.
///
/// Only `InProgress` and `Completed` settle whether a set is running. Created, ready,
/// called and unknown states all land in `Unsettled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetLifecycle {
    Unsettled,
    InProgress,
    Completed,
}

// ── Config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rotation_interval")]
    pub interval_seconds: u64,
    #[serde(default)]
    pub order: Vec<String>,
}

fn default_rotation_interval() -> u64 {
    30
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_rotation_interval(),
            order: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub scroll_speed: f64,
    pub refresh_interval_ms: u64,
    #[serde(rename = "event_slugs")]
    pub event_slugs: BTreeMap<String, String>,
    pub rotation: RotationConfig,
    pub startgg_token: String,
    pub per_page: u32,
    pub max_pages: Option<u32>,
    pub force_light: bool,
    pub request_timeout_ms: u64,
    pub page_delay_ms: u64,
    pub complexity_markers: Vec<String>,
    pub bind_addr: String,
    pub display_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scroll_speed: 1.0,
            refresh_interval_ms: 15_000,
            event_slugs: BTreeMap::new(),
            rotation: RotationConfig::default(),
            startgg_token: String::new(),
            per_page: STARTGG_SETS_PER_PAGE,
            max_pages: None,
            force_light: false,
            request_timeout_ms: STARTGG_REQUEST_TIMEOUT_MS,
            page_delay_ms: STARTGG_PAGE_DELAY_MS,
            complexity_markers: DEFAULT_COMPLEXITY_MARKERS.iter().map(|m| m.to_string()).collect(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            display_dir: DEFAULT_DISPLAY_DIR.to_string(),
        }
    }
}

impl AppConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            per_page: self.per_page.max(1),
            max_pages: self.max_pages.filter(|pages| *pages > 0),
            force_light: self.force_light,
        }
    }
}

// ── Server state ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ServerState {
    pub config_path: PathBuf,
}

// ── Display payloads ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OngoingSetPayload {
    pub id: Option<String>,
    pub players: Vec<String>,
    pub display_score: Option<String>,
    pub started_at: Option<i64>,
    pub elapsed_seconds: Option<i64>,
    pub elapsed: Option<String>,
    pub station: Option<String>,
    pub round: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOngoingPayload {
    pub name: String,
    pub event: String,
    pub event_id: Option<EventHandle>,
    pub mode: Option<FetchMode>,
    pub downgraded: bool,
    pub sets: Vec<OngoingSetPayload>,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OngoingPayload {
    pub events: Vec<EventOngoingPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfigPayload {
    pub scroll_speed: f64,
    pub refresh_interval_ms: u64,
    pub rotation: RotationConfig,
}

// ── Start.gg GraphQL response types ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartggGraphqlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphqlError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl GraphqlError {
    pub fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggEventIdData {
    pub event: Option<StartggEventIdNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggEventIdNode {
    pub id: Option<Value>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggSetsData {
    pub event: Option<StartggSetsEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggSetsEvent {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub sets: Option<StartggSetConnection>,
}

/// One page of sets as returned by the `sets` connection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggSetConnection {
    pub nodes: Option<Vec<StartggSetNode>>,
    pub page_info: Option<StartggPageInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggPageInfo {
    pub total: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total_pages: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggSetNode {
    pub id: Option<Value>,
    pub start_at: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub state: Option<Value>,
    pub round: Option<i32>,
    pub station: Option<StartggStationNode>,
    pub stream: Option<StartggStreamNode>,
    pub winner_id: Option<Value>,
    pub display_score: Option<String>,
    pub updated_at: Option<i64>,
    pub slots: Option<Vec<StartggSetSlotNode>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggStationNode {
    pub number: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggStreamNode {
    pub stream_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggSetSlotNode {
    pub id: Option<Value>,
    pub entrant: Option<StartggEntrantStub>,
    pub standing: Option<StartggStandingNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggEntrantStub {
    pub id: Option<Value>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartggStandingNode {
    pub id: Option<Value>,
    pub placement: Option<i64>,
}
