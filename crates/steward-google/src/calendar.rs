use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use steward_audit::ActionLog;
use tracing::info;

use crate::{
    client::GoogleClient,
    error::{GoogleError, Result},
};

const LIST_TOOL: &str = "google_calendar_list";
const INSERT_TOOL: &str = "google_calendar_insert";
const EVENTS_PATH: &str = "calendar/v3/calendars/primary/events";
const MAX_EVENTS: usize = 50;
const MAX_DURATION_MIN: i64 = 1440;

pub const DEFAULT_UPCOMING_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    /// RFC 3339 for timed events, `YYYY-MM-DD` for all-day ones.
    pub start: String,
    pub end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEventRequest {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub start: String,
    pub duration_min: Option<i64>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl CreateEventRequest {
    /// Start and end of the event, or every validation problem joined by ", ".
    fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let mut problems = Vec::new();
        if self.summary.is_empty() {
            problems.push("Summary is required".to_string());
        }
        let start = DateTime::parse_from_rfc3339(&self.start)
            .map(|dt| dt.with_timezone(&Utc))
            .ok();
        if start.is_none() {
            problems.push("Start must be a valid ISO datetime".to_string());
        }
        let duration = self
            .duration_min
            .filter(|d| (1..=MAX_DURATION_MIN).contains(d));
        if duration.is_none() {
            problems.push(format!("duration_min must be between 1 and {MAX_DURATION_MIN}"));
        }

        match (start, duration) {
            (Some(start), Some(minutes)) if problems.is_empty() => {
                Ok((start, start + Duration::minutes(minutes)))
            }
            _ => Err(GoogleError::Validation(problems.join(", "))),
        }
    }
}

/// The primary Google Calendar of the configured account.
pub struct CalendarService {
    client: Arc<GoogleClient>,
    audit: Arc<ActionLog>,
}

impl CalendarService {
    pub fn new(client: Arc<GoogleClient>, audit: Arc<ActionLog>) -> Self {
        Self { client, audit }
    }

    /// Events starting within the next `hours`, in start order.
    pub async fn upcoming_events(&self, hours: i64) -> Result<Vec<CalendarEvent>> {
        let started = Instant::now();
        let input = json!({ "hours": hours });

        let outcome: Result<Vec<CalendarEvent>> = async {
            self.ensure_configured()?;
            let now = Utc::now();
            let until = now + Duration::hours(hours);
            let list: EventList = self
                .client
                .get_json(
                    EVENTS_PATH,
                    &[
                        ("timeMin", rfc3339(now)),
                        ("timeMax", rfc3339(until)),
                        ("singleEvents", "true".to_string()),
                        ("orderBy", "startTime".to_string()),
                        ("maxResults", MAX_EVENTS.to_string()),
                    ],
                )
                .await?;
            Ok(list
                .items
                .into_iter()
                .map(|e| e.into_event("(No title)"))
                .collect())
        }
        .await;

        let summary = match &outcome {
            Ok(events) => format!("Retrieved {} events", events.len()),
            Err(e) => format!("Error: {e}"),
        };
        self.audit.record(
            LIST_TOOL,
            Some(&input),
            Some(&summary),
            Some(started.elapsed().as_millis() as i64),
        );
        outcome
    }

    /// Insert a timed event lasting `duration_min` minutes.
    pub async fn create_event(&self, req: &CreateEventRequest) -> Result<CalendarEvent> {
        let (start, end) = req.window()?;
        let started = Instant::now();
        let input = serde_json::to_value(req).unwrap_or_default();

        let outcome: Result<CalendarEvent> = async {
            self.ensure_configured()?;
            let body = json!({
                "summary": req.summary,
                "description": req.description,
                "location": req.location,
                "start": { "dateTime": rfc3339(start) },
                "end": { "dateTime": rfc3339(end) },
            });
            let created: RawEvent = self.client.post_json(EVENTS_PATH, &body).await?;
            Ok(created.into_event(""))
        }
        .await;

        let summary = match &outcome {
            Ok(event) => format!("Created event: {}", event.summary),
            Err(e) => format!("Error: {e}"),
        };
        self.audit.record(
            INSERT_TOOL,
            Some(&input),
            Some(&summary),
            Some(started.elapsed().as_millis() as i64),
        );

        let event = outcome?;
        info!(event_id = %event.id, "calendar event created");
        Ok(event)
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.client.is_configured() {
            return Ok(());
        }
        Err(GoogleError::NotConfigured(
            "Google Calendar is not configured. Set google.client_id, google.client_secret and google.refresh_token."
                .into(),
        ))
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: Option<String>,
    summary: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    description: Option<String>,
    location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    fn text(self) -> String {
        self.date_time.or(self.date).unwrap_or_default()
    }
}

impl RawEvent {
    fn into_event(self, untitled: &str) -> CalendarEvent {
        CalendarEvent {
            id: self.id.unwrap_or_default(),
            summary: self.summary.unwrap_or_else(|| untitled.to_string()),
            start: self.start.map(EventTime::text).unwrap_or_default(),
            end: self.end.map(EventTime::text).unwrap_or_default(),
            description: self.description,
            location: self.location,
        }
    }
}
