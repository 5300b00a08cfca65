use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::CalendarService;
use crate::cache::{CALENDAR_CACHE_DURATION, Cache};
use crate::config::GoogleConfig;
use crate::error::SyncError;
use crate::models::CalendarEvent;
use crate::timestamp::{DATE_FORMAT, ISO_FORMAT, parse_timestamp};

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
const PRIMARY_CALENDAR: &str = "primary";
const REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Deserialize)]
struct CalendarListResponse {
    items: Option<Vec<CalendarListEntry>>,
}

#[derive(Deserialize)]
struct CalendarListEntry {
    id: String,
    summary: Option<String>,
}

#[derive(Deserialize)]
struct EventsListResponse {
    items: Option<Vec<RemoteEvent>>,
}

#[derive(Deserialize)]
struct RemoteEvent {
    status: Option<String>,
    summary: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
struct EventDateTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct EventInsertRequest {
    summary: String,
    start: EventDateTime,
    end: EventDateTime,
}

/// Calendar name to calendar id, as listed for the signed-in account.
pub type CalendarIds = BTreeMap<String, String>;

/// Google Calendar over the v3 REST API with a pre-issued bearer token.
pub struct GoogleCalendar {
    client: Client,
    access_token: String,
    timezone: Tz,
    target_name: String,
    all_calendars: CalendarIds,
    excluded: Vec<String>,
}

impl GoogleCalendar {
    /// Builds the client and loads the calendar list, reusing a cached list for a month.
    pub fn connect(config: &GoogleConfig, timezone: Tz, cache: &Cache) -> Result<Self, SyncError> {
        let access_token = config.resolve_access_token();
        if access_token.is_empty() {
            return Err(SyncError::Config(
                "Google access token missing; set google.access_token or DIARY_SYNC_GOOGLE_TOKEN.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Request(format!("Failed to create HTTP client: {e}")))?;

        let mut calendar = Self {
            client,
            access_token,
            timezone,
            target_name: config.google_cal_name.trim().to_string(),
            all_calendars: CalendarIds::new(),
            excluded: config.calendar_filter_list.clone(),
        };
        let calendars = cache.check("calendars", CALENDAR_CACHE_DURATION, || calendar.list_calendars())?;
        calendar.all_calendars = calendars;
        Ok(calendar)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, SyncError> {
        let resp = request
            .bearer_auth(&self.access_token)
            .send()
            .map_err(|e| SyncError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SyncError::Request(format!("{what} failed: HTTP {status} {body}")));
        }
        resp.json().map_err(|e| SyncError::Request(e.to_string()))
    }

    fn list_calendars(&self) -> Result<CalendarIds, SyncError> {
        let url = format!("{CALENDAR_API}/users/me/calendarList");
        let body: CalendarListResponse = self.send(self.client.get(url), "Calendar list")?;
        let calendars: CalendarIds = body
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| entry.summary.map(|name| (name, entry.id)))
            .collect();
        log::info!("Found {} Google calendars", calendars.len());
        Ok(calendars)
    }

    fn list_events(&self, calendar_id: &str, date: NaiveDate) -> Result<Vec<RemoteEvent>, SyncError> {
        let (time_min, time_max) = day_bounds(date, self.timezone)?;
        let url = events_url(calendar_id);
        let request = self.client.get(url).query(&[
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
            ("singleEvents", "true"),
            ("showDeleted", "false"),
            ("orderBy", "startTime"),
        ]);
        let body: EventsListResponse = self.send(request, "Event list")?;
        let mut items = body.items.unwrap_or_default();
        items.retain(|item| item.status.as_deref() != Some("cancelled"));
        Ok(items)
    }
}

impl CalendarService for GoogleCalendar {
    fn fetch_events(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>, SyncError> {
        let mut events = Vec::new();
        for (name, id) in visible_calendars(&self.all_calendars, &self.excluded) {
            let remote = self.list_events(id, date)?;
            log::debug!("Calendar {name}: {} events on {date}", remote.len());
            events.extend(remote.iter().filter_map(|event| event_from_remote(event, name, self.timezone)));
        }
        Ok(events)
    }

    fn insert_event(&self, event: &CalendarEvent) -> Result<(), SyncError> {
        let name = if event.calendar.trim().is_empty() {
            self.target_name.as_str()
        } else {
            event.calendar.trim()
        };
        let calendar_id = calendar_id(&self.all_calendars, name)?;
        let payload = insert_request(event, self.timezone)?;
        let url = events_url(&calendar_id);
        let _: serde_json::Value = self.send(self.client.post(url).json(&payload), "Event create")?;
        log::info!("Inserted \"{}\" into calendar {name}", event.name);
        Ok(())
    }
}

/// Calendar ids are email-like and may contain `#` or `@`.
fn events_url(calendar_id: &str) -> String {
    format!("{CALENDAR_API}/calendars/{}/events", urlencoding::encode(calendar_id))
}

/// Calendars whose events feed the schedule: every listed one not excluded by name.
fn visible_calendars<'a>(all: &'a CalendarIds, excluded: &[String]) -> Vec<(&'a str, &'a str)> {
    all.iter()
        .filter(|(name, _)| !excluded.iter().any(|skip| skip == *name))
        .map(|(name, id)| (name.as_str(), id.as_str()))
        .collect()
}

fn calendar_id(all: &CalendarIds, name: &str) -> Result<String, SyncError> {
    if name == PRIMARY_CALENDAR {
        return Ok(PRIMARY_CALENDAR.to_string());
    }
    all.get(name)
        .cloned()
        .ok_or_else(|| SyncError::Config(format!("No calendar named {name} exists.")))
}

/// `timeMin`/`timeMax` covering the whole of `date` in `timezone`.
fn day_bounds(date: NaiveDate, timezone: Tz) -> Result<(String, String), SyncError> {
    let local = |day: NaiveDate| {
        day.and_hms_opt(0, 0, 0)
            .and_then(|midnight| timezone.from_local_datetime(&midnight).earliest())
            .map(|moment| moment.to_rfc3339())
            .ok_or_else(|| SyncError::Config(format!("No midnight on {day} in {timezone}")))
    };
    let next = date
        .succ_opt()
        .ok_or_else(|| SyncError::Config(format!("Date out of range: {date}")))?;
    Ok((local(date)?, local(next)?))
}

/// Wall-clock time in `timezone`; all-day events start at midnight.
fn remote_time(value: &EventDateTime, timezone: Tz) -> Option<String> {
    if let Some(date_time) = value.date_time.as_deref() {
        let parsed = DateTime::parse_from_rfc3339(date_time).ok()?;
        return Some(parsed.with_timezone(&timezone).format(ISO_FORMAT).to_string());
    }
    let day = NaiveDate::parse_from_str(value.date.as_deref()?, DATE_FORMAT).ok()?;
    Some(day.and_hms_opt(0, 0, 0)?.format(ISO_FORMAT).to_string())
}

fn event_from_remote(event: &RemoteEvent, calendar: &str, timezone: Tz) -> Option<CalendarEvent> {
    let start = remote_time(event.start.as_ref()?, timezone)?;
    let end = remote_time(event.end.as_ref()?, timezone)?;
    Some(CalendarEvent {
        name: event.summary.clone().unwrap_or_default(),
        start,
        end,
        calendar: calendar.to_string(),
    })
}

fn payload_time(value: &str, timezone: Tz) -> Result<EventDateTime, SyncError> {
    let fallback = NaiveDate::default();
    let parsed: NaiveDateTime = parse_timestamp(value, fallback)
        .ok_or_else(|| SyncError::Serialization(format!("Unreadable event time: {value}")))?;
    Ok(EventDateTime {
        date_time: Some(parsed.format(ISO_FORMAT).to_string()),
        date: None,
        time_zone: Some(timezone.name().to_string()),
    })
}

fn insert_request(event: &CalendarEvent, timezone: Tz) -> Result<EventInsertRequest, SyncError> {
    Ok(EventInsertRequest {
        summary: event.name.clone(),
        start: payload_time(&event.start, timezone)?,
        end: payload_time(&event.end, timezone)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendars() -> CalendarIds {
        [
            ("Work", "work@group.calendar.google.com"),
            ("Holidays in UK", "en.uk#holiday@group.v.calendar.google.com"),
            ("someone@example.com", "someone@example.com"),
        ]
        .into_iter()
        .map(|(name, id)| (name.to_string(), id.to_string()))
        .collect()
    }

    #[test]
    fn excluded_calendars_are_skipped() {
        let all = calendars();
        let visible = visible_calendars(&all, &["Holidays in UK".to_string()]);
        let names: Vec<&str> = visible.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["Work", "someone@example.com"]);
        assert_eq!(visible_calendars(&all, &[]).len(), 3);
    }

    #[test]
    fn target_calendar_lookup() {
        let all = calendars();
        assert_eq!(calendar_id(&all, "primary").unwrap(), "primary");
        assert_eq!(calendar_id(&all, "Work").unwrap(), "work@group.calendar.google.com");
        assert!(matches!(calendar_id(&all, "Gym"), Err(SyncError::Config(_))));
    }

    #[test]
    fn remote_events_use_local_wall_clock() {
        let event: RemoteEvent = serde_json::from_str(
            r#"{
                "summary": "Event 1",
                "start": {"dateTime": "2018-09-16T14:00:00+01:00"},
                "end": {"dateTime": "2018-09-16T15:00:00+01:00"}
            }"#,
        )
        .unwrap();
        let converted = event_from_remote(&event, "Work", chrono_tz::Europe::London).unwrap();
        assert_eq!(converted.start, "2018-09-16T14:00:00");
        assert_eq!(converted.end, "2018-09-16T15:00:00");
        assert_eq!(converted.calendar, "Work");

        let utc = event_from_remote(&event, "Work", chrono_tz::UTC).unwrap();
        assert_eq!(utc.start, "2018-09-16T13:00:00");
    }

    #[test]
    fn all_day_events_start_at_midnight() {
        let event: RemoteEvent = serde_json::from_str(
            r#"{"summary": "Holiday", "start": {"date": "2018-09-16"}, "end": {"date": "2018-09-17"}}"#,
        )
        .unwrap();
        let converted = event_from_remote(&event, "Holidays in UK", chrono_tz::UTC).unwrap();
        assert_eq!(converted.start, "2018-09-16T00:00:00");
        assert_eq!(converted.end, "2018-09-17T00:00:00");
    }

    #[test]
    fn insert_payload_carries_the_timezone() {
        let event = CalendarEvent::new("Standup", "2018-01-01T10:00:00", "2018-01-01T10:15:00");
        let payload = insert_request(&event, chrono_tz::Europe::London).unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "summary": "Standup",
                "start": {"dateTime": "2018-01-01T10:00:00", "timeZone": "Europe/London"},
                "end": {"dateTime": "2018-01-01T10:15:00", "timeZone": "Europe/London"}
            })
        );

        let broken = CalendarEvent::new("Broken", "soon", "later");
        assert!(insert_request(&broken, chrono_tz::UTC).is_err());
    }

    #[test]
    fn day_bounds_follow_the_timezone() {
        let date = NaiveDate::from_ymd_opt(2018, 7, 1).unwrap();
        let (start, end) = day_bounds(date, chrono_tz::Europe::London).unwrap();
        assert_eq!(start, "2018-07-01T00:00:00+01:00");
        assert_eq!(end, "2018-07-02T00:00:00+01:00");
    }

    #[test]
    fn calendar_ids_are_path_encoded() {
        assert_eq!(
            events_url("en.uk#holiday@group.v.calendar.google.com"),
            format!("{CALENDAR_API}/calendars/en.uk%23holiday%40group.v.calendar.google.com/events")
        );
    }
}
