// --- File: crates/helios_scheduling/src/availability.rs ---
//! Bookable-slot resolution for a recruiter / sales-rep pair.
//!
//! Both parties' weekly windows are converted through their stored timezones
//! into absolute time, intersected, and reduced by the busy intervals their
//! calendars report. What remains is discretized onto a fixed slot grid.
//! "No availability" is an expected outcome and comes back as an empty slot
//! list with a message, never as an error.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use helios_common::services::CalendarService;
use helios_common::SchedulingError;
use helios_db::repositories::{ProfileRepository, UserProfile};
use helios_oauth::TokenStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    /// Bookable start times, HH:MM 24h, in the recruiter's timezone.
    pub available_slots: Vec<String>,
    /// Set when the slot list is empty for an expected reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recruiter_timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_rep_timezone: Option<String>,
}

impl AvailabilityResponse {
    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available_slots: vec![],
            message: Some(message.into()),
            recruiter_timezone: None,
            sales_rep_timezone: None,
        }
    }
}

/// How long a cached slot list may serve a booking session before it is
/// treated as stale. A session that reopens after this window resolves
/// fresh.
const SLOT_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(60);

/// Advisory per-session cache of resolved slots.
///
/// Keyed by (recruiter, sales rep, date). Entries age out after the TTL so
/// a reopened booking dialog never sees hours-stale slots, and the whole
/// cache is cleared when a booking lands. Expired entries are evicted on
/// every insert to bound the map.
pub struct SlotCache {
    ttl: std::time::Duration,
    entries: Mutex<HashMap<(String, String, NaiveDate), (AvailabilityResponse, Instant)>>,
}

impl Default for SlotCache {
    fn default() -> Self {
        Self::new(SLOT_CACHE_TTL)
    }
}

impl SlotCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn get(
        &self,
        key: &(String, String, NaiveDate),
    ) -> Option<AvailabilityResponse> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, stored_at)) if stored_at.elapsed() <= self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub(crate) async fn insert(
        &self,
        key: (String, String, NaiveDate),
        value: AvailabilityResponse,
    ) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() <= self.ttl);
        entries.insert(key, (value, Instant::now()));
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

pub struct AvailabilityResolver {
    profiles: Arc<dyn ProfileRepository>,
    token_store: Arc<TokenStore>,
    calendar: Arc<dyn CalendarService>,
    calendar_id: String,
    slot_duration: Duration,
    cache: SlotCache,
}

impl AvailabilityResolver {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        token_store: Arc<TokenStore>,
        calendar: Arc<dyn CalendarService>,
        calendar_id: String,
        slot_duration_minutes: i64,
    ) -> Self {
        Self {
            profiles,
            token_store,
            calendar,
            calendar_id,
            slot_duration: Duration::minutes(slot_duration_minutes),
            cache: SlotCache::default(),
        }
    }

    /// Drop all cached slot lists. Called when a booking session restarts.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn get_available_slots(
        &self,
        recruiter_id: &str,
        sales_rep_id: &str,
        date: NaiveDate,
    ) -> Result<AvailabilityResponse, SchedulingError> {
        let key = (recruiter_id.to_string(), sales_rep_id.to_string(), date);
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Slot cache hit for {:?}", key);
            return Ok(cached);
        }

        let response = self
            .resolve(recruiter_id, sales_rep_id, date, Utc::now())
            .await?;
        self.cache.insert(key, response.clone()).await;
        Ok(response)
    }

    pub(crate) async fn resolve(
        &self,
        recruiter_id: &str,
        sales_rep_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AvailabilityResponse, SchedulingError> {
        let Some(recruiter) = self.profiles.find_profile(recruiter_id).await? else {
            return Ok(AvailabilityResponse::unavailable(
                "Recruiter has no profile configured",
            ));
        };
        let Some(sales_rep) = self.profiles.find_profile(sales_rep_id).await? else {
            return Ok(AvailabilityResponse::unavailable(
                "Sales representative has no profile configured",
            ));
        };

        let recruiter_tz = parse_timezone(&recruiter)?;
        let sales_rep_tz = parse_timezone(&sales_rep)?;
        let with_timezones = |mut response: AvailabilityResponse| {
            response.recruiter_timezone = Some(recruiter.timezone.clone());
            response.sales_rep_timezone = Some(sales_rep.timezone.clone());
            response
        };

        let weekday = i64::from(date.weekday().num_days_from_monday());
        let recruiter_window = self.profiles.window_for(recruiter_id, weekday).await?;
        let sales_rep_window = self.profiles.window_for(sales_rep_id, weekday).await?;

        let day_name = date.weekday().to_string();
        let (Some(rw), Some(sw)) = (recruiter_window, sales_rep_window) else {
            return Ok(with_timezones(AvailabilityResponse::unavailable(format!(
                "No availability configured for {day_name}"
            ))));
        };
        if !rw.enabled || !sw.enabled {
            return Ok(with_timezones(AvailabilityResponse::unavailable(format!(
                "No availability configured for {day_name}"
            ))));
        }

        let (r_start, r_end) = window_bounds(date, &rw.start_time, &rw.end_time, recruiter_tz)?;
        let (s_start, s_end) = window_bounds(date, &sw.start_time, &sw.end_time, sales_rep_tz)?;

        let overlap_start = r_start.max(s_start);
        let overlap_end = r_end.min(s_end);
        if overlap_start >= overlap_end {
            return Ok(with_timezones(AvailabilityResponse::unavailable(
                "No overlapping availability between participants",
            )));
        }

        let mut busy = self
            .busy_for(recruiter_id, overlap_start, overlap_end)
            .await?;
        busy.extend(
            self.busy_for(sales_rep_id, overlap_start, overlap_end)
                .await?,
        );

        let slots = discretize_free_time(
            overlap_start,
            overlap_end,
            &busy,
            self.slot_duration,
            now,
            recruiter_tz,
        );

        info!(
            "Resolved {} slots for {}/{} on {}",
            slots.len(),
            recruiter_id,
            sales_rep_id,
            date
        );
        let message = if slots.is_empty() {
            Some("No free slots remain for this day".to_string())
        } else {
            None
        };
        Ok(with_timezones(AvailabilityResponse {
            available_slots: slots,
            message,
            recruiter_timezone: None,
            sales_rep_timezone: None,
        }))
    }

    async fn busy_for(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, SchedulingError> {
        self.token_store
            .with_fresh_tokens(user_id, |access_token| {
                self.calendar
                    .get_busy_times(&access_token, &self.calendar_id, start, end)
            })
            .await
    }
}

fn parse_timezone(profile: &UserProfile) -> Result<Tz, SchedulingError> {
    profile.timezone.parse::<Tz>().map_err(|_| {
        SchedulingError::Config(format!(
            "Invalid timezone '{}' for user {}",
            profile.timezone, profile.user_id
        ))
    })
}

/// Absolute bounds of one party's window on `date`, interpreted in their
/// timezone. An end at or before the start yields an empty interval rather
/// than an error.
fn window_bounds(
    date: NaiveDate,
    start_time: &str,
    end_time: &str,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), SchedulingError> {
    let start = local_instant(date, start_time, tz)?;
    let end = local_instant(date, end_time, tz)?;
    Ok((start, end.max(start)))
}

fn local_instant(date: NaiveDate, time: &str, tz: Tz) -> Result<DateTime<Utc>, SchedulingError> {
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| SchedulingError::Config(format!("Invalid window time '{time}'")))?;
    let local = date.and_time(time);
    // On a DST gap the earliest valid interpretation is used.
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            SchedulingError::Config(format!("Window time {local} does not exist in {tz}"))
        })
}

/// Merge overlapping or touching busy intervals into a sorted disjoint list.
pub(crate) fn merge_busy_periods(
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if busy.is_empty() {
        return vec![];
    }
    let mut sorted = busy.to_vec();
    sorted.sort_by_key(|(start, _)| *start);
    let mut merged = vec![sorted[0]];
    for &(start, end) in &sorted[1..] {
        let last = merged
            .last_mut()
            .expect("merged starts non-empty");
        if start <= last.1 {
            last.1 = last.1.max(end);
        } else {
            merged.push((start, end));
        }
    }
    merged
}

/// Cut the free portions of `[window_start, window_end)` into slot-aligned
/// start times, formatted HH:MM in `tz`.
///
/// Candidates are aligned to the slot grid from local midnight, not to the
/// raw window start. A slot that does not fully fit before a busy interval
/// or the window end is dropped, and slots starting before `now` are
/// excluded.
pub(crate) fn discretize_free_time(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
    slot: Duration,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<String> {
    let merged = merge_busy_periods(busy);
    let slot_minutes = slot.num_minutes();
    if slot_minutes <= 0 {
        return vec![];
    }

    // Round the start up to the next grid boundary in local time.
    let mut cursor = window_start;
    {
        let local = cursor.with_timezone(&tz);
        let from_midnight = i64::from(local.hour()) * 60 + i64::from(local.minute());
        let rem = from_midnight % slot_minutes;
        if rem != 0 || local.second() != 0 {
            cursor += Duration::minutes(slot_minutes - rem) - Duration::seconds(i64::from(local.second()));
        }
    }

    let mut slots = Vec::new();
    while cursor + slot <= window_end {
        let slot_end = cursor + slot;
        if cursor < now {
            cursor = slot_end;
            continue;
        }
        let overlaps = merged
            .iter()
            .any(|(busy_start, busy_end)| cursor < *busy_end && slot_end > *busy_start);
        if !overlaps {
            slots.push(cursor.with_timezone(&tz).format("%H:%M").to_string());
        }
        cursor = slot_end;
    }
    slots
}
