use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::api_manager::ApiManager;
use crate::config::Config;
use crate::database::{Database, StoredEvent};
use crate::places::{PlaceDetails, PlacesService};
use crate::plan_parser::{ParsedEvent, PlanParser};
use crate::time_parse;

/// Where the user stands against today's plan
#[derive(Debug, Clone)]
pub enum ScheduleStatus {
    /// No plan has been submitted for today
    NoPlan,
    /// Everything incomplete is still ahead (or currently underway)
    OnTrack { next: Option<StoredEvent> },
    /// An incomplete event's end time plus the grace period has passed
    Behind { event: StoredEvent, minutes_late: i64 },
    /// Every event is checked off
    Done,
}

/// Orchestrates the plan pipeline: LLM parse, place enrichment, time
/// normalization, persistence, and schedule tracking.
#[derive(Clone)]
pub struct ItineraryService {
    config: Arc<RwLock<Config>>,
    database: Database,
    parser: PlanParser,
    api_manager: ApiManager,
}

impl ItineraryService {
    pub fn new(config: Arc<RwLock<Config>>, database: Database) -> Self {
        let daily_limit = config.read().ai.daily_call_limit;
        let api_manager = ApiManager::new(daily_limit);
        let parser = PlanParser::new(config.clone(), api_manager.clone());

        Self {
            config,
            database,
            parser,
            api_manager,
        }
    }

    pub fn api_manager(&self) -> &ApiManager {
        &self.api_manager
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn places_service(&self) -> Option<PlacesService> {
        let config = self.config.read();
        if !config.places.enabled {
            debug!("Place enrichment disabled in config");
            return None;
        }
        match config.get_maps_api_key() {
            Some(key) => Some(PlacesService::new(key, config.places.photo_max_width)),
            None => {
                debug!("No Google Maps API key configured, skipping place enrichment");
                None
            }
        }
    }

    /// Today's date in the home timezone, as stored in the plans table
    pub fn plan_date(&self, now: DateTime<Utc>) -> String {
        let home_tz = self.config.read().get_timezone();
        now.with_timezone(&home_tz).format("%Y-%m-%d").to_string()
    }

    /// Build today's itinerary from free text and persist it, replacing
    /// any previous plan for the day.
    pub async fn build_itinerary(&self, plan_text: &str) -> Result<Vec<StoredEvent>> {
        let now = Utc::now();
        let plan_date = self.plan_date(now);
        let (home_tz, default_duration, travel_mode) = {
            let config = self.config.read();
            (config.get_timezone(), config.get_default_event_duration(), config.get_travel_mode())
        };
        let today = now.with_timezone(&home_tz).date_naive();

        let parsed = self.parser.parse_plan(plan_text).await
            .context("Failed to parse plan text")?;
        if parsed.is_empty() {
            return Err(anyhow!("No events found in plan text"));
        }

        let places = self.places_service();
        let mut events = Vec::with_capacity(parsed.len());
        let mut previous_coords: Option<(f64, f64)> = None;

        for (position, parsed_event) in parsed.iter().enumerate() {
            let place = match &places {
                Some(service) => match service.find_place(&parsed_event.location).await {
                    Ok(place) => place,
                    Err(e) => {
                        warn!("Place lookup failed for '{}': {}", parsed_event.location, e);
                        None
                    }
                },
                None => None,
            };

            let event_tz = self.resolve_event_timezone(&places, place.as_ref(), home_tz, now).await;

            let start_naive = time_parse::parse_time_string(&parsed_event.start_time, today)
                .with_context(|| format!("Invalid start time for '{}'", parsed_event.activity))?;
            let end_naive = time_parse::derive_end_time(
                start_naive,
                parsed_event.end_time.as_deref(),
                default_duration,
            );

            let start_utc = time_parse::local_to_utc(start_naive, event_tz);
            let end_utc = time_parse::local_to_utc(end_naive, event_tz);

            let coords = place.as_ref().map(|p| (p.latitude, p.longitude));
            let travel_minutes = match (&places, previous_coords, coords) {
                (Some(service), Some(from), Some(to)) => {
                    match service.travel_minutes(from, to, &travel_mode).await {
                        Ok(minutes) => minutes,
                        Err(e) => {
                            warn!("Travel time lookup failed for '{}': {}", parsed_event.activity, e);
                            None
                        }
                    }
                }
                _ => None,
            };
            previous_coords = coords.or(previous_coords);

            events.push(build_stored_event(
                position as i64,
                parsed_event,
                place,
                event_tz,
                start_utc.timestamp(),
                end_utc.timestamp(),
                travel_minutes,
            ));
        }

        self.database.replace_plan(&plan_date, plan_text, &events)
            .context("Failed to store itinerary")?;
        info!("Stored itinerary for {} with {} events", plan_date, events.len());

        self.database.get_events_for_date(&plan_date)
            .context("Failed to load stored itinerary")
    }

    async fn resolve_event_timezone(
        &self,
        places: &Option<PlacesService>,
        place: Option<&PlaceDetails>,
        home_tz: Tz,
        now: DateTime<Utc>,
    ) -> Tz {
        let (Some(service), Some(place)) = (places, place) else {
            return home_tz;
        };

        match service.resolve_timezone(place.latitude, place.longitude, now.timestamp()).await {
            Ok(Some(tz)) => tz,
            Ok(None) => home_tz,
            Err(e) => {
                warn!("Timezone lookup failed for place {}: {}", place.place_id, e);
                home_tz
            }
        }
    }

    /// Today's events in itinerary order
    pub fn todays_events(&self, now: DateTime<Utc>) -> Result<Vec<StoredEvent>> {
        let plan_date = self.plan_date(now);
        self.database.get_events_for_date(&plan_date)
            .context("Failed to load today's events")
    }

    /// Mark the event at `position` in today's itinerary complete
    pub fn complete_event(&self, position: i64, now: DateTime<Utc>) -> Result<bool> {
        let plan_date = self.plan_date(now);
        self.database.mark_event_completed(&plan_date, position)
            .context("Failed to mark event completed")
    }

    /// Derive schedule status from today's stored plan.
    ///
    /// The user is behind when any incomplete event's end time plus the
    /// grace period has passed; the earliest such event is reported.
    pub fn schedule_status(&self, now: DateTime<Utc>) -> Result<ScheduleStatus> {
        let events = self.todays_events(now)?;
        if events.is_empty() {
            return Ok(ScheduleStatus::NoPlan);
        }

        if events.iter().all(|event| event.completed) {
            return Ok(ScheduleStatus::Done);
        }

        let grace_seconds = self.config.read().get_late_grace().num_seconds();

        let overdue = events.iter()
            .filter(|event| !event.completed && event.end_time + grace_seconds < now.timestamp())
            .min_by_key(|event| event.start_time);

        if let Some(event) = overdue {
            let minutes_late = (now.timestamp() - event.end_time) / 60;
            return Ok(ScheduleStatus::Behind {
                event: event.clone(),
                minutes_late,
            });
        }

        let next = events.iter()
            .find(|event| !event.completed && event.start_time > now.timestamp())
            .cloned();

        Ok(ScheduleStatus::OnTrack { next })
    }
}

fn build_stored_event(
    position: i64,
    parsed: &ParsedEvent,
    place: Option<PlaceDetails>,
    event_tz: Tz,
    start_time: i64,
    end_time: i64,
    travel_minutes: Option<i64>,
) -> StoredEvent {
    StoredEvent {
        id: 0, // Set by the database
        plan_id: 0,
        position,
        title: parsed.activity.clone(),
        location: parsed.location.clone(),
        start_time,
        end_time,
        timezone: event_tz.name().to_string(),
        place_id: place.as_ref().map(|p| p.place_id.clone()),
        photo_url: place.as_ref().and_then(|p| p.photo_url.clone()),
        latitude: place.as_ref().map(|p| p.latitude),
        longitude: place.as_ref().map(|p| p.longitude),
        travel_minutes,
        completed: false,
    }
}
