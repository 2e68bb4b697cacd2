use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, warn, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParseCache {
    plan_hash: Option<String>,
    events_json: Option<String>,
    cached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiCallStats {
    calls_today: u32,
    daily_limit: u32,
    last_reset: DateTime<Utc>,
    total_calls: u64,
    total_tokens_used: u64,
}

/// Tracks the daily LLM call budget and caches the most recent plan parse
/// so resubmitting unchanged text does not spend budget.
#[derive(Clone)]
pub struct ApiManager {
    cache: Arc<RwLock<ParseCache>>,
    stats: Arc<RwLock<ApiCallStats>>,
}

impl ApiManager {
    pub fn new(daily_limit: u32) -> Self {
        let stats = ApiCallStats {
            calls_today: 0,
            daily_limit,
            last_reset: Utc::now(),
            total_calls: 0,
            total_tokens_used: 0,
        };

        Self {
            cache: Arc::new(RwLock::new(ParseCache {
                plan_hash: None,
                events_json: None,
                cached_at: None,
            })),
            stats: Arc::new(RwLock::new(stats)),
        }
    }

    /// Hash a plan's text for cache keying
    pub fn plan_hash(plan_text: &str) -> String {
        format!("{:x}", md5::compute(plan_text.trim().as_bytes()))
    }

    pub fn can_make_api_call(&self) -> bool {
        let mut stats = self.stats.write();

        // Reset daily counter if it's a new day
        let now = Utc::now();
        if now.date_naive() != stats.last_reset.date_naive() {
            info!("Daily API call counter reset. Used {} calls yesterday.", stats.calls_today);
            stats.calls_today = 0;
            stats.last_reset = now;
        }

        let can_call = stats.calls_today < stats.daily_limit;
        if !can_call {
            warn!("Daily API call limit reached ({}/{}). Using cached parses only.",
                  stats.calls_today, stats.daily_limit);
        }

        can_call
    }

    pub fn record_api_call(&self, tokens_used: u64) {
        let mut stats = self.stats.write();
        stats.calls_today += 1;
        stats.total_calls += 1;
        stats.total_tokens_used += tokens_used;

        debug!("API call recorded. Today: {}/{}, Total: {}, Tokens: {}",
               stats.calls_today, stats.daily_limit, stats.total_calls, stats.total_tokens_used);

        if stats.calls_today >= (stats.daily_limit as f32 * 0.8) as u32 {
            warn!("Approaching daily API limit: {}/{}", stats.calls_today, stats.daily_limit);
        }
    }

    /// Return the cached parse result if it matches the given plan hash
    pub fn get_cached_parse(&self, plan_hash: &str) -> Option<String> {
        let cache = self.cache.read();

        match (&cache.plan_hash, &cache.events_json) {
            (Some(hash), Some(events)) if hash == plan_hash => {
                debug!("Using cached parse for plan hash {}", plan_hash);
                Some(events.clone())
            }
            _ => {
                debug!("No cached parse for plan hash {}", plan_hash);
                None
            }
        }
    }

    pub fn cache_parse(&self, plan_hash: String, events_json: String) {
        debug!("Caching parse result for plan hash {}", plan_hash);
        let mut cache = self.cache.write();
        cache.plan_hash = Some(plan_hash);
        cache.events_json = Some(events_json);
        cache.cached_at = Some(Utc::now());
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        cache.plan_hash = None;
        cache.events_json = None;
        cache.cached_at = None;
        debug!("Parse cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_limit_enforcement() {
        let manager = ApiManager::new(200);

        // Should allow calls initially
        assert!(manager.can_make_api_call());

        // Exhaust daily limit
        {
            let mut stats = manager.stats.write();
            stats.calls_today = stats.daily_limit;
        }

        // Should deny further calls
        assert!(!manager.can_make_api_call());
    }

    #[test]
    fn test_parse_cache_keyed_on_hash() {
        let manager = ApiManager::new(200);
        let hash = ApiManager::plan_hash("lunch at noon");
        let events = r#"[{"activity":"Get lunch"}]"#.to_string();

        assert!(manager.get_cached_parse(&hash).is_none());

        manager.cache_parse(hash.clone(), events.clone());
        assert_eq!(manager.get_cached_parse(&hash), Some(events));

        // A different plan text must not hit the cache
        let other = ApiManager::plan_hash("museum at 2pm");
        assert!(manager.get_cached_parse(&other).is_none());
    }

    #[test]
    fn test_plan_hash_ignores_surrounding_whitespace() {
        assert_eq!(
            ApiManager::plan_hash("  lunch at noon  "),
            ApiManager::plan_hash("lunch at noon")
        );
    }

    #[test]
    fn test_clear_cache() {
        let manager = ApiManager::new(200);
        let hash = ApiManager::plan_hash("lunch");
        manager.cache_parse(hash.clone(), "[]".to_string());

        manager.clear_cache();
        assert!(manager.get_cached_parse(&hash).is_none());
    }
}
