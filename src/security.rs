/// Security module for the credential endpoints
/// Features:
/// - Rate limiting per peer address (credential stuffing / refresh hammering)
/// - Security headers for every response

use actix_web::{middleware::DefaultHeaders, HttpRequest};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::configuration::RateLimitSettings;
use crate::error::AppError;

/// Simple token bucket rate limiter implementation
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: u32,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(capacity: u32, requests_per_minute: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
            capacity,
            refill_rate: requests_per_minute as f64 / 60.0,
        }
    }

    fn try_take_token(&mut self) -> bool {
        let elapsed_secs = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed_secs * self.refill_rate).min(self.capacity as f64);
        self.last_refill = Instant::now();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// How often idle buckets are swept from the map
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// A bucket untouched this long has refilled completely, so dropping it
/// changes nothing for its client
const IDLE_AFTER: Duration = Duration::from_secs(60);

/// Rate limiter - one bucket per client key
pub struct RateLimiter {
    settings: RateLimitSettings,
    sweep_interval: Duration,
    idle_after: Duration,
    buckets: Mutex<(HashMap<String, TokenBucket>, Instant)>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            sweep_interval: SWEEP_INTERVAL,
            idle_after: IDLE_AFTER,
            buckets: Mutex::new((HashMap::new(), Instant::now())),
        }
    }

    /// Key a request by its TCP peer address
    ///
    /// Forwarding headers are client-controlled, so they are only honoured
    /// when `trust_forwarded_headers` says a proxy rewrites them.
    pub fn client_key(&self, req: &HttpRequest) -> String {
        if self.settings.trust_forwarded_headers {
            if let Some(ip) = req.connection_info().realip_remote_addr() {
                return ip.to_string();
            }
        }

        req.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Take one request from the caller's bucket
    pub fn check_request(&self, req: &HttpRequest) -> Result<(), AppError> {
        self.check(&self.client_key(req))
    }

    /// Take one request from the client's bucket
    ///
    /// # Errors
    /// `AppError::RateLimited` once the client exhausted its budget
    pub fn check(&self, client_key: &str) -> Result<(), AppError> {
        if !self.settings.enabled {
            return Ok(());
        }

        // A poisoned lock only means another thread panicked mid-update;
        // the counters are still usable.
        let mut guard = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (buckets, last_sweep) = &mut *guard;

        if last_sweep.elapsed() >= self.sweep_interval {
            let idle_after = self.idle_after;
            buckets.retain(|_, bucket| bucket.last_refill.elapsed() < idle_after);
            *last_sweep = Instant::now();
        }

        let requests_per_minute = self.settings.requests_per_minute;
        let bucket = buckets
            .entry(client_key.to_string())
            .or_insert_with(|| TokenBucket::new(requests_per_minute, requests_per_minute));

        if bucket.try_take_token() {
            Ok(())
        } else {
            tracing::warn!(client = client_key, requests_per_minute, "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
    }

    #[cfg(test)]
    fn with_sweep(mut self, sweep_interval: Duration, idle_after: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self.idle_after = idle_after;
        self
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .0
            .len()
    }
}

/// Security headers added to every response
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
        .add(("Referrer-Policy", "no-referrer"))
        .add(("Cache-Control", "no-store"))
        .add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains",
        ))
}
