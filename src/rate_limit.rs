//! Per-route, per-client-address request-rate ceilings.
//!
//! Fixed-window counters held in managed state, checked by a typed request
//! guard before any handler logic runs, so an over-limit request can never
//! mutate application state.

use std::{
    collections::HashMap,
    marker::PhantomData,
    net::{IpAddr, Ipv4Addr},
    sync::Mutex,
    time::{Duration, Instant},
};

use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};

use crate::error::Error;

/// A named request-rate policy: at most `MAX` requests per `WINDOW_SECS`
/// seconds from a single client address.
pub trait LimitPolicy {
    const NAME: &'static str;
    const MAX: u32;
    const WINDOW_SECS: u64;
}

pub struct RegisterLimit;
impl LimitPolicy for RegisterLimit {
    const NAME: &'static str = "register";
    const MAX: u32 = 5;
    const WINDOW_SECS: u64 = 60;
}

pub struct VerifyOtpLimit;
impl LimitPolicy for VerifyOtpLimit {
    const NAME: &'static str = "verify-otp";
    const MAX: u32 = 10;
    const WINDOW_SECS: u64 = 60;
}

pub struct LoginLimit;
impl LimitPolicy for LoginLimit {
    const NAME: &'static str = "login";
    const MAX: u32 = 10;
    const WINDOW_SECS: u64 = 60;
}

pub struct ResendOtpLimit;
impl LimitPolicy for ResendOtpLimit {
    const NAME: &'static str = "resend-otp";
    const MAX: u32 = 3;
    const WINDOW_SECS: u64 = 60;
}

pub struct VoteLimit;
impl LimitPolicy for VoteLimit {
    const NAME: &'static str = "vote";
    const MAX: u32 = 1;
    const WINDOW_SECS: u64 = 60;
}

/// The ceiling across all limited routes for a single client.
const GLOBAL_NAME: &str = "global";
const GLOBAL_MAX: u32 = 100;
const GLOBAL_WINDOW_SECS: u64 = 3600;

/// Evict expired windows once the table grows past this many entries.
const EVICTION_THRESHOLD: usize = 1024;

struct Window {
    start: Instant,
    ttl: Duration,
    count: u32,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.start) >= self.ttl
    }
}

/// In-memory fixed-window counters, keyed by (policy, client address).
pub struct RateLimiter {
    windows: Mutex<HashMap<(&'static str, IpAddr), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or refuse a request from `client` under policy `P`, also
    /// enforcing the global per-client ceiling. Refusal counts nothing.
    pub fn check<P: LimitPolicy>(&self, client: IpAddr) -> Result<(), Error> {
        self.check_at::<P>(client, Instant::now())
    }

    fn check_at<P: LimitPolicy>(&self, client: IpAddr, now: Instant) -> Result<(), Error> {
        let mut windows = self.windows.lock().unwrap(); // Poisoned only by a prior panic.

        let global_full = window_full(
            &windows,
            (GLOBAL_NAME, client),
            GLOBAL_MAX,
            now,
        );
        let policy_full = window_full(&windows, (P::NAME, client), P::MAX, now);
        if global_full || policy_full {
            return Err(Error::RateLimited(format!(
                "Too many {} requests from {client}",
                P::NAME
            )));
        }

        bump(
            &mut windows,
            (GLOBAL_NAME, client),
            Duration::from_secs(GLOBAL_WINDOW_SECS),
            now,
        );
        bump(
            &mut windows,
            (P::NAME, client),
            Duration::from_secs(P::WINDOW_SECS),
            now,
        );

        if windows.len() > EVICTION_THRESHOLD {
            windows.retain(|_, window| !window.expired(now));
        }

        Ok(())
    }

    /// Admit or refuse a request from `client` on a route with no dedicated
    /// policy; only the global per-client ceiling applies.
    pub fn check_global(&self, client: IpAddr) -> Result<(), Error> {
        self.check_global_at(client, Instant::now())
    }

    fn check_global_at(&self, client: IpAddr, now: Instant) -> Result<(), Error> {
        let mut windows = self.windows.lock().unwrap(); // Poisoned only by a prior panic.

        if window_full(&windows, (GLOBAL_NAME, client), GLOBAL_MAX, now) {
            return Err(Error::RateLimited(format!(
                "Too many requests from {client}"
            )));
        }
        bump(
            &mut windows,
            (GLOBAL_NAME, client),
            Duration::from_secs(GLOBAL_WINDOW_SECS),
            now,
        );

        if windows.len() > EVICTION_THRESHOLD {
            windows.retain(|_, window| !window.expired(now));
        }

        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn window_full(
    windows: &HashMap<(&'static str, IpAddr), Window>,
    key: (&'static str, IpAddr),
    max: u32,
    now: Instant,
) -> bool {
    windows
        .get(&key)
        .map(|window| !window.expired(now) && window.count >= max)
        .unwrap_or(false)
}

fn bump(
    windows: &mut HashMap<(&'static str, IpAddr), Window>,
    key: (&'static str, IpAddr),
    ttl: Duration,
    now: Instant,
) {
    let window = windows.entry(key).or_insert(Window {
        start: now,
        ttl,
        count: 0,
    });
    if window.expired(now) {
        window.start = now;
        window.count = 0;
    }
    window.count += 1;
}

/// A request guard that admits the request under policy `P`.
///
/// Declared as the first argument of a route so the check runs before any
/// other guard or handler logic.
pub struct RateLimit<P>(PhantomData<P>);

#[rocket::async_trait]
impl<'r, P: LimitPolicy> FromRequest<'r> for RateLimit<P> {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let limiter = req.guard::<&State<RateLimiter>>().await.unwrap(); // Always managed.

        // Clients with no discernible address share one bucket.
        let client = req
            .client_ip()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        match limiter.check::<P>(client) {
            Ok(()) => request::Outcome::Success(Self(PhantomData)),
            Err(err) => request::Outcome::Failure((Status::TooManyRequests, err)),
        }
    }
}

/// A request guard enforcing only the global per-client ceiling.
///
/// Routes without a dedicated policy still carry this guard, so every
/// route counts against, and is bounded by, the same global window.
pub struct GlobalRateLimit;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for GlobalRateLimit {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let limiter = req.guard::<&State<RateLimiter>>().await.unwrap(); // Always managed.

        let client = req
            .client_ip()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        match limiter.check_global(client) {
            Ok(()) => request::Outcome::Success(Self),
            Err(err) => request::Outcome::Failure((Status::TooManyRequests, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))
    }

    #[test]
    fn admits_up_to_max_then_refuses() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..RegisterLimit::MAX {
            limiter.check_at::<RegisterLimit>(client(), now).unwrap();
        }
        assert!(matches!(
            limiter.check_at::<RegisterLimit>(client(), now),
            Err(Error::RateLimited(_))
        ));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..VoteLimit::MAX {
            limiter.check_at::<VoteLimit>(client(), now).unwrap();
        }
        assert!(limiter.check_at::<VoteLimit>(client(), now).is_err());

        let later = now + Duration::from_secs(VoteLimit::WINDOW_SECS);
        assert!(limiter.check_at::<VoteLimit>(client(), later).is_ok());
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        let other = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));
        for _ in 0..ResendOtpLimit::MAX {
            limiter.check_at::<ResendOtpLimit>(client(), now).unwrap();
        }
        assert!(limiter.check_at::<ResendOtpLimit>(client(), now).is_err());
        assert!(limiter.check_at::<ResendOtpLimit>(other, now).is_ok());
    }

    #[test]
    fn policies_are_limited_independently() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..VoteLimit::MAX {
            limiter.check_at::<VoteLimit>(client(), now).unwrap();
        }
        assert!(limiter.check_at::<VoteLimit>(client(), now).is_err());
        assert!(limiter.check_at::<LoginLimit>(client(), now).is_ok());
    }

    #[test]
    fn global_ceiling_catches_spread_out_requests() {
        let limiter = RateLimiter::new();
        let mut now = Instant::now();
        // Stay under the per-policy bound but hammer the global one, keeping
        // the whole run inside a single global window.
        let mut admitted = 0;
        for _ in 0..20 {
            for _ in 0..VerifyOtpLimit::MAX {
                if limiter.check_at::<VerifyOtpLimit>(client(), now).is_ok() {
                    admitted += 1;
                } else {
                    break;
                }
            }
            now += Duration::from_secs(VerifyOtpLimit::WINDOW_SECS);
        }
        assert_eq!(admitted, GLOBAL_MAX);
    }

    #[test]
    fn unguarded_routes_share_the_global_ceiling() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..GLOBAL_MAX {
            limiter.check_global_at(client(), now).unwrap();
        }
        assert!(matches!(
            limiter.check_global_at(client(), now),
            Err(Error::RateLimited(_))
        ));
        // The exhausted ceiling refuses policy-guarded requests too.
        assert!(matches!(
            limiter.check_at::<LoginLimit>(client(), now),
            Err(Error::RateLimited(_))
        ));
    }

    #[test]
    fn policy_requests_count_toward_global_only_checks() {
        let limiter = RateLimiter::new();
        let mut now = Instant::now();
        // Fill all but one slot of the global window through a guarded
        // policy, hopping windows to stay under the per-policy bound.
        let mut admitted = 0;
        while admitted < GLOBAL_MAX - 1 {
            for _ in 0..LoginLimit::MAX {
                if admitted == GLOBAL_MAX - 1 {
                    break;
                }
                limiter.check_at::<LoginLimit>(client(), now).unwrap();
                admitted += 1;
            }
            now += Duration::from_secs(LoginLimit::WINDOW_SECS);
        }
        assert!(limiter.check_global_at(client(), now).is_ok());
        assert!(limiter.check_global_at(client(), now).is_err());
    }

    #[test]
    fn refused_requests_do_not_consume_budget() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..VoteLimit::MAX {
            limiter.check_at::<VoteLimit>(client(), now).unwrap();
        }
        for _ in 0..10 {
            assert!(limiter.check_at::<VoteLimit>(client(), now).is_err());
        }
        // The refusals above must not have extended or refilled the window.
        let later = now + Duration::from_secs(VoteLimit::WINDOW_SECS);
        assert!(limiter.check_at::<VoteLimit>(client(), later).is_ok());
    }

    #[test]
    fn eviction_drops_expired_windows() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for i in 0..=EVICTION_THRESHOLD {
            let client = IpAddr::V4(Ipv4Addr::new(10, 0, (i / 256) as u8, (i % 256) as u8));
            limiter.check_at::<LoginLimit>(client, now).unwrap();
        }
        let later = now + Duration::from_secs(GLOBAL_WINDOW_SECS);
        limiter.check_at::<LoginLimit>(client(), later).unwrap();
        let windows = limiter.windows.lock().unwrap();
        // Everything from the first burst expired and was evicted.
        assert!(windows.len() <= 2);
    }
}
