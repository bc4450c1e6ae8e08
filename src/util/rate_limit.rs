//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max messages of any kind per second, per session
pub const MESSAGE_RATE_LIMIT: u32 = 20;

/// Max create/join attempts per second, per session
pub const LOBBY_RATE_LIMIT: u32 = 3;

/// Per-session rate limiter state
#[derive(Clone)]
pub struct SessionRateLimiter {
    message_limiter: Arc<Limiter>,
    lobby_limiter: Arc<Limiter>,
}

impl SessionRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(MESSAGE_RATE_LIMIT, LOBBY_RATE_LIMIT)
    }

    pub fn with_limits(messages_per_second: u32, lobby_per_second: u32) -> Self {
        Self {
            message_limiter: create_limiter(messages_per_second),
            lobby_limiter: create_limiter(lobby_per_second),
        }
    }

    /// Check if an incoming message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.message_limiter.check().is_ok()
    }

    /// Check if a create/join attempt is allowed
    pub fn check_lobby(&self) -> bool {
        self.lobby_limiter.check().is_ok()
    }
}

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_refused() {
        let limiter = SessionRateLimiter::with_limits(2, 1);
        assert!(limiter.check_message());
        assert!(limiter.check_message());
        assert!(!limiter.check_message());

        assert!(limiter.check_lobby());
        assert!(!limiter.check_lobby());
    }

    #[test]
    fn zero_quota_falls_back_to_one() {
        let limiter = create_limiter(0);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
