//! Sliding-window rate limiter with a fixed ban period.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request is counted and may proceed.
    Allowed,
    /// The client is banned.
    Banned {
        /// Time left on the ban.
        retry_after: Duration,
        /// True when this very request triggered the ban.
        newly_banned: bool,
    },
}

impl RateDecision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }

    /// Remaining ban in whole seconds, rounded up so an active ban never reads as 0.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateDecision::Allowed => None,
            RateDecision::Banned { retry_after, .. } => Some(ceil_secs(*retry_after)),
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Per-client request history.
#[derive(Debug, Default)]
struct ClientRecord {
    window: VecDeque<Instant>,
    banned_until: Option<Instant>,
}

impl ClientRecord {
    fn active_ban(&self, now: Instant) -> Option<Instant> {
        self.banned_until.filter(|&until| now < until)
    }

    fn last_seen(&self) -> Option<Instant> {
        self.window.back().copied()
    }
}

/// A banned client and the time left on its ban.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    /// Client address.
    pub client: IpAddr,
    /// Time left on the ban.
    pub remaining: Duration,
}

impl BanEntry {
    /// Remaining ban in whole seconds, rounded up.
    pub fn remaining_secs(&self) -> u64 {
        ceil_secs(self.remaining)
    }
}

/// Tracks recent requests per client address and bans clients that exceed the window limit.
///
/// Records sit in a sharded concurrent map; each check holds only the shard lock of
/// its own client, so the whole prune/count/append sequence is atomic per client.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    ban: Duration,
    clients: DashMap<IpAddr, ClientRecord>,
}

impl RateLimiter {
    /// Allow `max_requests` per `window`; exceeding it bans the client for `ban`.
    pub fn new(window: Duration, max_requests: usize, ban: Duration) -> Self {
        Self {
            window,
            max_requests,
            ban,
            clients: DashMap::new(),
        }
    }

    /// Build a limiter from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_requests, config.ban())
    }

    /// Check and count a request from `client` at the current time.
    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Check and count a request from `client` at `now`.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        let mut record = self.clients.entry(client).or_default();

        if let Some(until) = record.active_ban(now) {
            return RateDecision::Banned {
                retry_after: until - now,
                newly_banned: false,
            };
        }
        record.banned_until = None;

        if let Some(cutoff) = now.checked_sub(self.window) {
            while record.window.front().is_some_and(|&ts| ts < cutoff) {
                record.window.pop_front();
            }
        }

        if record.window.len() >= self.max_requests {
            record.banned_until = Some(now + self.ban);
            tracing::warn!(
                client = %client,
                ban_secs = self.ban.as_secs(),
                "rate limit exceeded, banning client"
            );
            return RateDecision::Banned {
                retry_after: self.ban,
                newly_banned: true,
            };
        }

        record.window.push_back(now);
        RateDecision::Allowed
    }

    /// Drop records with no active ban and no request within `idle_for` of `now`.
    ///
    /// Returns the number of records removed.
    pub fn evict_idle(&self, now: Instant, idle_for: Duration) -> usize {
        let before = self.clients.len();
        self.clients.retain(|_, record| {
            if record.active_ban(now).is_some() {
                return true;
            }
            record
                .last_seen()
                .is_some_and(|seen| now.saturating_duration_since(seen) < idle_for)
        });
        before.saturating_sub(self.clients.len())
    }

    /// Number of clients with a record.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Clients whose ban is still running at `now`, longest remaining first.
    pub fn banned_clients(&self, now: Instant) -> Vec<BanEntry> {
        let mut bans: Vec<BanEntry> = self
            .clients
            .iter()
            .filter_map(|entry| {
                entry.active_ban(now).map(|until| BanEntry {
                    client: *entry.key(),
                    remaining: until - now,
                })
            })
            .collect();
        bans.sort_by(|a, b| b.remaining.cmp(&a.remaining));
        bans
    }
}
