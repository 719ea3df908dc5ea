use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use std::{
    collections::{HashMap, VecDeque},
    net::{IpAddr, SocketAddr},
};

/// Requests that count against a quota
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    SubmitBill,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Quota {
    max: usize,
    per: Duration,
}

impl Action {
    fn per_ip(self) -> Quota {
        match self {
            Action::Login => Quota {
                max: 20,
                per: Duration::minutes(10),
            },
            Action::SubmitBill => Quota {
                max: 60,
                per: Duration::hours(1),
            },
        }
    }

    fn per_email(self) -> Quota {
        match self {
            Action::Login => Quota {
                max: 10,
                per: Duration::minutes(10),
            },
            Action::SubmitBill => Quota {
                max: 50,
                per: Duration::days(1),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Bucket {
    Ip(Action, IpAddr),
    Email(Action, String),
}

const FORGET_AFTER: Duration = Duration::seconds(2 * 24 * 3600);
const SWEEP_EVERY: Duration = Duration::seconds(10 * 60);

#[derive(Debug)]
struct Hits {
    at: VecDeque<DateTime<Utc>>,
    quota: Quota,
}

impl Hits {
    fn new(quota: Quota) -> Self {
        Self {
            at: VecDeque::new(),
            quota,
        }
    }

    fn expire(&mut self, now: DateTime<Utc>) {
        while self.at.front().is_some_and(|&t| now - t >= self.quota.per) {
            self.at.pop_front();
        }
    }

    fn has_room(&mut self, now: DateTime<Utc>) -> bool {
        self.expire(now);
        self.at.len() < self.quota.max
    }

    fn last(&self) -> Option<DateTime<Utc>> {
        self.at.back().copied()
    }
}

/// Counts logins and bill submissions per client IP and per employee email.
/// A request is refused when either count is used up; refused requests are
/// not counted.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: HashMap<Bucket, Hits>,
    swept_at: DateTime<Utc>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            swept_at: Utc::now(),
        }
    }

    pub fn check(&mut self, action: Action, ip: IpAddr, email: &str) -> bool {
        self.check_at(action, ip, email, Utc::now())
    }

    fn check_at(&mut self, action: Action, ip: IpAddr, email: &str, now: DateTime<Utc>) -> bool {
        self.sweep(now);

        let keys = [
            (Bucket::Ip(action, ip), action.per_ip()),
            (
                Bucket::Email(action, email.trim().to_lowercase()),
                action.per_email(),
            ),
        ];
        let allowed = keys.iter().all(|(key, _)| {
            self.buckets
                .get_mut(key)
                .is_none_or(|hits| hits.has_room(now))
        });
        if allowed {
            for (key, quota) in keys {
                self.buckets
                    .entry(key)
                    .or_insert_with(|| Hits::new(quota))
                    .at
                    .push_back(now);
            }
        }
        allowed
    }

    fn sweep(&mut self, now: DateTime<Utc>) {
        if now - self.swept_at < SWEEP_EVERY {
            return;
        }
        self.swept_at = now;
        self.buckets
            .retain(|_, hits| hits.last().is_some_and(|t| now - t < FORGET_AFTER));
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RealIp(pub IpAddr);

impl<S> FromRequestParts<S> for RealIp
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // behind a proxy the client is the first X-Forwarded-For entry
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if let Some(ip) = forwarded {
            return Ok(RealIp(ip));
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| RealIp(addr.ip()))
            .ok_or((StatusCode::BAD_REQUEST, "No request IP"))
    }
}
