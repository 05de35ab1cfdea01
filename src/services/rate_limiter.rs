//! Login throttling
//!
//! - A username is locked for 15 minutes once it collects 5 failed logins
//!   inside a 15 minute window.
//! - An IP address may make at most 10 login requests per minute.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

const MAX_FAILURES: usize = 5;
const FAILURE_WINDOW_MINUTES: i64 = 15;
const MAX_IP_REQUESTS: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

#[derive(Default)]
pub struct LoginRateLimiter {
    failures: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    ip_requests: RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usernames are compared case-insensitively
    pub async fn is_username_limited(&self, username: &str) -> bool {
        let cutoff = Utc::now() - Duration::minutes(FAILURE_WINDOW_MINUTES);
        let mut failures = self.failures.write().await;
        match failures.get_mut(&username.to_lowercase()) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= MAX_FAILURES
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, username: &str) {
        self.failures
            .write()
            .await
            .entry(username.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear(&self, username: &str) {
        self.failures.write().await.remove(&username.to_lowercase());
    }

    /// Count this request against the IP and report whether it is over the limit
    pub async fn check_ip(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let cutoff = now - Duration::minutes(IP_WINDOW_MINUTES);
        let mut requests = self.ip_requests.write().await;
        let times = requests.entry(ip).or_default();
        times.retain(|t| *t > cutoff);
        if times.len() >= MAX_IP_REQUESTS {
            return true;
        }
        times.push(now);
        false
    }

    /// Drop stale bookkeeping
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let failure_cutoff = now - Duration::minutes(FAILURE_WINDOW_MINUTES);
        let ip_cutoff = now - Duration::minutes(IP_WINDOW_MINUTES);

        self.failures.write().await.retain(|_, times| {
            times.retain(|t| *t > failure_cutoff);
            !times.is_empty()
        });
        self.ip_requests.write().await.retain(|_, times| {
            times.retain(|t| *t > ip_cutoff);
            !times.is_empty()
        });
    }
}
