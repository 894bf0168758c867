use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

pub type ClientRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// Allows `max_requests` per client at once, refilling one slot every
/// `window / max_requests`.
pub fn build_limiter(window: Duration, max_requests: u32) -> ClientRateLimiter {
    let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(window / burst.get())
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);
    RateLimiter::keyed(quota)
}

/// Periodically forgets clients whose bucket has refilled completely, so the
/// key map only holds clients seen within the last window.
pub fn spawn_limiter_cleanup(
    limiter: Arc<ClientRateLimiter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every.max(Duration::from_millis(1)));
        loop {
            tick.tick().await;
            limiter.retain_recent();
            limiter.shrink_to_fit();
            debug!("Rate limiter tracking {} clients", limiter.len());
        }
    })
}

/// Whole seconds a client should wait, rounded up.
fn retry_after_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

/// Requests without connection info (e.g. in-process tests) share one bucket.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn limit_by_client(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&req);
    if let Err(not_until) = state.limiter.check_key(&ip) {
        let wait = not_until.wait_time_from(DefaultClock::default().now());
        warn!("Rate limit exceeded for {ip}, retry in {wait:?}");
        return Err(AppError::RateLimited {
            limit: not_until.quota().burst_size().get(),
            retry_after_secs: retry_after_secs(wait),
        });
    }
    Ok(next.run(req).await)
}
