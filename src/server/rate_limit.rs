//! Per-client request quota for the JSON API
//!
//! Clients are keyed by the peer address of the connection. With
//! `trust_proxy` set, the first `x-forwarded-for` entry takes precedence.

use crate::config::RateLimitConfig;
use crate::core::error::{AppResult, RequestError};
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ApiRateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    trust_proxy: bool,
}

impl ApiRateLimit {
    /// `max_requests` per `window_secs`, all of which may be spent at once
    pub fn new(config: &RateLimitConfig) -> Self {
        let max = NonZeroU32::new(config.max_requests).unwrap_or(NonZeroU32::MIN);
        let replenish = Duration::from_secs(config.window_secs.max(1)) / max.get();
        let quota = Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(max))
            .allow_burst(max);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            trust_proxy: config.trust_proxy,
        }
    }

    pub fn check(&self, client: IpAddr) -> Result<(), RequestError> {
        self.limiter
            .check_key(&client)
            .map_err(|_| RequestError::TooManyRequests)
    }
}

fn forwarded_ip(req: &Request) -> Option<IpAddr> {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
}

fn client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    let forwarded = if trust_proxy { forwarded_ip(req) } else { None };

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn limit_requests(
    State(limit): State<ApiRateLimit>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let client = client_ip(&req, limit.trust_proxy);
    if let Err(e) = limit.check(client) {
        tracing::warn!(%client, "rate limit exceeded");
        return Err(e.into());
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn config(max_requests: u32, trust_proxy: bool) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window_secs: 3600,
            trust_proxy,
        }
    }

    fn request(forwarded: Option<&str>, peer: Option<&str>) -> Request {
        let mut builder = Request::builder();
        if let Some(forwarded) = forwarded {
            builder = builder.header("x-forwarded-for", forwarded);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn test_quota_is_per_client() {
        let limit = ApiRateLimit::new(&config(2, false));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limit.check(a).is_ok());
        assert!(limit.check(a).is_ok());
        assert!(matches!(limit.check(a), Err(RequestError::TooManyRequests)));
        assert!(limit.check(b).is_ok());
    }

    #[test]
    fn test_client_ip_uses_peer_address() {
        let req = request(Some("203.0.113.7, 10.0.0.1"), Some("198.51.100.4:50000"));
        assert_eq!(client_ip(&req, false), "198.51.100.4".parse::<IpAddr>().unwrap());

        let req = request(Some("203.0.113.7"), None);
        assert_eq!(client_ip(&req, false), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_client_ip_behind_trusted_proxy() {
        let req = request(Some("203.0.113.7, 10.0.0.1"), Some("10.0.0.1:50000"));
        assert_eq!(client_ip(&req, true), "203.0.113.7".parse::<IpAddr>().unwrap());

        let req = request(Some("garbage"), Some("10.0.0.1:50000"));
        assert_eq!(client_ip(&req, true), "10.0.0.1".parse::<IpAddr>().unwrap());
    }
}
