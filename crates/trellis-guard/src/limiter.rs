//! Dual token-bucket rate limiter.
//!
//! Every rate-limited endpoint owns one server-side bucket, checked first,
//! and optionally a cache of per-client buckets keyed by a client
//! identifier. A negative configured rate means unbounded. Client bucket
//! entries live in a TTL cache; each access refreshes the TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use trellis_core::{Context, Problem};

use crate::identity::ClientIdentifier;
use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::types::{Outcome, Request};

/// Rate limiter configuration for one endpoint.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Server bucket refill rate, tokens per second. Negative = unbounded.
    pub token_rate: f64,
    /// Server bucket capacity.
    pub token_bucket_size: u32,
    /// Per-client refill rate. `None` disables client limiting.
    pub client_token_rate: Option<f64>,
    /// Per-client bucket capacity.
    pub client_token_bucket_size: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            token_rate: 500.0,
            token_bucket_size: 500,
            client_token_rate: None,
            client_token_bucket_size: 0,
        }
    }
}

/// A token bucket with continuous refill.
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens per second; `f64::INFINITY` admits everything.
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    refreshed: Instant,
}

impl TokenBucket {
    /// Creates a bucket. A negative rate is treated as unbounded.
    #[must_use]
    pub fn new(rate: f64, burst: u32) -> Self {
        let rate = if rate < 0.0 { f64::INFINITY } else { rate };
        Self {
            rate,
            burst: f64::from(burst),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                refreshed: Instant::now(),
            }),
        }
    }

    /// Takes one token if available.
    pub fn allow(&self) -> bool {
        if self.rate.is_infinite() {
            return true;
        }
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.refreshed).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.refreshed = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct ClientEntry {
    bucket: Arc<TokenBucket>,
    expires: Instant,
}

/// TTL cache of per-client buckets.
struct ClientBuckets {
    rate: f64,
    burst: u32,
    ttl: Duration,
    map: DashMap<String, ClientEntry>,
}

impl ClientBuckets {
    fn new(rate: f64, burst: u32) -> Self {
        // TTL = max(1s, 1/rate): a client's entry survives at least as long
        // as one token takes to accrue.
        let ttl = if rate > 0.0 && rate < 1.0 {
            Duration::from_secs_f64(1.0 / rate)
        } else {
            Duration::from_secs(1)
        };
        Self {
            rate,
            burst,
            ttl,
            map: DashMap::new(),
        }
    }

    /// Fetches the client's bucket, creating or recreating it when absent
    /// or expired, and refreshes its TTL.
    fn bucket(&self, client: &str) -> Arc<TokenBucket> {
        let now = Instant::now();
        let mut entry = self
            .map
            .entry(client.to_string())
            .or_insert_with(|| ClientEntry {
                bucket: Arc::new(TokenBucket::new(self.rate, self.burst)),
                expires: now + self.ttl,
            });
        if entry.expires <= now {
            entry.bucket = Arc::new(TokenBucket::new(self.rate, self.burst));
        }
        entry.expires = now + self.ttl;
        entry.bucket.clone()
    }
}

/// The per-endpoint rate limiter: a server bucket plus optional per-client
/// sub-limiters.
pub struct RateLimiter {
    server: TokenBucket,
    clients: Option<ClientBuckets>,
    identify: ClientIdentifier,
}

impl RateLimiter {
    /// Creates the limiter from configuration and a client identifier.
    #[must_use]
    pub fn new(config: &LimiterConfig, identify: ClientIdentifier) -> Self {
        let clients = config
            .client_token_rate
            .map(|rate| {
                let rate = if rate < 0.0 { f64::INFINITY } else { rate };
                ClientBuckets::new(rate, config.client_token_bucket_size)
            });
        Self {
            server: TokenBucket::new(config.token_rate, config.token_bucket_size),
            clients,
            identify,
        }
    }

    /// Admits or rejects a request: server bucket first, then the caller's
    /// client bucket.
    pub fn check(&self, ctx: &Context) -> Result<(), Problem> {
        if !self.server.allow() {
            return Err(Problem::rate_limited());
        }
        if let Some(clients) = &self.clients {
            let client = (self.identify)(ctx);
            if !clients.bucket(&client).allow() {
                return Err(Problem::rate_limited());
            }
        }
        Ok(())
    }
}

/// The rate-limiter interceptor. Sits inside the circuit breaker so 429
/// rejections never count against breaker statistics.
pub struct RateLimitInterceptor {
    limiter: Arc<RateLimiter>,
}

impl RateLimitInterceptor {
    /// Wraps a limiter instance.
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl Interceptor for RateLimitInterceptor {
    fn name(&self) -> &'static str {
        "rate-limiter"
    }

    fn around<'a>(
        &'a self,
        ctx: &'a mut Context,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            self.limiter.check(ctx)?;
            next.run(ctx, request).await
        })
    }
}
