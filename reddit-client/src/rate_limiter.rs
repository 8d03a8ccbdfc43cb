use brandscout_core::{CoreError, RedditConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl From<&RedditConfig> for RateLimitConfig {
    fn from(config: &RedditConfig) -> Self {
        Self {
            max_requests: config.requests_per_minute.max(1),
            time_window: Duration::from_secs(60),
            burst_allowance: config.burst.max(1),
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Takes tokens or reports how long until enough have refilled.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }
}

/// Process-wide request budget shared by every brand's scan.
#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.burst_allowance as usize));
        let token_bucket = TokenBucket::new(&config);

        Self {
            token_bucket,
            semaphore,
        }
    }

    pub async fn acquire_permit(&self) -> Result<RateLimitPermit, CoreError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal {
                message: "rate limiter closed".to_string(),
            })?;

        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    sleep(wait_time).await;
                }
            }
        }

        Ok(RateLimitPermit { _permit: permit })
    }
}

/// Held for the duration of one request.
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_token_bucket_basic() {
        let config = RateLimitConfig {
            max_requests: 10,
            time_window: Duration::from_secs(10),
            burst_allowance: 5,
        };

        let bucket = TokenBucket::new(&config);

        for _ in 0..5 {
            assert!(bucket.acquire(1.0).await.is_ok());
        }

        assert!(bucket.acquire(1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let config = RateLimitConfig {
            max_requests: 60, // 1 token per second
            time_window: Duration::from_secs(60),
            burst_allowance: 2,
        };

        let bucket = TokenBucket::new(&config);

        assert!(bucket.acquire(2.0).await.is_ok());
        assert!(bucket.acquire(1.0).await.is_err());

        sleep(Duration::from_millis(1100)).await;

        assert!(bucket.acquire(1.0).await.is_ok());
    }

    #[test]
    fn test_config_from_reddit_settings() {
        let reddit = RedditConfig {
            requests_per_minute: 30,
            burst: 3,
            ..RedditConfig::default()
        };
        let config = RateLimitConfig::from(&reddit);
        assert_eq!(config.max_requests, 30);
        assert_eq!(config.burst_allowance, 3);
        assert_eq!(config.time_window, Duration::from_secs(60));

        let zeroed = RateLimitConfig::from(&RedditConfig {
            requests_per_minute: 0,
            burst: 0,
            ..RedditConfig::default()
        });
        assert_eq!(zeroed.max_requests, 1);
        assert_eq!(zeroed.burst_allowance, 1);
    }

    #[tokio::test]
    async fn test_permit_is_released_on_drop() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 6000,
            time_window: Duration::from_secs(60),
            burst_allowance: 1,
        });

        let permit = limiter.acquire_permit().await.unwrap();
        assert!(timeout(Duration::from_millis(50), limiter.acquire_permit())
            .await
            .is_err());

        drop(permit);
        assert!(timeout(Duration::from_secs(1), limiter.acquire_permit())
            .await
            .is_ok());
    }
}
