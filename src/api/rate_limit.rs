use log::{debug, warn};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sliding-window request ceiling with a minimum spacing between requests.
#[derive(Debug)]
pub struct RateLimiter {
    requests: Mutex<VecDeque<Instant>>,
    max_requests: u32,
    window: Duration,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, min_interval: Duration) -> Self {
        Self {
            requests: Mutex::new(VecDeque::new()),
            max_requests: max_requests.max(1),
            window,
            min_interval,
        }
    }

    /// Records a request if one is allowed right now; otherwise returns how long to wait.
    pub async fn check(&self) -> Result<(), Duration> {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();

        while let Some(&oldest) = requests.front() {
            if now.duration_since(oldest) >= self.window {
                requests.pop_front();
            } else {
                break;
            }
        }

        if let Some(&last) = requests.back() {
            let since_last = now.duration_since(last);
            if since_last < self.min_interval {
                return Err(self.min_interval - since_last);
            }
        }

        if requests.len() >= self.max_requests as usize {
            let oldest = requests.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        requests.push_back(now);
        Ok(())
    }

    /// Waits until a request slot is free and claims it.
    pub async fn acquire(&self) {
        loop {
            match self.check().await {
                Ok(()) => return,
                Err(wait) => {
                    if wait > self.min_interval {
                        warn!("Request ceiling reached, waiting {}ms", wait.as_millis());
                    } else {
                        debug!("Throttling request for {}ms", wait.as_millis());
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit_ceiling() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60), Duration::ZERO);

        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_ok());
        let wait = limiter.check().await.unwrap_err();
        assert!(wait <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_min_interval_spacing() {
        let limiter = RateLimiter::new(100, Duration::from_secs(60), Duration::from_millis(50));

        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_err());

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
