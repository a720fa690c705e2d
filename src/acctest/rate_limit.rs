//! Delay-based throttling for acceptance tests against the live API
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

pub const DEFAULT_OPERATION_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_TEST_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_BURST_LIMIT: u32 = 5;
pub const DEFAULT_BURST_DELAY: Duration = Duration::from_secs(5);
/// Recommended upper bound on concurrently running acceptance tests
pub const MAX_PARALLEL_TESTS: usize = 3;

static GLOBAL: LazyLock<RateLimiter> = LazyLock::new(RateLimiter::new);

#[derive(Debug)]
struct State {
    operation_delay: Duration,
    test_delay: Duration,
    cleanup_delay: Duration,
    burst_limit: u32,
    burst_delay: Duration,
    operation_count: u32,
    last_operation: Option<Instant>,
    enabled: bool,
}

/// Snapshot returned by [`RateLimiter::stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    pub enabled: bool,
    pub operation_count: u32,
    pub operation_delay: Duration,
    pub test_delay: Duration,
    pub cleanup_delay: Duration,
    pub burst_limit: u32,
    pub burst_delay: Duration,
}

/// Spaces out API operations so test runs stay under tenant rate limits.
///
/// The lock is held while sleeping, so concurrent callers queue up behind
/// each other.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<State>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// A limiter that never waits
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        Self {
            state: Mutex::new(State {
                operation_delay: DEFAULT_OPERATION_DELAY,
                test_delay: DEFAULT_TEST_DELAY,
                cleanup_delay: DEFAULT_CLEANUP_DELAY,
                burst_limit: DEFAULT_BURST_LIMIT,
                burst_delay: DEFAULT_BURST_DELAY,
                operation_count: 0,
                last_operation: None,
                enabled,
            }),
        }
    }

    /// Process-wide limiter shared by sweepers and cleanup
    pub fn global() -> &'static RateLimiter {
        &GLOBAL
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.state.lock().await.enabled = enabled;
        if enabled {
            info!("Rate limiting enabled");
        } else {
            info!("Rate limiting disabled");
        }
    }

    /// Override delays and burst limit; zero values keep the current setting
    pub async fn configure(
        &self,
        operation_delay: Duration,
        test_delay: Duration,
        cleanup_delay: Duration,
        burst_limit: u32,
    ) {
        let mut state = self.state.lock().await;
        if !operation_delay.is_zero() {
            state.operation_delay = operation_delay;
        }
        if !test_delay.is_zero() {
            state.test_delay = test_delay;
        }
        if !cleanup_delay.is_zero() {
            state.cleanup_delay = cleanup_delay;
        }
        if burst_limit > 0 {
            state.burst_limit = burst_limit;
        }
        info!(
            "Rate limiting configured: operation={:?}, test={:?}, cleanup={:?}, burst={}",
            state.operation_delay, state.test_delay, state.cleanup_delay, state.burst_limit
        );
    }

    pub async fn set_burst_delay(&self, delay: Duration) {
        self.state.lock().await.burst_delay = delay;
    }

    /// Call before each API operation
    pub async fn wait_for_operation(&self) {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return;
        }

        state.operation_count += 1;
        if state.operation_count >= state.burst_limit {
            info!(
                "Burst limit reached ({} operations), waiting {:?}",
                state.operation_count, state.burst_delay
            );
            tokio::time::sleep(state.burst_delay).await;
            state.operation_count = 0;
            state.last_operation = Some(Instant::now());
            return;
        }

        if let Some(last) = state.last_operation {
            let elapsed = last.elapsed();
            if elapsed < state.operation_delay {
                tokio::time::sleep(state.operation_delay - elapsed).await;
            }
        }
        state.last_operation = Some(Instant::now());
    }

    /// Call between test steps
    pub async fn wait_for_test_step(&self) {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return;
        }
        tokio::time::sleep(state.test_delay).await;
        state.last_operation = Some(Instant::now());
    }

    /// Call before each cleanup delete
    pub async fn wait_for_cleanup(&self) {
        let mut state = self.state.lock().await;
        if !state.enabled {
            return;
        }
        tokio::time::sleep(state.cleanup_delay).await;
        state.last_operation = Some(Instant::now());
    }

    /// Call at the start of each test
    pub async fn reset_burst_counter(&self) {
        self.state.lock().await.operation_count = 0;
    }

    pub async fn stats(&self) -> RateLimiterStats {
        let state = self.state.lock().await;
        RateLimiterStats {
            enabled: state.enabled,
            operation_count: state.operation_count,
            operation_delay: state.operation_delay,
            test_delay: state.test_delay,
            cleanup_delay: state.cleanup_delay,
            burst_limit: state.burst_limit,
            burst_delay: state.burst_delay,
        }
    }
}
