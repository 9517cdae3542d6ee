//! Background sweep of expired authorization codes

use time::OffsetDateTime;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::auth::codes::AuthCodes;

/// Periodically removes expired codes. Redemption already drops stale rows
/// lazily; this only bounds storage growth for codes nobody comes back for.
pub struct CodeSweeper {
    codes: AuthCodes,
    interval_secs: u64,
}

impl CodeSweeper {
    pub fn new(codes: AuthCodes, interval_secs: u64) -> Self {
        Self { codes, interval_secs }
    }

    /// Start the sweep on its own task so no request owns its lifetime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut timer = interval(Duration::from_secs(self.interval_secs.max(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            if let Err(e) = self.run_once(OffsetDateTime::now_utc()).await {
                error!(error = ?e, "authorization code sweep failed");
            }
        }
    }

    /// Run a single sweep (public for testing)
    pub async fn run_once(&self, now: OffsetDateTime) -> anyhow::Result<usize> {
        let count = self.codes.sweep(now).await?;
        if count > 0 {
            info!(count = count, "removed expired authorization codes");
        }
        Ok(count)
    }
}
