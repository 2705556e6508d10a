use std::time::Duration;

use tokio::time::{self, Instant};

use crate::{
    configuration::{DelayRange, ScrollSettings},
    errors::ScrollError,
    services::PageSession,
};

/// Keeps scrolling a lazily-loaded container until its extent stops changing.
#[derive(Debug, Clone)]
pub struct StabilizingScroller {
    poll: DelayRange,
    budget: Duration,
    stable_reads: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stabilized {
    pub extent: i64,
    pub rounds: u32,
}

impl StabilizingScroller {
    pub fn new(poll: DelayRange, budget: Duration, stable_reads: u32) -> Self {
        StabilizingScroller {
            poll,
            budget,
            stable_reads: stable_reads.max(1),
        }
    }

    pub fn from_settings(settings: &ScrollSettings) -> Self {
        Self::new(
            settings.poll,
            Duration::from_secs(settings.budget_secs),
            settings.stable_reads,
        )
    }

    /// Converges once `stable_reads` consecutive polls see the same extent.
    /// Never runs past the budget, even when the content grows forever.
    pub async fn expand_until_stable<S: PageSession>(
        &self,
        session: &S,
        container: &S::Element,
    ) -> Result<Stabilized, ScrollError> {
        let deadline = Instant::now() + self.budget;
        let mut last_extent = session.scroll_extent(container).await?;
        let mut quiet_polls = 0;
        let mut rounds = 0;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(ScrollError::StabilizationTimeout {
                    budget: self.budget,
                    last_extent,
                });
            }

            session.scroll_to_extent(container).await?;
            rounds += 1;
            time::sleep(self.poll.sample().min(deadline - now)).await;

            let extent = session.scroll_extent(container).await?;
            if extent == last_extent {
                quiet_polls += 1;
                if quiet_polls >= self.stable_reads {
                    log::debug!("Container settled at {} after {} rounds", extent, rounds);
                    return Ok(Stabilized { extent, rounds });
                }
            } else {
                quiet_polls = 0;
                last_extent = extent;
            }
        }
    }
}
