//! Poll scheduling against the root controller resource

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ddi::identity::ServerIdentity;
use crate::ddi::links::LinkSet;
use crate::errors::DdiError;
use crate::http::client::HttpClient;
use crate::http::href::Href;
use crate::http::transport::Transport;
use crate::models::controller::ControllerBase;

/// Interval used when the server gives no usable hint
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300_000);

/// Convert an `HH:MM:SS` string to milliseconds.
///
/// Components that do not parse count as 0; more than three components
/// make the whole value 0.
pub fn convert_time(time: &str) -> u64 {
    const FACTORS: [u64; 3] = [3_600_000, 60_000, 1_000];

    let mut millis = 0u64;
    for (position, part) in time.split(':').filter(|p| !p.is_empty()).enumerate() {
        let Some(factor) = FACTORS.get(position) else {
            return 0;
        };
        let value = leading_number(part);
        millis = millis.saturating_add(value.saturating_mul(*factor));
    }
    millis
}

/// Parse the leading decimal digits of `text`, 0 if there are none
fn leading_number(text: &str) -> u64 {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().unwrap_or(0)
}

/// When the next poll is due and how far apart polls are
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// `None` until the first successful poll, meaning "due now"
    pub next_poll_due: Option<Instant>,

    /// Interval derived from the last hint; 0 when it was unusable
    pub poll_interval_ms: u64,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            next_poll_due: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Decides when to check in and applies the server's reply
#[derive(Debug, Default)]
pub struct PollScheduler {
    state: PollState,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// True when a poll should be made at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.state.next_poll_due.map_or(true, |due| now >= due)
    }

    /// Poll the server if due; returns whether a poll reply was applied.
    ///
    /// A failed exchange changes nothing, so the next call tries again.
    pub async fn maybe_poll<T: Transport>(
        &mut self,
        http: &mut HttpClient<T>,
        identity: &ServerIdentity,
        links: &mut LinkSet,
        now: Instant,
    ) -> Result<bool, DdiError> {
        if !self.is_due(now) {
            return Ok(false);
        }

        let href = Href::new(&identity.host, identity.port, identity.controller_path());
        let reply: ControllerBase = http.get(&href).await?;
        self.apply(&reply, links, now);
        Ok(true)
    }

    /// Update the schedule and links from a poll reply
    pub fn apply(&mut self, reply: &ControllerBase, links: &mut LinkSet, now: Instant) {
        self.state.poll_interval_ms = convert_time(reply.polling_sleep().unwrap_or(""));
        let interval = match self.state.poll_interval_ms {
            0 => DEFAULT_POLL_INTERVAL,
            ms => Duration::from_millis(ms),
        };
        self.state.next_poll_due = Some(now + interval);
        info!("Poll interval: {:?}", interval);

        links.refresh(reply.links.as_ref());
        debug!("Links: {:?}", links);
    }
}
