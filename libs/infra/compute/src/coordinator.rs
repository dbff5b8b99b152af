//! The task billing coordinator's two suspending concerns: the
//! line-delimited-JSON streaming proxy against the compute service, and
//! the deferred-debit cost calculation that runs once a task terminates
//! successfully. Admission is a pure guard — no connection needed to
//! decide it, so it lives here as a plain function rather than a method.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use creditcore_domain_billing::BillingError;
use creditcore_domain_models::User;
use futures_util::StreamExt;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::errors::ComputeError;
use crate::record::{parse_record, BotOutputRecord, StreamRecord, TrackCostRecord};

/// Multiplier applied to the authoritative `track_cost.total_cost` before
/// it is debited. Deployments read the real value from configuration;
/// this is only the fallback when none is configured.
pub const DEFAULT_COST_MULTIPLIER: Decimal = Decimal::from_parts(314, 0, 0, false, 2);

/// Cost assumed when a task terminates successfully without ever emitting
/// a `track_cost` trailer. The fallback path applies a multiplier of
/// `1.0`, not [`DEFAULT_COST_MULTIPLIER`].
pub const FALLBACK_RAW_COST: Decimal = Decimal::from_parts(1, 0, 0, false, 0);

const MAX_CHUNK_BYTES: usize = 1024 * 1024;

/// Whether a new task may be forwarded to the compute service. Strictly
/// read-only against the caller's already-loaded user row — no
/// connection needed.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Admitted,
    Refused(BillingError),
}

/// Admission guards against running a *new* task on an account that is
/// already in a bad state: blocked, unsubscribed, or already overdrawn.
/// Note this is strictly `balance >= 0`, stricter than the `-FLOOR`
/// tolerance the deferred debit itself is allowed to cross.
pub fn admit(user: &User, now: DateTime<Utc>) -> AdmissionDecision {
    if user.is_blocked {
        return AdmissionDecision::Refused(BillingError::UserBlocked);
    }
    if !user.subscription_active(now) {
        return AdmissionDecision::Refused(BillingError::SubscriptionExpired);
    }
    if user.balance < Decimal::ZERO {
        return AdmissionDecision::Refused(BillingError::InsufficientBalance {
            required: Decimal::ZERO,
            available: user.balance,
        });
    }
    AdmissionDecision::Admitted
}

/// Accumulates the most recent `track_cost` trailer seen on a stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostCapture {
    raw_cost: Option<Decimal>,
}

impl CostCapture {
    pub fn observe(&mut self, track_cost: &TrackCostRecord) {
        self.raw_cost = Some(track_cost.total_cost);
    }

    pub fn has_track_cost(&self) -> bool {
        self.raw_cost.is_some()
    }

    /// `(raw_cost, final_cost, used_fallback)`. The fallback path ignores
    /// the configured multiplier entirely.
    pub fn finalize(&self, multiplier: Decimal) -> (Decimal, Decimal, bool) {
        match self.raw_cost {
            Some(raw) => (raw, (raw * multiplier).round_dp(2), false),
            None => (FALLBACK_RAW_COST, FALLBACK_RAW_COST, true),
        }
    }
}

/// How a stream ended.
#[derive(Debug, Clone)]
pub enum Terminal {
    Complete { task_id: Option<String> },
    Done { task_id: Option<String> },
    Error { message: String },
    Cancelled { task_id: Option<String> },
}

#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub terminal: Terminal,
    pub cost: CostCapture,
}

impl StreamOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.terminal, Terminal::Complete { .. } | Terminal::Done { .. })
    }
}

/// Drives one task's server-sent-event-shaped stream against the compute
/// service: chunks capped at 1 MiB, decoded as line-delimited JSON, with
/// `bot_output` records forwarded verbatim through `sink` in arrival order.
pub struct TaskBillingCoordinator {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TaskBillingCoordinator {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self { client, base_url, api_key }
    }

    /// `cancel` is checked at every chunk boundary — setting it from any
    /// other task lets the chat layer abort an in-flight task without the
    /// coordinator having to poll anything itself.
    #[instrument(skip(self, sink, cancel))]
    pub async fn stream_task(
        &self,
        task_path: &str,
        cancel: Arc<AtomicBool>,
        mut sink: impl FnMut(BotOutputRecord),
    ) -> Result<StreamOutcome, ComputeError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), task_path.trim_start_matches('/'));
        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await?;
        let mut byte_stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut cost = CostCapture::default();

        while let Some(chunk) = byte_stream.next().await {
            if cancel.load(Ordering::Relaxed) {
                return Ok(StreamOutcome { terminal: Terminal::Cancelled { task_id: None }, cost });
            }

            let chunk = chunk?;
            if chunk.len() > MAX_CHUNK_BYTES {
                return Err(ComputeError::ChunkTooLarge);
            }
            buffer.extend_from_slice(&chunk);

            while let Some(newline_at) = buffer.iter().position(|&byte| byte == b'\n') {
                let line_bytes: Vec<u8> = buffer.drain(..=newline_at).collect();
                let line = String::from_utf8_lossy(&line_bytes);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match parse_record(line)? {
                    StreamRecord::Progress => {}
                    StreamRecord::BotOutput(output) => sink(output),
                    StreamRecord::TrackCost(track) => cost.observe(&track),
                    StreamRecord::Complete(terminal) => {
                        return Ok(StreamOutcome { terminal: Terminal::Complete { task_id: terminal.task_id }, cost })
                    }
                    StreamRecord::Done(terminal) => {
                        return Ok(StreamOutcome { terminal: Terminal::Done { task_id: terminal.task_id }, cost })
                    }
                    StreamRecord::Error(error) => {
                        return Ok(StreamOutcome { terminal: Terminal::Error { message: error.message }, cost })
                    }
                    StreamRecord::Cancelled(terminal) => {
                        return Ok(StreamOutcome {
                            terminal: Terminal::Cancelled { task_id: terminal.task_id },
                            cost,
                        })
                    }
                }
            }
        }

        if cancel.load(Ordering::Relaxed) {
            return Ok(StreamOutcome { terminal: Terminal::Cancelled { task_id: None }, cost });
        }
        Err(ComputeError::UpstreamClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user(balance: Decimal, blocked: bool, subscription_end: Option<DateTime<Utc>>) -> User {
        User {
            id: 1,
            display_name: None,
            username: None,
            balance,
            balance_version: 0,
            subscription_end,
            is_blocked: blocked,
            auto_renew: false,
            last_subscription_notification: None,
            last_balance_notification: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn blocked_user_is_refused_admission() {
        let user = sample_user(Decimal::new(100, 0), true, Some(Utc::now() + Duration::days(1)));
        assert_eq!(admit(&user, Utc::now()), AdmissionDecision::Refused(BillingError::UserBlocked));
    }

    #[test]
    fn user_without_active_subscription_is_refused() {
        let user = sample_user(Decimal::new(100, 0), false, None);
        assert_eq!(admit(&user, Utc::now()), AdmissionDecision::Refused(BillingError::SubscriptionExpired));
    }

    #[test]
    fn negative_balance_is_refused_even_above_the_floor() {
        let user = sample_user(Decimal::new(-1, 0), false, Some(Utc::now() + Duration::days(1)));
        assert_eq!(
            admit(&user, Utc::now()),
            AdmissionDecision::Refused(BillingError::InsufficientBalance {
                required: Decimal::ZERO,
                available: Decimal::new(-1, 0),
            })
        );
    }

    #[test]
    fn healthy_user_is_admitted() {
        let user = sample_user(Decimal::new(50, 0), false, Some(Utc::now() + Duration::days(1)));
        assert_eq!(admit(&user, Utc::now()), AdmissionDecision::Admitted);
    }

    #[test]
    fn finalize_applies_multiplier_to_observed_track_cost() {
        let mut cost = CostCapture::default();
        cost.observe(&TrackCostRecord { total_cost: Decimal::new(200, 2), ..Default::default() });
        let (raw, final_cost, used_fallback) = cost.finalize(DEFAULT_COST_MULTIPLIER);
        assert_eq!(raw, Decimal::new(200, 2));
        assert_eq!(final_cost, Decimal::new(628, 2));
        assert!(!used_fallback);
    }

    #[test]
    fn finalize_falls_back_when_no_track_cost_was_observed() {
        let cost = CostCapture::default();
        let (raw, final_cost, used_fallback) = cost.finalize(DEFAULT_COST_MULTIPLIER);
        assert_eq!(raw, FALLBACK_RAW_COST);
        assert_eq!(final_cost, FALLBACK_RAW_COST);
        assert!(used_fallback);
    }
}
