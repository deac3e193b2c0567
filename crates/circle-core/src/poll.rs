//! Payment-Status Poller State Machine
//!
//! After the processor redirects the browser back, the webhook may not have
//! landed yet. The confirmation page therefore re-reads the paid flag a
//! bounded number of times. This module holds the transition table only; it
//! never sleeps or performs I/O. Drivers (the tokio poller, the web page)
//! execute the returned [`PollAction`] and feed back a [`PollEvent`].
//!
//! ```text
//!            Observed(true)
//!  Checking ───────────────▶ Confirmed
//!     │  ▲
//!     │  │ TimerElapsed
//!     ▼  │
//!   Waiting      (unpaid / transient failure, attempts left)
//!
//!  Checking ──(attempts exhausted)──▶ Failed ──ManualRecheck──▶ Checking (single read)
//!  Checking | Waiting ──Expired──▶ Failed
//!  Checking ──(non-transient failure)──▶ Error
//! ```
//!
//! Drivers own the clock: once [`PollConfig::deadline`] has passed they feed
//! [`PollEvent::Expired`], so a slow read cannot stretch the loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::account::UserId;
use crate::error::{CoreError, Result};

/// Poller timing configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    max_attempts: u32,
    interval: Duration,
    redirect_after: Duration,
}

impl PollConfig {
    pub const MIN_ATTEMPTS: u32 = 5;
    pub const MAX_ATTEMPTS: u32 = 10;
    pub const MIN_INTERVAL: Duration = Duration::from_millis(2000);
    pub const MAX_INTERVAL: Duration = Duration::from_millis(3000);
    pub const DEFAULT_REDIRECT_AFTER: Duration = Duration::from_secs(30);

    /// Create a config; attempts must lie in 5..=10 and the interval in 2s..=3s
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self> {
        if !(Self::MIN_ATTEMPTS..=Self::MAX_ATTEMPTS).contains(&max_attempts) {
            return Err(CoreError::Config(format!(
                "max_attempts must be between {} and {}, got {max_attempts}",
                Self::MIN_ATTEMPTS,
                Self::MAX_ATTEMPTS
            )));
        }
        if interval < Self::MIN_INTERVAL || interval > Self::MAX_INTERVAL {
            return Err(CoreError::Config(format!(
                "interval must be between {:?} and {:?}, got {interval:?}",
                Self::MIN_INTERVAL,
                Self::MAX_INTERVAL
            )));
        }
        Ok(Self {
            max_attempts,
            interval,
            redirect_after: Self::DEFAULT_REDIRECT_AFTER,
        })
    }

    /// Countdown shown after confirmation before entering the paid area
    #[must_use]
    pub const fn with_redirect_after(mut self, redirect_after: Duration) -> Self {
        self.redirect_after = redirect_after;
        self
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn redirect_after(&self) -> Duration {
        self.redirect_after
    }

    /// Upper bound on the time the automatic loop can take
    pub fn deadline(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::MIN_ATTEMPTS,
            interval: Self::MIN_INTERVAL,
            redirect_after: Self::DEFAULT_REDIRECT_AFTER,
        }
    }
}

/// Observable poller phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    Checking,
    Waiting,
    Confirmed,
    Failed,
    Error,
}

impl PollPhase {
    /// No further reads happen without user action
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Error)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Waiting => "waiting",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for PollPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollEvent {
    /// A status read completed
    Observed { paid: bool },
    /// A status read failed; `transient` failures consume an attempt
    ReadFailed { transient: bool },
    /// The retry delay has passed
    TimerElapsed,
    /// User pressed "check again" after the loop gave up
    ManualRecheck,
    /// The time budget for the current loop ran out
    Expired,
}

/// What the driver must do next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollAction {
    /// Read the paid flag once and report the result
    ReadStatus,
    /// Wait, then report [`PollEvent::TimerElapsed`]
    ScheduleRetry(Duration),
    /// Payment confirmed; navigate to the paid area after the countdown
    Redirect(Duration),
    /// Loop gave up; offer the manual re-check
    AwaitUser,
    /// Nothing more to do
    Stop,
}

/// Why the poller ended in [`PollPhase::Error`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollFailure {
    /// The confirmation URL did not carry a user id
    MissingUserId,
    /// The status read failed in a way retrying cannot fix
    ReadRejected,
}

/// Finite-state machine behind the confirmation page
#[derive(Clone, Debug)]
pub struct PollMachine {
    config: PollConfig,
    phase: PollPhase,
    user_id: Option<UserId>,
    attempts: u32,
    manual: bool,
    failure: Option<PollFailure>,
}

impl PollMachine {
    /// Start polling for the user id taken from the confirmation URL.
    ///
    /// A missing or blank id is an error state; it is never inferred from an
    /// ambient session.
    pub fn start(config: PollConfig, user_id: Option<&str>) -> (Self, PollAction) {
        let user_id = user_id.and_then(|raw| UserId::parse(raw).ok());

        let mut machine = Self {
            config,
            phase: PollPhase::Checking,
            user_id,
            attempts: 1,
            manual: false,
            failure: None,
        };

        if machine.user_id.is_none() {
            tracing::warn!("Confirmation page opened without a user id");
            machine.phase = PollPhase::Error;
            machine.attempts = 0;
            machine.failure = Some(PollFailure::MissingUserId);
            return (machine, PollAction::Stop);
        }

        (machine, PollAction::ReadStatus)
    }

    /// Apply an event, returning the next action for the driver
    pub fn apply(&mut self, event: PollEvent) -> Result<PollAction> {
        let action = match (self.phase, event) {
            (PollPhase::Checking, PollEvent::Observed { paid: true }) => {
                self.phase = PollPhase::Confirmed;
                PollAction::Redirect(self.config.redirect_after)
            }

            (PollPhase::Checking, PollEvent::Observed { paid: false })
            | (PollPhase::Checking, PollEvent::ReadFailed { transient: true }) => {
                if !self.manual && self.attempts < self.config.max_attempts {
                    self.phase = PollPhase::Waiting;
                    PollAction::ScheduleRetry(self.config.interval)
                } else {
                    self.phase = PollPhase::Failed;
                    PollAction::AwaitUser
                }
            }

            (PollPhase::Checking | PollPhase::Waiting, PollEvent::Expired) => {
                tracing::warn!(attempts = self.attempts, "Payment status polling timed out");
                self.phase = PollPhase::Failed;
                PollAction::AwaitUser
            }

            (PollPhase::Checking, PollEvent::ReadFailed { transient: false }) => {
                self.phase = PollPhase::Error;
                self.failure = Some(PollFailure::ReadRejected);
                PollAction::Stop
            }

            (PollPhase::Waiting, PollEvent::TimerElapsed) => {
                self.phase = PollPhase::Checking;
                self.attempts += 1;
                PollAction::ReadStatus
            }

            (PollPhase::Failed, PollEvent::ManualRecheck) => {
                self.phase = PollPhase::Checking;
                self.manual = true;
                PollAction::ReadStatus
            }

            (phase, event) => {
                return Err(CoreError::InvalidTransition {
                    phase: phase.to_string(),
                    event: format!("{event:?}"),
                });
            }
        };

        tracing::debug!(
            phase = %self.phase,
            attempts = self.attempts,
            "Poller transition"
        );

        Ok(action)
    }

    pub const fn phase(&self) -> PollPhase {
        self.phase
    }

    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Automatic attempts made so far (manual re-checks not counted)
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn failure(&self) -> Option<PollFailure> {
        self.failure
    }

    pub const fn config(&self) -> &PollConfig {
        &self.config
    }
}
