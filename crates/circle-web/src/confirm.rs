//! Browser driver for the payment-status poller
//!
//! Executes [`PollAction`]s with `setTimeout` and the status endpoint, and
//! mirrors the machine into signals for the view. At most one retry timer is
//! pending at a time. A second timer feeds [`PollEvent::Expired`] once the
//! loop's deadline passes, so a fetch that never settles still ends in
//! `Failed`. Both are cleared when the page unmounts.

use std::time::Duration;

use leptos::leptos_dom::helpers::{set_timeout_with_handle, TimeoutHandle};
use leptos::prelude::*;

use circle_core::{
    PollAction, PollConfig, PollEvent, PollFailure, PollMachine, PollPhase, DASHBOARD_PATH,
};

use crate::api;
use crate::nav::navigate;

const TICK: Duration = Duration::from_secs(1);

/// Snapshot rendered by the confirmation page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollView {
    pub phase: PollPhase,
    pub attempts: u32,
    pub max_attempts: u32,
    pub failure: Option<PollFailure>,
    /// Seconds left before the redirect, once confirmed
    pub countdown: Option<u64>,
}

impl PollView {
    fn of(machine: &PollMachine, countdown: Option<u64>) -> Self {
        Self {
            phase: machine.phase(),
            attempts: machine.attempts(),
            max_attempts: machine.config().max_attempts(),
            failure: machine.failure(),
            countdown,
        }
    }

    pub fn headline(&self) -> &'static str {
        match self.phase {
            PollPhase::Checking | PollPhase::Waiting => "Confirming your payment…",
            PollPhase::Confirmed => "Payment confirmed!",
            PollPhase::Failed => "We couldn't confirm your payment yet",
            PollPhase::Error => match self.failure {
                Some(PollFailure::MissingUserId) => "This confirmation link is incomplete",
                _ => "We couldn't find your account",
            },
        }
    }

    pub fn detail(&self) -> String {
        match self.phase {
            PollPhase::Checking | PollPhase::Waiting => {
                format!("Attempt {} of {}", self.attempts, self.max_attempts)
            }
            PollPhase::Confirmed => match self.countdown {
                Some(secs) => format!("Taking you to your dashboard in {secs}s"),
                None => "Taking you to your dashboard".into(),
            },
            PollPhase::Failed => {
                "Payments can take a minute to be recorded. Check again, or contact support if this persists.".into()
            }
            PollPhase::Error => "Return to checkout and start again.".into(),
        }
    }
}

/// Owns the machine and the pending timer for one page instance
#[derive(Clone, Copy)]
pub struct ConfirmationDriver {
    machine: StoredValue<PollMachine>,
    timer: StoredValue<Option<TimeoutHandle>>,
    deadline: StoredValue<Option<TimeoutHandle>>,
    countdown: StoredValue<Option<u64>>,
    view: RwSignal<PollView>,
}

impl ConfirmationDriver {
    /// Start polling for the id from the confirmation URL
    pub fn start(user_id: Option<&str>) -> Self {
        let (machine, first) = PollMachine::start(PollConfig::default(), user_id);

        let driver = Self {
            view: RwSignal::new(PollView::of(&machine, None)),
            machine: StoredValue::new(machine),
            timer: StoredValue::new(None),
            deadline: StoredValue::new(None),
            countdown: StoredValue::new(None),
        };

        on_cleanup(move || {
            driver.cancel();
            driver.disarm_deadline();
        });
        driver.arm_deadline();
        driver.run(first);
        driver
    }

    pub fn view(&self) -> ReadSignal<PollView> {
        self.view.read_only()
    }

    /// "Check again" after the automatic loop gave up
    pub fn recheck(self) {
        if self.machine.try_with_value(PollMachine::phase) != Some(PollPhase::Failed) {
            return;
        }
        self.arm_deadline();
        self.feed(PollEvent::ManualRecheck);
    }

    /// Skip the countdown
    pub fn go_now(self) {
        self.cancel();
        navigate(DASHBOARD_PATH);
    }

    fn run(self, action: PollAction) {
        self.publish();
        match action {
            PollAction::ReadStatus => self.read_status(),
            PollAction::ScheduleRetry(delay) => {
                self.schedule(delay, move || self.feed(PollEvent::TimerElapsed));
            }
            PollAction::Redirect(after) => {
                self.disarm_deadline();
                self.countdown.try_set_value(Some(after.as_secs()));
                self.publish();
                self.schedule(TICK, move || self.tick());
            }
            PollAction::AwaitUser | PollAction::Stop => {
                self.cancel();
                self.disarm_deadline();
            }
        }
    }

    fn read_status(self) {
        let Some(user_id) = self
            .machine
            .try_with_value(|m| m.user_id().cloned())
            .flatten()
        else {
            return;
        };

        leptos::task::spawn_local(async move {
            let event = match api::payment_status(&user_id).await {
                Ok(status) => PollEvent::Observed { paid: status.paid },
                Err(e) => PollEvent::ReadFailed {
                    transient: e.is_transient(),
                },
            };

            // The deadline may have ended the loop while the fetch was out
            if self.machine.try_with_value(PollMachine::phase) == Some(PollPhase::Checking) {
                self.feed(event);
            }
        });
    }

    fn feed(self, event: PollEvent) {
        // None once the page is gone
        let Some(result) = self.machine.try_update_value(|m| m.apply(event)) else {
            return;
        };

        match result {
            Ok(action) => self.run(action),
            Err(e) => leptos::logging::warn!("poller: {e}"),
        }
    }

    fn tick(self) {
        let remaining = self
            .countdown
            .try_update_value(|c| {
                let next = c.unwrap_or(0).saturating_sub(1);
                *c = Some(next);
                next
            })
            .unwrap_or(0);
        self.publish();

        if remaining == 0 {
            navigate(DASHBOARD_PATH);
        } else {
            self.schedule(TICK, move || self.tick());
        }
    }

    fn schedule(self, delay: Duration, callback: impl FnOnce() + 'static) {
        self.cancel();
        match set_timeout_with_handle(
            move || {
                self.timer.try_set_value(None);
                callback();
            },
            delay,
        ) {
            Ok(handle) => {
                self.timer.try_set_value(Some(handle));
            }
            Err(e) => leptos::logging::error!("poller: failed to set timer: {e:?}"),
        }
    }

    fn arm_deadline(self) {
        self.disarm_deadline();
        let Some(budget) = self.machine.try_with_value(|m| m.config().deadline()) else {
            return;
        };

        match set_timeout_with_handle(
            move || {
                self.deadline.try_set_value(None);
                self.feed(PollEvent::Expired);
            },
            budget,
        ) {
            Ok(handle) => {
                self.deadline.try_set_value(Some(handle));
            }
            Err(e) => leptos::logging::error!("poller: failed to set deadline: {e:?}"),
        }
    }

    fn disarm_deadline(self) {
        if let Some(Some(handle)) = self.deadline.try_update_value(Option::take) {
            handle.clear();
        }
    }

    fn cancel(self) {
        if let Some(Some(handle)) = self.timer.try_update_value(Option::take) {
            handle.clear();
        }
    }

    fn publish(self) {
        let countdown = self.countdown.try_get_value().flatten();
        if let Some(view) = self.machine.try_with_value(|m| PollView::of(m, countdown)) {
            self.view.try_set(view);
        }
    }
}
