use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::cost::Cost;

#[derive(Debug, Default)]
struct BudgetState {
    spent: Cost,
    in_flight: usize,
    /// Sum of the worst-case costs of in-flight calls.
    reserved: Cost,
}

/// Serializes the Stage 3 budget check and cost accumulation.
///
/// Every call reserves its worst-case cost before it is sent. A reservation is granted
/// only while `spent + reserved < cap`; committing replaces the reservation with the
/// actual cost. As long as no call costs more than it reserved, the final spend never
/// exceeds `cap` by more than the cost of the last admitted call.
#[derive(Debug)]
pub struct BudgetGovernor {
    cap: Cost,
    state: Mutex<BudgetState>,
    settled: Notify,
}

/// Result of [`BudgetGovernor::try_reserve`].
#[derive(Debug)]
pub enum Admission {
    Granted(BudgetPermit),
    /// In-flight reservations already reach the cap; retry once one of them settles.
    Deferred,
    Exhausted { spent: Cost, cap: Cost },
}

impl BudgetGovernor {
    /// Creates a governor that has already spent `spent` (e.g. restored from a checkpoint).
    pub fn new(cap: Cost, spent: Cost) -> Arc<Self> {
        Arc::new(Self {
            cap,
            state: Mutex::new(BudgetState {
                spent,
                ..BudgetState::default()
            }),
            settled: Notify::new(),
        })
    }

    pub fn cap(&self) -> Cost {
        self.cap
    }

    pub fn spent(&self) -> Cost {
        self.state.lock().spent
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Worst-case cost of the calls currently in flight.
    pub fn reserved(&self) -> Cost {
        self.state.lock().reserved
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.lock().spent >= self.cap
    }

    /// Non-blocking admission check for a call that can cost at most `bound`.
    pub fn try_reserve(self: &Arc<Self>, bound: Cost) -> Admission {
        let mut state = self.state.lock();

        if state.spent >= self.cap {
            return Admission::Exhausted {
                spent: state.spent,
                cap: self.cap,
            };
        }

        if state.spent + state.reserved >= self.cap {
            debug!(
                spent = %state.spent,
                reserved = %state.reserved,
                in_flight = state.in_flight,
                "Budget reservation deferred until an in-flight call settles"
            );
            return Admission::Deferred;
        }

        state.in_flight += 1;
        state.reserved += bound;
        Admission::Granted(BudgetPermit {
            governor: Arc::clone(self),
            reservation: bound,
            settled: false,
        })
    }

    /// Waits until a reservation is granted, or returns `None` once the budget is spent.
    pub async fn reserve(self: &Arc<Self>, bound: Cost) -> Option<BudgetPermit> {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_reserve(bound) {
                Admission::Granted(permit) => return Some(permit),
                Admission::Exhausted { .. } => return None,
                Admission::Deferred => notified.await,
            }
        }
    }

    fn settle(&self, reservation: Cost, cost: Cost) {
        {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.reserved = state.reserved.saturating_sub(reservation);
            state.spent += cost;
        }
        if cost > reservation {
            warn!(
                cost = %cost,
                reserved = %reservation,
                "Call cost more than its budget reservation"
            );
        }
        self.settled.notify_waiters();
    }
}

/// One admitted verification call. Dropping an uncommitted permit releases it at zero cost.
#[derive(Debug)]
pub struct BudgetPermit {
    governor: Arc<BudgetGovernor>,
    reservation: Cost,
    settled: bool,
}

impl BudgetPermit {
    /// Worst-case cost held for this call.
    pub fn reservation(&self) -> Cost {
        self.reservation
    }

    /// Replaces the reservation with the call's actual cost and returns the new total.
    pub fn commit(mut self, cost: Cost) -> Cost {
        self.settled = true;
        self.governor.settle(self.reservation, cost);
        self.governor.spent()
    }
}

impl Drop for BudgetPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.governor.settle(self.reservation, Cost::ZERO);
        }
    }
}
