//! Cooperative termination. The solver checks the condition between
//! propagation rounds; in-progress propagation always completes.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

pub trait TerminationCondition {
    fn should_stop(&mut self) -> bool;
}

/// Never stops; solve to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct Indefinite;

impl TerminationCondition for Indefinite {
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// Stops when the budget is exhausted.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    deadline: Instant,
}

impl TimeBudget {
    pub fn starting_now(budget: Duration) -> TimeBudget {
        TimeBudget {
            deadline: Instant::now() + budget,
        }
    }
}

impl TerminationCondition for TimeBudget {
    fn should_stop(&mut self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// A cooperative interrupt flag; the handle can be triggered from another
/// thread or a signal handler.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Interrupt {
        Interrupt::default()
    }

    /// A handle with which the solve can be interrupted.
    pub fn handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: Arc::clone(&self.flag),
        }
    }
}

impl TerminationCondition for Interrupt {
    fn should_stop(&mut self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_fires_through_the_handle() {
        let mut interrupt = Interrupt::new();
        let handle = interrupt.handle();
        assert!(!interrupt.should_stop());
        handle.interrupt();
        assert!(interrupt.should_stop());
    }

    #[test]
    fn elapsed_time_budget_stops() {
        let mut budget = TimeBudget::starting_now(Duration::from_secs(0));
        assert!(budget.should_stop());
    }
}
