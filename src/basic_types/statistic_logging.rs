//! Logging of search statistics. The output prefix and enablement are
//! configured once, before solving starts; individual statistics are then
//! emitted as `prefix name=value` lines.

use std::fmt::Display;

use once_cell::sync::OnceCell;

static STATISTIC_PREFIX: OnceCell<&'static str> = OnceCell::new();
static LOG_STATISTICS: OnceCell<bool> = OnceCell::new();

/// Configure statistic logging. Calling this more than once has no effect.
pub fn configure(log_statistics: bool, prefix: &'static str) {
    let _ = LOG_STATISTICS.set(log_statistics);
    let _ = STATISTIC_PREFIX.set(prefix);
}

pub fn should_log_statistics() -> bool {
    *LOG_STATISTICS.get_or_init(|| false)
}

pub fn log_statistic(name: impl Display, value: impl Display) {
    if should_log_statistics() {
        let prefix = STATISTIC_PREFIX.get_or_init(|| "%% ");
        println!("{prefix}{name}={value}");
    }
}
