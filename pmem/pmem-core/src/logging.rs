//! Verbosity tunable to `log` level mapping.
//!
//! The extension exposes exactly one externally mutable setting: an
//! integer verbosity level in the tunable registry. The scale matches
//! the original module's logging macros:
//!
//! | Level | Meaning            |
//! |-------|--------------------|
//! | ≤ 0   | errors only        |
//! | 1     | + warnings         |
//! | 2     | + info *(default)* |
//! | 3     | + debug            |
//! | ≥ 4   | + trace            |

use log::LevelFilter;

/// Translate a tunable verbosity level into a `log` filter.
#[must_use]
pub const fn verbosity_filter(level: i32) -> LevelFilter {
    match level {
        i32::MIN..=0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Apply a tunable verbosity level to the global `log` filter.
pub fn apply_verbosity(level: i32) {
    log::set_max_level(verbosity_filter(level));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_matches_the_documented_levels() {
        assert_eq!(verbosity_filter(-3), LevelFilter::Error);
        assert_eq!(verbosity_filter(0), LevelFilter::Error);
        assert_eq!(verbosity_filter(1), LevelFilter::Warn);
        assert_eq!(verbosity_filter(2), LevelFilter::Info);
        assert_eq!(verbosity_filter(3), LevelFilter::Debug);
        assert_eq!(verbosity_filter(99), LevelFilter::Trace);
    }
}
