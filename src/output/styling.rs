use console::{style, StyledObject};
use std::fmt::Display;

use crate::trends::stats::TrendDirection;

/// Success rates above this are shown as healthy
const HEALTHY_SUCCESS_RATE: f64 = 80.0;
/// Success rates below this are shown as failing
const FAILING_SUCCESS_RATE: f64 = 50.0;

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

/// Labels, rationale text and empty-section notes.
pub fn muted(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

/// Measured values: durations, counts, percentages.
pub fn value(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn accent(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn good(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bad(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn banner(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Success rate as `92.5%`, green when healthy and red when failing.
pub fn success_rate(rate: f64) -> StyledObject<String> {
    let text = format!("{rate:.1}%");
    if rate > HEALTHY_SUCCESS_RATE {
        good(text)
    } else if rate >= FAILING_SUCCESS_RATE {
        value(text)
    } else {
        bad(text)
    }
}

/// Text coloured by the trend it describes. Shorter durations are good news.
pub fn by_direction(direction: TrendDirection, text: impl Display) -> StyledObject<String> {
    match direction {
        TrendDirection::Improving => good(text),
        TrendDirection::Stable => muted(text),
        TrendDirection::Degrading => bad(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_is_formatted_as_percentage() {
        assert!(success_rate(45.0).to_string().contains("45.0%"));
        assert!(success_rate(100.0).to_string().contains("100.0%"));
    }

    #[test]
    fn test_by_direction_keeps_text() {
        for direction in [
            TrendDirection::Improving,
            TrendDirection::Stable,
            TrendDirection::Degrading,
        ] {
            assert!(by_direction(direction, "build got slower")
                .to_string()
                .contains("build got slower"));
        }
    }
}
