use crate::error::{AttendanceError, Result};
use crate::models::{AttendanceSummary, RiskTier};

pub const GOOD_THRESHOLD: f64 = 75.0;
pub const WARNING_THRESHOLD: f64 = 60.0;

/// Lower bounds are inclusive: exactly 75 is Good, exactly 60 is Warning.
pub fn classify(percentage: f64) -> Result<RiskTier> {
    if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
        return Err(AttendanceError::Validation(format!(
            "percentage {percentage} is outside 0..=100"
        )));
    }

    Ok(if percentage >= GOOD_THRESHOLD {
        RiskTier::Good
    } else if percentage >= WARNING_THRESHOLD {
        RiskTier::Warning
    } else {
        RiskTier::Critical
    })
}

pub fn assess(summaries: &[AttendanceSummary]) -> Result<Vec<(&AttendanceSummary, RiskTier)>> {
    summaries
        .iter()
        .map(|summary| Ok((summary, classify(summary.exact_percentage())?)))
        .collect()
}
