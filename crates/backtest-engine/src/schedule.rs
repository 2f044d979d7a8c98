use chrono::{Datelike, Duration, NaiveDate, Weekday};
use signal_core::SignalError;

/// Every `weekday` in `[start, end]`.
pub fn weekly_schedule(
    start: NaiveDate,
    end: NaiveDate,
    weekday: Weekday,
) -> Result<Vec<NaiveDate>, SignalError> {
    if start > end {
        return Err(SignalError::InvalidSchedule(format!(
            "start {} is after end {}",
            start, end
        )));
    }
    let offset = (7 + weekday.num_days_from_monday() as i64
        - start.weekday().num_days_from_monday() as i64)
        % 7;
    let mut date = start + Duration::days(offset);
    let mut dates = Vec::new();
    while date <= end {
        dates.push(date);
        date += Duration::days(7);
    }
    Ok(dates)
}

/// A schedule must be non-empty and strictly increasing.
pub fn validate_schedule(dates: &[NaiveDate]) -> Result<(), SignalError> {
    if dates.is_empty() {
        return Err(SignalError::InvalidSchedule("no rebalance dates".into()));
    }
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(SignalError::InvalidSchedule(format!(
            "rebalance dates not strictly increasing: {} then {}",
            w[0], w[1]
        )));
    }
    Ok(())
}
