//! Wall-clock style formatting and parsing of simulation time

use crate::core::error::{Result, SimError};
use crate::core::types::SimTime;

const SECS_PER_DAY: u64 = 24 * 3600;

/// Parse `HH:MM` or `HH:MM:SS` into seconds since midnight
pub fn parse_clock(text: &str) -> Result<SimTime> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(SimError::InvalidTime(text.to_string()));
    }

    let mut fields = [0u64; 3];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = part
            .parse::<u64>()
            .map_err(|_| SimError::InvalidTime(text.to_string()))?;
    }
    let [hours, minutes, seconds] = fields;
    if minutes >= 60 || seconds >= 60 {
        return Err(SimError::InvalidTime(text.to_string()));
    }

    Ok((hours * 3600 + minutes * 60 + seconds) as SimTime)
}

/// Format seconds as `HH:MM:SS`, prefixed with the day once past the first
pub fn format_clock(t: SimTime) -> String {
    let total = t.max(0.0).floor() as u64;
    let day = total / SECS_PER_DAY;
    let rem = total % SECS_PER_DAY;
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    if day == 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("d{}+{:02}:{:02}:{:02}", day, h, m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_forms() {
        assert_eq!(parse_clock("08:30").unwrap(), 30600.0);
        assert_eq!(parse_clock("00:00:59").unwrap(), 59.0);
        assert_eq!(parse_clock(" 25:00 ").unwrap(), 90000.0);
    }

    #[test]
    fn test_parse_clock_rejects_garbage() {
        assert!(parse_clock("8").is_err());
        assert!(parse_clock("08:75").is_err());
        assert!(parse_clock("aa:bb").is_err());
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(30600.0), "08:30:00");
        assert_eq!(format_clock(86400.0 + 61.5), "d1+00:01:01");
    }
}
