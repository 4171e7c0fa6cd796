//! Profile validation logic.
//!
//! Interpolation divides by segment length, so every profile is checked here
//! before it can be stored or run.

use crate::schema::{ProfileTemperature, SolderProfile};

pub const MAX_POINTS: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 39;
/// Longest run the plot buffer can hold, in seconds.
pub const MAX_PROFILE_TIME: u32 = 9 * 60;
pub const MAX_TEMPERATURE: f64 = 300.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Profile description is empty")]
    EmptyDescription,

    #[error("Profile description is {len} characters (max {})", MAX_DESCRIPTION_LEN)]
    DescriptionTooLong { len: usize },

    #[error("Profile has no points")]
    NoPoints,

    #[error("Profile has {count} points (max {})", MAX_POINTS)]
    TooManyPoints { count: usize },

    #[error("First point is at t={time_s}s, expected t=0")]
    FirstPointNotAtZero { time_s: u32 },

    #[error("Point {index} at t={time_s}s does not follow t={previous_s}s")]
    NonIncreasingTime {
        index: usize,
        time_s: u32,
        previous_s: u32,
    },

    #[error("Profile has no stop point")]
    MissingStop,

    #[error("Stop point {index} is not the last point")]
    StopNotLast { index: usize },

    #[error("Point {index} temperature {value} outside 0..={} degC", MAX_TEMPERATURE)]
    TemperatureOutOfRange { index: usize, value: f64 },

    #[error("Profile runs {duration_s}s (max {}s)", MAX_PROFILE_TIME)]
    TooLong { duration_s: u32 },

    #[error("Invalid thresholds: {reason}")]
    Thresholds { reason: &'static str },
}

pub fn validate_profile(profile: &SolderProfile) -> Result<(), ValidationError> {
    let len = profile.description.chars().count();
    if profile.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    if len > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong { len });
    }

    let points = &profile.points;
    let Some(first) = points.first() else {
        return Err(ValidationError::NoPoints);
    };
    if points.len() > MAX_POINTS {
        return Err(ValidationError::TooManyPoints {
            count: points.len(),
        });
    }
    if first.time_s != 0 {
        return Err(ValidationError::FirstPointNotAtZero {
            time_s: first.time_s,
        });
    }

    for (index, pair) in points.windows(2).enumerate() {
        if pair[1].time_s <= pair[0].time_s {
            return Err(ValidationError::NonIncreasingTime {
                index: index + 1,
                time_s: pair[1].time_s,
                previous_s: pair[0].time_s,
            });
        }
    }

    for (index, point) in points.iter().enumerate() {
        if let ProfileTemperature::Celsius(value) = point.temperature {
            if !value.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&value) {
                return Err(ValidationError::TemperatureOutOfRange { index, value });
            }
        }
        if point.stop && index + 1 != points.len() {
            return Err(ValidationError::StopNotLast { index });
        }
    }
    if !points.last().is_some_and(|p| p.stop) {
        return Err(ValidationError::MissingStop);
    }

    let duration_s = profile.duration_s();
    if duration_s > MAX_PROFILE_TIME {
        return Err(ValidationError::TooLong { duration_s });
    }

    if let Some(t) = &profile.thresholds {
        if [t.liquidus_c, t.soak_start_c, t.soak_end_c, t.peak_c]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err(ValidationError::Thresholds {
                reason: "thresholds must be finite",
            });
        }
        if t.soak_start_c > t.soak_end_c {
            return Err(ValidationError::Thresholds {
                reason: "soak start above soak end",
            });
        }
        if t.soak_end_c > t.peak_c {
            return Err(ValidationError::Thresholds {
                reason: "soak end above peak",
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ProfilePoint, Thresholds};

    fn valid() -> SolderProfile {
        SolderProfile::new(
            "Test",
            vec![
                ProfilePoint::at(0, 25.0),
                ProfilePoint::at(60, 150.0),
                ProfilePoint::at(120, 150.0),
                ProfilePoint::at(121, 0.0).with_stop(),
            ],
        )
    }

    #[test]
    fn accepts_valid_profile() {
        validate_profile(&valid()).unwrap();
    }

    #[test]
    fn rejects_equal_timestamps() {
        let mut p = valid();
        p.points[2].time_s = 60;
        assert_eq!(
            validate_profile(&p),
            Err(ValidationError::NonIncreasingTime {
                index: 2,
                time_s: 60,
                previous_s: 60
            })
        );
    }

    #[test]
    fn rejects_missing_or_early_stop() {
        let mut p = valid();
        p.points[3].stop = false;
        assert_eq!(validate_profile(&p), Err(ValidationError::MissingStop));

        let mut p = valid();
        p.points[1].stop = true;
        assert_eq!(
            validate_profile(&p),
            Err(ValidationError::StopNotLast { index: 1 })
        );
    }

    #[test]
    fn rejects_bad_shape() {
        let mut p = valid();
        p.points.clear();
        assert_eq!(validate_profile(&p), Err(ValidationError::NoPoints));

        let mut p = valid();
        p.points[0].time_s = 5;
        assert!(matches!(
            validate_profile(&p),
            Err(ValidationError::FirstPointNotAtZero { time_s: 5 })
        ));

        let mut p = valid();
        p.points = (0..11).map(|i| ProfilePoint::at(i * 10, 50.0)).collect();
        assert_eq!(
            validate_profile(&p),
            Err(ValidationError::TooManyPoints { count: 11 })
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut p = valid();
        p.points[1] = ProfilePoint::at(60, 350.0);
        assert!(matches!(
            validate_profile(&p),
            Err(ValidationError::TemperatureOutOfRange { index: 1, .. })
        ));

        let mut p = valid();
        p.points[3].time_s = MAX_PROFILE_TIME + 1;
        assert!(matches!(
            validate_profile(&p),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn rejects_bad_description() {
        let mut p = valid();
        p.description = "   ".to_string();
        assert_eq!(validate_profile(&p), Err(ValidationError::EmptyDescription));
        p.description = "x".repeat(40);
        assert_eq!(
            validate_profile(&p),
            Err(ValidationError::DescriptionTooLong { len: 40 })
        );
    }

    #[test]
    fn threshold_ordering() {
        let mut p = valid();
        p.thresholds = Some(Thresholds {
            liquidus_c: 183.0,
            soak_start_c: 150.0,
            soak_end_c: 140.0,
            peak_c: 210.0,
        });
        assert!(matches!(
            validate_profile(&p),
            Err(ValidationError::Thresholds { .. })
        ));
    }
}
