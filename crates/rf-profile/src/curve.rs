//! Setpoint lookup over a profile.

use crate::schema::SolderProfile;

/// Linear interpolation across one segment.
///
/// A zero-length segment is treated as a step to `temp1`; validation keeps
/// these out of stored profiles.
pub fn interpolate(t0: f64, temp0: f64, t1: f64, temp1: f64, t: f64) -> f64 {
    let span = t1 - t0;
    if span <= 0.0 {
        return temp1;
    }
    temp0 + (t - t0) * (temp1 - temp0) / span
}

/// Index of the segment active at `elapsed_s`: the last point already reached.
pub fn segment_index(profile: &SolderProfile, elapsed_s: u32) -> Option<usize> {
    profile
        .points
        .iter()
        .rposition(|p| p.time_s <= elapsed_s)
}

/// Setpoint the runner targets at `elapsed_s`.
///
/// `None` once the stop point (or the end of the profile) has been reached.
pub fn setpoint_at(profile: &SolderProfile, ambient: f64, elapsed_s: u32) -> Option<f64> {
    let index = segment_index(profile, elapsed_s)?;
    let last = profile.points[index];
    if last.stop {
        return None;
    }
    let next = profile.points.get(index + 1)?;
    Some(interpolate(
        last.time_s as f64,
        last.temperature.resolve(ambient),
        next.time_s as f64,
        next.temperature.resolve(ambient),
        elapsed_s as f64,
    ))
}

/// Per-second target temperature from t=0 until the stop point.
pub fn target_curve(profile: &SolderProfile, ambient: f64) -> Vec<f64> {
    (0..)
        .map_while(|t| setpoint_at(profile, ambient, t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProfilePoint;
    use proptest::prelude::*;

    fn scenario() -> SolderProfile {
        SolderProfile::new(
            "Scenario",
            vec![
                ProfilePoint::at(0, 25.0),
                ProfilePoint::at(60, 150.0),
                ProfilePoint::at(120, 150.0),
                ProfilePoint::at(121, 0.0).with_stop(),
            ],
        )
    }

    #[test]
    fn scenario_setpoints() {
        let p = scenario();
        assert_eq!(setpoint_at(&p, 25.0, 0), Some(25.0));
        assert_eq!(setpoint_at(&p, 25.0, 30), Some(87.5));
        assert_eq!(setpoint_at(&p, 25.0, 60), Some(150.0));
        assert_eq!(setpoint_at(&p, 25.0, 90), Some(150.0));
        assert_eq!(setpoint_at(&p, 25.0, 120), Some(150.0));
        assert_eq!(setpoint_at(&p, 25.0, 121), None);
    }

    #[test]
    fn curve_stops_at_stop_point() {
        let curve = target_curve(&scenario(), 25.0);
        assert_eq!(curve.len(), 121);
        assert_eq!(curve[30], 87.5);
    }

    #[test]
    fn ambient_endpoints() {
        let p = SolderProfile::new(
            "Amb",
            vec![
                ProfilePoint::ambient(0),
                ProfilePoint::at(100, 120.0),
                ProfilePoint::ambient(200).with_stop(),
            ],
        );
        assert_eq!(setpoint_at(&p, 20.0, 0), Some(20.0));
        assert_eq!(setpoint_at(&p, 20.0, 50), Some(70.0));
    }

    #[test]
    fn zero_span_steps() {
        assert_eq!(interpolate(10.0, 100.0, 10.0, 200.0, 10.0), 200.0);
    }

    proptest! {
        #[test]
        fn interpolation_law(
            t0 in 1u32..200,
            len in 1u32..200,
            temp0 in 0.0f64..300.0,
            temp1 in 0.0f64..300.0,
            frac in 0.0f64..1.0,
        ) {
            let t1 = t0 + len;
            let t = t0 + ((len as f64) * frac) as u32;
            prop_assume!(t < t1);
            let p = SolderProfile::new(
                "prop",
                vec![
                    ProfilePoint::at(0, temp0),
                    ProfilePoint::at(t0, temp0),
                    ProfilePoint::at(t1, temp1),
                    ProfilePoint::at(t1 + 1, 0.0).with_stop(),
                ],
            );
            let sp = setpoint_at(&p, 25.0, t).unwrap();
            let expected = temp0 + (t - t0) as f64 * (temp1 - temp0) / (t1 - t0) as f64;
            prop_assert!((sp - expected).abs() < 1e-9);
            prop_assert!(sp >= temp0.min(temp1) - 1e-9 && sp <= temp0.max(temp1) + 1e-9);
        }
    }
}
