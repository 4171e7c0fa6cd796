//! Profile sequencing: elapsed time to setpoint, one tick at a time.
//!
//! This is the state that the tick handler owns. It is free of I/O so it can
//! be stepped directly in tests.

use rf_core::FanSpeed;
use rf_profile::{SolderProfile, interpolate};

/// Highest ambient temperature used as a profile baseline.
pub const AMBIENT_CLAMP_C: f64 = 35.0;

/// Clamp a raw oven reading for use as the ambient baseline.
///
/// A hot oven would otherwise inflate the first segment.
pub fn capture_ambient(raw: f64, clamp_c: f64) -> f64 {
    raw.min(clamp_c)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunState {
    pub elapsed_s: u32,
    pub segment: usize,
    pub completed: bool,
    pub ambient: f64,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickAction {
    /// Run already finished; nothing to do.
    Idle,
    /// Run finished on this tick; the setpoint must go to zero.
    Complete,
    /// Keep running towards `setpoint` with at least `fan`.
    Setpoint { setpoint: f64, fan: FanSpeed },
}

#[derive(Debug, Clone)]
pub struct ProfileSequencer {
    profile: SolderProfile,
    state: RunState,
}

impl ProfileSequencer {
    pub fn new(profile: SolderProfile, ambient: f64) -> Self {
        Self {
            profile,
            state: RunState {
                elapsed_s: 0,
                segment: 0,
                completed: false,
                ambient,
            },
        }
    }

    pub fn profile(&self) -> &SolderProfile {
        &self.profile
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed
    }

    /// Setpoint at t=0, used when enabling the controller.
    pub fn initial_setpoint(&self) -> f64 {
        self.profile
            .points
            .first()
            .map_or(0.0, |p| p.temperature.resolve(self.state.ambient))
    }

    /// Mark the run finished. Later ticks are no-ops.
    pub fn abort(&mut self) {
        self.state.completed = true;
    }

    pub fn tick(&mut self) -> TickAction {
        let st = &mut self.state;
        if st.completed {
            return TickAction::Idle;
        }
        let points = &self.profile.points;
        if points.is_empty() || st.segment + 1 >= points.len() {
            st.completed = true;
            return TickAction::Complete;
        }

        st.elapsed_s += 1;
        while st.segment + 1 < points.len() && st.elapsed_s >= points[st.segment + 1].time_s {
            st.segment += 1;
        }

        let last = points[st.segment];
        if last.stop {
            st.completed = true;
            return TickAction::Complete;
        }
        let Some(next) = points.get(st.segment + 1) else {
            st.completed = true;
            return TickAction::Complete;
        };

        let last_temp = last.temperature.resolve(st.ambient);
        let next_temp = next.temperature.resolve(st.ambient);
        let setpoint = interpolate(
            last.time_s as f64,
            last_temp,
            next.time_s as f64,
            next_temp,
            st.elapsed_s as f64,
        );
        let fan = if next_temp < last_temp {
            last.fan.max(FanSpeed::Medium)
        } else {
            last.fan
        };
        TickAction::Setpoint { setpoint, fan }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rf_profile::{ProfilePoint, builtin, setpoint_at};

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

    fn run_to(seq: &mut ProfileSequencer, t: u32) -> TickAction {
        let mut last = TickAction::Idle;
        while seq.state().elapsed_s < t && !seq.is_completed() {
            last = seq.tick();
        }
        last
    }

    fn setpoint(action: TickAction) -> f64 {
        match action {
            TickAction::Setpoint { setpoint, .. } => setpoint,
            other => panic!("expected setpoint, got {other:?}"),
        }
    }

    #[test]
    fn scenario_setpoints() {
        let mut seq = ProfileSequencer::new(scenario(), 25.0);
        assert_eq!(seq.initial_setpoint(), 25.0);
        assert!((setpoint(run_to(&mut seq, 30)) - 87.5).abs() < 1e-9);
        assert_eq!(setpoint(run_to(&mut seq, 60)), 150.0);
        assert_eq!(setpoint(run_to(&mut seq, 90)), 150.0);
        assert_eq!(run_to(&mut seq, 121), TickAction::Complete);
        assert_eq!(seq.state().elapsed_s, 121);
        assert!(seq.is_completed());
    }

    #[test]
    fn completion_is_idempotent() {
        let mut seq = ProfileSequencer::new(scenario(), 25.0);
        run_to(&mut seq, 121);
        for _ in 0..5 {
            assert_eq!(seq.tick(), TickAction::Idle);
        }
        assert_eq!(seq.state().elapsed_s, 121);
    }

    #[test]
    fn abort_stops_ticking() {
        let mut seq = ProfileSequencer::new(scenario(), 25.0);
        run_to(&mut seq, 10);
        seq.abort();
        assert_eq!(seq.tick(), TickAction::Idle);
        assert_eq!(seq.state().elapsed_s, 10);
    }

    #[test]
    fn malformed_profiles_complete() {
        let mut empty = ProfileSequencer::new(SolderProfile::new("e", vec![]), 25.0);
        assert_eq!(empty.tick(), TickAction::Complete);

        let mut single = ProfileSequencer::new(
            SolderProfile::new("s", vec![ProfilePoint::at(0, 100.0)]),
            25.0,
        );
        assert_eq!(single.tick(), TickAction::Complete);
        assert_eq!(single.state().elapsed_s, 0);

        // No stop point: completes on reaching the last point.
        let mut open = ProfileSequencer::new(
            SolderProfile::new("o", vec![ProfilePoint::at(0, 20.0), ProfilePoint::at(2, 40.0)]),
            25.0,
        );
        assert_eq!(setpoint(open.tick()), 30.0);
        assert_eq!(open.tick(), TickAction::Complete);
    }

    #[test]
    fn ambient_sentinel_uses_capture() {
        let p = SolderProfile::new(
            "a",
            vec![
                ProfilePoint::ambient(0),
                ProfilePoint::at(10, 125.0),
                ProfilePoint::ambient(20).with_stop(),
            ],
        );
        let ambient = capture_ambient(60.0, AMBIENT_CLAMP_C);
        assert_eq!(ambient, 35.0);
        let mut seq = ProfileSequencer::new(p, ambient);
        assert_eq!(seq.initial_setpoint(), 35.0);
        assert_eq!(setpoint(seq.tick()), 44.0);
        assert_eq!(capture_ambient(22.0, AMBIENT_CLAMP_C), 22.0);
    }

    #[test]
    fn cooling_segments_raise_the_fan() {
        let mut seq = ProfileSequencer::new(scenario(), 25.0);
        let TickAction::Setpoint { fan, .. } = run_to(&mut seq, 10) else {
            panic!("still running");
        };
        assert_eq!(fan, FanSpeed::Low);
        // 120..121 drops to 0 degC.
        let TickAction::Setpoint { fan, .. } = run_to(&mut seq, 120) else {
            panic!("still running");
        };
        assert_eq!(fan, FanSpeed::Medium);
    }

    #[test]
    fn agrees_with_lookup_for_builtins() {
        for profile in builtin::all() {
            let ambient = 21.0;
            let curve_end = profile.duration_s();
            let mut seq = ProfileSequencer::new(profile.clone(), ambient);
            for t in 1..=curve_end {
                let action = seq.tick();
                match setpoint_at(&profile, ambient, t) {
                    Some(expected) => assert!((setpoint(action) - expected).abs() < 1e-9),
                    None => assert_eq!(action, TickAction::Complete),
                }
            }
            assert!(seq.is_completed(), "{} did not complete", profile.description);
        }
    }

    proptest! {
        #[test]
        fn setpoints_stay_between_neighbours(
            steps in proptest::collection::vec((1u32..60, 20.0f64..260.0), 1..8),
            ambient in 10.0f64..35.0,
        ) {
            let mut points = vec![ProfilePoint::ambient(0)];
            let mut t = 0;
            for (dt, temp) in &steps {
                t += dt;
                points.push(ProfilePoint::at(t, *temp));
            }
            points.push(ProfilePoint::at(t + 1, 0.0).with_stop());
            let lo = steps.iter().map(|s| s.1).fold(ambient.min(0.0), f64::min);
            let hi = steps.iter().map(|s| s.1).fold(ambient, f64::max);

            let mut seq = ProfileSequencer::new(SolderProfile::new("p", points), ambient);
            let mut ticks = 0;
            while !seq.is_completed() {
                if let TickAction::Setpoint { setpoint, .. } = seq.tick() {
                    prop_assert!(setpoint >= lo - 1e-9 && setpoint <= hi + 1e-9);
                }
                ticks += 1;
                prop_assert!(ticks <= t + 1);
            }
            prop_assert_eq!(seq.state().elapsed_s, t + 1);
        }
    }
}
