//! Factory profiles shipped with the controller.

use crate::schema::{FanSpeed, ProfilePoint, SolderProfile, Thresholds};

fn locked(mut profile: SolderProfile) -> SolderProfile {
    profile.editable = false;
    profile
}

/// Amtech 4300 63Sn/37Pb paste.
pub fn amtech_4300() -> SolderProfile {
    let mut p = SolderProfile::new(
        "Amtech 4300 63Sn/37Pb",
        vec![
            ProfilePoint::ambient(0),
            ProfilePoint::at(90, 140.0),
            ProfilePoint::at(210, 183.0),
            ProfilePoint::at(230, 210.0),
            ProfilePoint::at(250, 210.0).with_fan(FanSpeed::Medium),
            ProfilePoint::ambient(360).with_stop(),
        ],
    );
    p.thresholds = Some(Thresholds {
        liquidus_c: 183.0,
        soak_start_c: 140.0,
        soak_end_c: 183.0,
        peak_c: 210.0,
    });
    locked(p)
}

/// Compressed version of a leaded profile for quick checkout.
pub fn short_test() -> SolderProfile {
    locked(SolderProfile::new(
        "Short Test",
        vec![
            ProfilePoint::ambient(0),
            ProfilePoint::at(20, 140.0),
            ProfilePoint::at(40, 183.0),
            ProfilePoint::at(60, 210.0),
            ProfilePoint::at(80, 210.0).with_fan(FanSpeed::Medium),
            ProfilePoint::ambient(100).with_stop(),
        ],
    ))
}

/// Slow ramp and hold for tuning the loop.
pub fn ramp_test() -> SolderProfile {
    locked(SolderProfile::new(
        "Ramp Test",
        vec![
            ProfilePoint::ambient(0),
            ProfilePoint::at(200, 240.0),
            ProfilePoint::at(300, 240.0).with_fan(FanSpeed::Medium),
            ProfilePoint::ambient(500).with_stop(),
        ],
    ))
}

/// Step changes up and down for measuring the oven response.
pub fn step_test() -> SolderProfile {
    locked(SolderProfile::new(
        "Step Test",
        vec![
            ProfilePoint::ambient(0),
            ProfilePoint::at(100, 150.0),
            ProfilePoint::at(200, 150.0),
            ProfilePoint::at(201, 220.0),
            ProfilePoint::at(400, 220.0),
            ProfilePoint::at(401, 150.0),
            ProfilePoint::at(500, 150.0),
            ProfilePoint::ambient(540).with_stop(),
        ],
    ))
}

pub fn all() -> Vec<SolderProfile> {
    vec![amtech_4300(), short_test(), ramp_test(), step_test()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_profile;

    #[test]
    fn builtins_validate_and_are_locked() {
        for p in all() {
            validate_profile(&p).unwrap();
            assert!(!p.editable, "{} should be locked", p.description);
        }
    }
}
