use proptest::prelude::*;
use rf_controls::{MixerConfig, OutputMixer};
use rf_core::FanSpeed;

fn hint() -> impl Strategy<Value = FanSpeed> {
    prop_oneof![
        Just(FanSpeed::Low),
        Just(FanSpeed::Medium),
        Just(FanSpeed::High)
    ]
}

fn mixer() -> impl Strategy<Value = OutputMixer> {
    (5.0f64..=100.0, 0.0f64..=20.0).prop_map(|(min, idle)| {
        OutputMixer::new(MixerConfig {
            minimum_fan_speed: min,
            idle_heater_duty: idle,
            ..MixerConfig::default()
        })
        .unwrap()
    })
}

proptest! {
    #[test]
    fn duties_stay_in_range(m in mixer(), out in -100.0f64..=100.0, h in hint()) {
        let d = m.mix_with_hint(out, h);
        prop_assert!(d.heater <= 100);
        prop_assert!(d.fan <= 100);
    }

    #[test]
    fn heating_implies_fan_floor(m in mixer(), out in -100.0f64..=100.0, h in hint()) {
        let d = m.mix_with_hint(out, h);
        if d.heater > 0 {
            prop_assert!(f64::from(d.fan) >= m.config().minimum_fan_speed.round());
        }
    }

    #[test]
    fn cooling_turns_heater_off(m in mixer(), out in -100.0f64..0.0, h in hint()) {
        let d = m.mix_with_hint(out, h);
        let min = m.config().minimum_fan_speed;
        let idle_bump = -out < min && m.fan_floor(h) <= min;
        if idle_bump {
            prop_assert_eq!(f64::from(d.heater), m.config().idle_heater_duty.round());
            prop_assert!(f64::from(d.fan) >= m.config().minimum_fan_speed.round());
        } else {
            prop_assert_eq!(d.heater, 0);
            prop_assert!(f64::from(d.fan) >= (-out).round());
        }
    }

    #[test]
    fn never_heats_with_a_raised_fan_floor(m in mixer(), out in -100.0f64..0.0, h in hint()) {
        let d = m.mix_with_hint(out, h);
        if m.fan_floor(h) > m.config().minimum_fan_speed {
            prop_assert_eq!(d.heater, 0);
        }
    }
}
