//! Concurrent readers always observe a measurement from one complete update.

use std::sync::Arc;
use std::thread;

use rf_sensors::max31855::encode;
use rf_sensors::{OVERSAMPLES, TemperatureAggregator, ThermocoupleChannel};

fn generation_counter() -> Box<dyn ThermocoupleChannel> {
    let mut reads = 0u32;
    Box::new(move || {
        let generation = reads / OVERSAMPLES as u32;
        reads += 1;
        encode(generation as f64, 25.0)
    })
}

#[test]
fn readers_see_whole_updates() {
    let agg = Arc::new(TemperatureAggregator::new([
        generation_counter(),
        generation_counter(),
        generation_counter(),
        generation_counter(),
    ]));

    let writers: Vec<_> = (0..2)
        .map(|_| {
            let agg = Arc::clone(&agg);
            thread::spawn(move || {
                for _ in 0..200 {
                    let t = agg.get_temperature();
                    assert!(t.is_finite());
                }
            })
        })
        .collect();

    let reader = {
        let agg = Arc::clone(&agg);
        thread::spawn(move || {
            for _ in 0..2000 {
                let m = agg.last_measurement();
                if m.average.is_nan() {
                    continue;
                }
                let first = m.channels[0].temperature;
                assert!(m.channels.iter().all(|c| c.temperature == first));
                assert_eq!(m.average, first);
            }
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(agg.last_measurement().average, 399.0);
}
