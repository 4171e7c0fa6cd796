//! CSV export of a run log.

use std::io::Write;

use rf_runner::DataPoint;

use crate::ResultsResult;

fn cell(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        String::new()
    }
}

/// One row per point. Faulted channels and a missing target are left blank.
pub fn write_csv<W: Write>(out: &mut W, points: &[DataPoint]) -> ResultsResult<()> {
    writeln!(
        out,
        "time_s,state,target_c,average_c,heater_pct,fan_pct,tc1_c,tc2_c,tc3_c,tc4_c,tc1_status,tc2_status,tc3_status,tc4_status"
    )?;
    for p in points {
        let temps: Vec<String> = p.thermocouples.iter().map(|t| cell(t.temperature)).collect();
        let statuses: Vec<&str> = p.thermocouples.iter().map(|t| t.status.short_name()).collect();
        writeln!(
            out,
            "{},{:?},{},{},{},{},{},{}",
            p.time_s,
            p.state,
            cell(p.target),
            cell(p.average_temperature()),
            p.heater,
            p.fan,
            temps.join(","),
            statuses.join(","),
        )?;
    }
    Ok(())
}
