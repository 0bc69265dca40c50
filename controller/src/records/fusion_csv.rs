use fusioncore::FusionEvent;
use std::io::{self, Write};

const HEADER: &str = "fusion_id,utc,time_skew_s,max_temp,imagery_fire,raw_signal,confirmations,window_fill,decision,thermal_shape,num_detections,thermal_distance_m,imagery_distance_m";

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_default()
}

/// One CSV row per fusion event, flushed as it is written.
pub struct FusionCsvWriter<W: Write> {
    out: W,
}

impl<W: Write> FusionCsvWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", HEADER)?;
        out.flush()?;
        Ok(Self { out })
    }

    pub fn write(&mut self, event: &FusionEvent) -> io::Result<()> {
        writeln!(
            self.out,
            "{},{},{:.6},{:.2},{},{},{},{},{},{},{},{},{}",
            event.id,
            event.utc_iso(),
            event.time_skew_s,
            event.max_temperature,
            event.imagery_has_fire,
            event.raw_signal,
            event.confirmations,
            event.window_fill,
            event.decision,
            event.thermal_shape,
            event.detection_count,
            optional(event.thermal_distance_m),
            optional(event.imagery_distance_m),
        )?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::sample_event;

    #[test]
    fn writes_header_then_one_row_per_event() {
        let mut writer = FusionCsvWriter::new(Vec::new()).unwrap();
        writer.write(&sample_event(1, true)).unwrap();
        writer.write(&sample_event(2, false)).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "1,2024-05-01T12:00:00.000Z,0.000500,120.00,true,true,3,5,true,2x2,1,25.000,"
        );
        assert!(lines[2].starts_with("2,"));
        assert_eq!(lines[1].split(',').count(), HEADER.split(',').count());
    }
}
