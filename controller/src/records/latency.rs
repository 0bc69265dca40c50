use fusioncore::FusionEvent;
use std::io::{self, Write};

/// One JSON object per line with the latency breakdown of each event.
pub struct LatencyJsonlWriter<W: Write> {
    out: W,
}

impl<W: Write> LatencyJsonlWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write(&mut self, event: &FusionEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, &event.latency_record())?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
