//! Monthly report records and where they go.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::systems::fahrenheit_to_celsius;
use crate::world::{PhaseCounts, StateSnapshot};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// One completed month as seen by the coordinator after every agent published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthReport {
    pub month: u32,
    pub year: i32,
    pub precipitation: f32,
    pub temperature_c: f32,
    pub prey: u32,
    pub predator: u32,
    pub vegetation_height: f32,
}

impl MonthReport {
    pub fn from_snapshot(snapshot: &StateSnapshot) -> Self {
        Self {
            month: snapshot.clock.month,
            year: snapshot.clock.year,
            precipitation: snapshot.environment.precipitation,
            temperature_c: fahrenheit_to_celsius(snapshot.environment.temperature),
            prey: snapshot.prey.count,
            predator: snapshot.predator.count,
            vegetation_height: snapshot.vegetation.height,
        }
    }
}

/// `month,year,precip,temp_c,prey,predator,height` with six decimals on reals.
impl fmt::Display for MonthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{:.6},{:.6},{},{},{:.6}",
            self.month,
            self.year,
            self.precipitation,
            self.temperature_c,
            self.prey,
            self.predator,
            self.vegetation_height
        )
    }
}

/// Receives reports in order from the coordinator thread.
pub trait ReportSink: Send {
    /// `phases` is the phase ledger at the moment of reporting.
    fn emit(&mut self, report: &MonthReport, phases: PhaseCounts) -> Result<(), ReportError>;

    fn finish(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}

pub struct CsvSink<W> {
    out: W,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ReportSink for CsvSink<W> {
    fn emit(&mut self, report: &MonthReport, _phases: PhaseCounts) -> Result<(), ReportError> {
        writeln!(self.out, "{report}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.out.flush()?;
        Ok(())
    }
}

pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn emit(&mut self, report: &MonthReport, _phases: PhaseCounts) -> Result<(), ReportError> {
        serde_json::to_writer(&mut self.out, report)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.out.flush()?;
        Ok(())
    }
}

/// In-memory log. Clones share the same entries, so a handle kept by the
/// caller sees what the coordinator recorded.
#[derive(Debug, Clone, Default)]
pub struct ReportLog {
    entries: Arc<Mutex<Vec<(MonthReport, PhaseCounts)>>>,
}

impl ReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<MonthReport> {
        self.lock().iter().map(|(report, _)| *report).collect()
    }

    pub fn entries(&self) -> Vec<(MonthReport, PhaseCounts)> {
        self.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|(report, _)| report.to_string())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(MonthReport, PhaseCounts)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReportSink for ReportLog {
    fn emit(&mut self, report: &MonthReport, phases: PhaseCounts) -> Result<(), ReportError> {
        self.lock().push((*report, phases));
        Ok(())
    }
}

/// Adapts a closure into a sink.
pub struct HookSink<F> {
    hook: F,
}

impl<F> HookSink<F>
where
    F: FnMut(&MonthReport) + Send,
{
    pub fn new(hook: F) -> Self {
        Self { hook }
    }
}

impl<F> ReportSink for HookSink<F>
where
    F: FnMut(&MonthReport) + Send,
{
    fn emit(&mut self, report: &MonthReport, _phases: PhaseCounts) -> Result<(), ReportError> {
        (self.hook)(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> MonthReport {
        MonthReport {
            month: 3,
            year: 2024,
            precipitation: 12.5,
            temperature_c: 10.0,
            prey: 7,
            predator: 2,
            vegetation_height: 0.25,
        }
    }

    #[test]
    fn csv_line_matches_printf_layout() {
        assert_eq!(
            report().to_string(),
            "3,2024,12.500000,10.000000,7,2,0.250000"
        );
    }

    #[test]
    fn csv_sink_writes_one_line_per_report() {
        let mut sink = CsvSink::new(Vec::new());
        sink.emit(&report(), PhaseCounts::default()).unwrap();
        sink.emit(&report(), PhaseCounts::default()).unwrap();
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn json_sink_emits_parseable_lines() {
        let mut buffer = Vec::new();
        {
            let mut sink = JsonLinesSink::new(&mut buffer);
            sink.emit(&report(), PhaseCounts::default()).unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        let parsed: MonthReport = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed, report());
    }

    #[test]
    fn report_log_clones_share_entries() {
        let log = ReportLog::new();
        let mut writer = log.clone();
        writer
            .emit(
                &report(),
                PhaseCounts {
                    computed: 4,
                    published: 4,
                },
            )
            .unwrap();

        assert_eq!(log.reports(), vec![report()]);
        assert_eq!(log.entries()[0].1.published, 4);
        assert_eq!(log.lines()[0], report().to_string());
    }
}
