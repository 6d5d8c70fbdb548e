//! Append-only run log carrying realized MPC outputs to the caller.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::sim::microgrid::StepRecord;

/// Columnar, append-only table of realized outputs keyed by
/// `(module name, instance index, field)` across the timestep axis.
///
/// One row per executed control step; rows are immutable once written. The
/// column set is fixed by the first record pushed.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    columns: BTreeMap<(String, usize, String), Vec<f64>>,
    rows: usize,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executed steps recorded.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Appends one step's realized outputs as a new row.
    pub fn push_record(&mut self, record: &StepRecord) {
        for (key, output) in &record.outputs {
            for (field, value) in &output.fields {
                let column = self
                    .columns
                    .entry((key.name.clone(), key.index, (*field).to_string()))
                    .or_insert_with(|| vec![0.0; self.rows]);
                column.push(*value);
            }
        }
        self.rows += 1;
        // A module absent from a later record would leave a short column.
        debug_assert!(self.columns.values().all(|c| c.len() == self.rows));
    }

    /// The per-step values of one `(name, index, field)` column.
    pub fn get(&self, name: &str, index: usize, field: &str) -> Option<&[f64]> {
        self.columns
            .get(&(name.to_string(), index, field.to_string()))
            .map(Vec::as_slice)
    }

    /// All column keys, ordered.
    pub fn column_keys(&self) -> impl Iterator<Item = &(String, usize, String)> {
        self.columns.keys()
    }

    /// Sum of one column over all recorded steps (zero if absent).
    pub fn total(&self, name: &str, index: usize, field: &str) -> f64 {
        self.get(name, index, field)
            .map(|c| c.iter().sum())
            .unwrap_or(0.0)
    }

    /// Sum of a field over all module instances carrying it.
    pub fn field_total(&self, field: &str) -> f64 {
        self.columns
            .iter()
            .filter(|((_, _, f), _)| f == field)
            .flat_map(|(_, c)| c.iter())
            .sum()
    }

    /// Writes the log as CSV: a `step` column followed by one
    /// `name[index].field` column per key.
    pub fn write_csv(&self, writer: impl Write) -> io::Result<()> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);

        let mut header = vec!["step".to_string()];
        header.extend(
            self.columns
                .keys()
                .map(|(name, index, field)| format!("{name}[{index}].{field}")),
        );
        wtr.write_record(&header)?;

        for row in 0..self.rows {
            let mut record = vec![row.to_string()];
            record.extend(self.columns.values().map(|c| format!("{:.6}", c[row])));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Aggregate totals of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSummary {
    /// Number of executed steps.
    pub steps: usize,
    pub load_met: f64,
    pub renewable_used: f64,
    pub genset_production: f64,
    pub grid_import: f64,
    pub grid_export: f64,
    pub loss_load: f64,
    pub overgeneration: f64,
}

impl DispatchSummary {
    /// Sums the standard per-kind fields across all instances in the log.
    pub fn from_log(log: &RunLog) -> Self {
        Self {
            steps: log.len(),
            load_met: log.field_total("load_met"),
            renewable_used: log.field_total("renewable_used"),
            genset_production: log.field_total("genset_production"),
            grid_import: log.field_total("grid_import"),
            grid_export: log.field_total("grid_export"),
            loss_load: log.field_total("loss_load"),
            overgeneration: log.field_total("overgeneration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::types::{ModuleKey, StepOutput};

    fn record(step: usize, load: f64, used: f64) -> StepRecord {
        StepRecord {
            step,
            outputs: vec![
                (
                    ModuleKey::new("load", 0),
                    StepOutput {
                        fields: vec![("load_met", load)],
                        provided: 0.0,
                        absorbed: load,
                        cost: 0.0,
                    },
                ),
                (
                    ModuleKey::new("pv", 0),
                    StepOutput {
                        fields: vec![("renewable_used", used), ("curtailment", 0.0)],
                        provided: used,
                        absorbed: 0.0,
                        cost: 0.0,
                    },
                ),
            ],
            residual: used - load,
            total_cost: 0.0,
        }
    }

    #[test]
    fn rows_accumulate_per_record() {
        let mut log = RunLog::new();
        assert!(log.is_empty());
        log.push_record(&record(0, 60.0, 50.0));
        log.push_record(&record(1, 60.0, 40.0));
        assert_eq!(log.len(), 2);
        assert_eq!(log.get("pv", 0, "renewable_used"), Some(&[50.0, 40.0][..]));
        assert_eq!(log.get("load", 0, "load_met"), Some(&[60.0, 60.0][..]));
        assert_eq!(log.get("load", 1, "load_met"), None);
    }

    #[test]
    fn addressing_is_name_driven() {
        let mut log = RunLog::new();
        log.push_record(&record(0, 60.0, 50.0));
        assert!(log.get("renewable", 0, "renewable_used").is_none());
        assert!(log.get("pv", 0, "renewable_used").is_some());
    }

    #[test]
    fn totals_sum_columns() {
        let mut log = RunLog::new();
        log.push_record(&record(0, 60.0, 50.0));
        log.push_record(&record(1, 60.0, 40.0));
        assert_eq!(log.total("pv", 0, "renewable_used"), 90.0);
        assert_eq!(log.field_total("load_met"), 120.0);
    }

    #[test]
    fn summary_aggregates_fields() {
        let mut log = RunLog::new();
        log.push_record(&record(0, 60.0, 50.0));
        let summary = DispatchSummary::from_log(&log);
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.load_met, 60.0);
        assert_eq!(summary.renewable_used, 50.0);
        assert_eq!(summary.genset_production, 0.0);
    }

    #[test]
    fn csv_has_header_and_one_row_per_step() {
        let mut log = RunLog::new();
        log.push_record(&record(0, 60.0, 50.0));
        log.push_record(&record(1, 60.0, 40.0));

        let mut out = Vec::new();
        log.write_csv(&mut out).expect("csv export should succeed");
        let csv = String::from_utf8(out).expect("csv output should be valid UTF-8");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("step,load[0].load_met,pv[0].curtailment,pv[0].renewable_used")
        );
        assert_eq!(lines.count(), 2);
    }
}
