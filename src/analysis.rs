use crate::season::is_winter;
use crate::stats::Accumulator;
use crate::types::{ResultsTable, TimeParam};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::{fs::File, io::BufWriter, path::Path};

/// Observable computed year by year from a [`ResultsTable`].
pub trait Obs {
    fn update(&mut self, table: &ResultsTable, year: usize) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

fn column<'a>(table: &'a ResultsTable, year: usize, name: &str) -> Result<&'a [f64]> {
    table
        .get(year, name)
        .with_context(|| format!("results have no column {name:?} for year {year}"))
}

#[derive(Debug, Serialize)]
struct Peak {
    year: usize,
    value: f64,
    time: f64,
}

/// Largest infected count of each year and when it occurs.
pub struct PeakInfected {
    peaks: Vec<Peak>,
    value_acc: Accumulator,
    time_acc: Accumulator,
}

impl PeakInfected {
    pub fn new() -> Self {
        Self {
            peaks: Vec::new(),
            value_acc: Accumulator::new(),
            time_acc: Accumulator::new(),
        }
    }
}

impl Obs for PeakInfected {
    fn update(&mut self, table: &ResultsTable, year: usize) -> Result<()> {
        let times = column(table, year, ResultsTable::TIME_COLUMN)?;
        let (i_peak, &value) = column(table, year, "I")?
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .context("year has no samples")?;
        let time = times[i_peak];
        self.value_acc.add(value);
        self.time_acc.add(time - times[0]);
        self.peaks.push(Peak { year, value, time });
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "peak_infected": {
                "years": self.peaks,
                "value": self.value_acc.report(),
                "time_in_year": self.time_acc.report(),
            }
        })
    }
}

/// Last sampled state of each year.
pub struct YearEnd {
    state_labels: Vec<String>,
    ends: Vec<serde_json::Value>,
}

impl YearEnd {
    pub fn new(state_labels: &[String]) -> Self {
        Self {
            state_labels: state_labels.to_vec(),
            ends: Vec::new(),
        }
    }
}

impl Obs for YearEnd {
    fn update(&mut self, table: &ResultsTable, year: usize) -> Result<()> {
        let mut state = serde_json::Map::new();
        for label in &self.state_labels {
            let last = column(table, year, label)?
                .last()
                .copied()
                .context("year has no samples")?;
            state.insert(label.clone(), last.into());
        }
        self.ends.push(serde_json::json!({ "year": year, "state": state }));
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "year_end": self.ends })
    }
}

/// Winter interval of each year on the global calendar, for shading plots.
///
/// Also counts the samples of each year that fall inside winter, which is zero
/// for compact models.
pub struct WinterIntervals {
    time: TimeParam,
    intervals: Vec<(f64, f64)>,
    n_samples: Vec<usize>,
}

impl WinterIntervals {
    pub fn new(time: TimeParam) -> Self {
        Self {
            time,
            intervals: Vec::new(),
            n_samples: Vec::new(),
        }
    }
}

impl Obs for WinterIntervals {
    fn update(&mut self, table: &ResultsTable, year: usize) -> Result<()> {
        let year_start = (year - 1) as f64 * self.time.year_length;
        let (winter_start, winter_end) = self.time.winter_span();
        self.intervals.push((year_start + winter_start, year_start + winter_end));

        let times = column(table, year, ResultsTable::TIME_COLUMN)?;
        let labels = is_winter(times, &self.time);
        self.n_samples.push(labels.iter().filter(|&&label| label == 1).count());
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "winter_intervals": self.intervals,
            "winter_samples": self.n_samples,
        })
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    /// Build the observables for `table`, using the calendar it was simulated with.
    pub fn new(table: &ResultsTable) -> Result<Self> {
        let state_labels = match table.columns.split_first() {
            Some((first, rest)) if first == ResultsTable::TIME_COLUMN => rest,
            _ => bail!("results must start with a time column"),
        };
        if !state_labels.iter().any(|label| label == "I") {
            bail!("results have no infected column");
        }

        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(PeakInfected::new()));
        obs_ptr_vec.push(Box::new(YearEnd::new(state_labels)));
        obs_ptr_vec.push(Box::new(WinterIntervals::new(table.time)));
        Ok(Self { obs_ptr_vec })
    }

    pub fn add_table(&mut self, table: &ResultsTable) -> Result<()> {
        for year in 1..=table.n_years() {
            for obs in &mut self.obs_ptr_vec {
                obs.update(table, year)
                    .with_context(|| format!("failed to update observable for year {year}"))?;
            }
        }
        Ok(())
    }

    pub fn reports(&self) -> Vec<serde_json::Value> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.reports())
            .context("failed to serialize reports")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Trajectory;

    fn row(times: &[f64], inf: &[f64]) -> Trajectory {
        let mut traj = Trajectory::with_capacity(3, times.len());
        for (&t, &i) in times.iter().zip(inf) {
            traj.push(t, &[1.0, 10.0 - i, i]);
        }
        traj
    }

    fn calendar() -> TimeParam {
        TimeParam {
            year_length: 4.0,
            growing_length: 2.0,
            step: 1.0,
        }
    }

    fn table() -> ResultsTable {
        let mut table = ResultsTable::new(&["P", "S", "I"], 2, calendar());
        table.years.push(row(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 0.0, 0.0]));
        table.years.push(row(&[4.0, 5.0, 6.0, 7.0], &[2.0, 1.0, 0.0, 0.0]));
        table
    }

    fn analyze(table: &ResultsTable) -> Vec<serde_json::Value> {
        let mut analyzer = Analyzer::new(table).unwrap();
        analyzer.add_table(table).unwrap();
        analyzer.reports()
    }

    #[test]
    fn reports_peaks_per_year() {
        let reports = analyze(&table());

        let peaks = &reports[0]["peak_infected"];
        assert_eq!(peaks["years"][0]["value"], 3.0);
        assert_eq!(peaks["years"][0]["time"], 1.0);
        assert_eq!(peaks["years"][1]["value"], 2.0);
        assert_eq!(peaks["years"][1]["time"], 4.0);
        assert_eq!(peaks["value"]["mean"], 2.5);
        assert_eq!(peaks["time_in_year"]["mean"], 0.5);
    }

    #[test]
    fn reports_year_end_state() {
        let reports = analyze(&table());

        let ends = &reports[1]["year_end"];
        assert_eq!(ends[1]["year"], 2);
        assert_eq!(ends[1]["state"]["S"], 10.0);
        assert_eq!(ends[1]["state"]["P"], 1.0);
    }

    #[test]
    fn reports_winter_intervals() {
        let reports = analyze(&table());

        assert_eq!(
            reports[2]["winter_intervals"],
            serde_json::json!([[2.0, 4.0], [6.0, 8.0]])
        );
        assert_eq!(reports[2]["winter_samples"], serde_json::json!([2, 2]));
    }

    #[test]
    fn compact_runs_still_report_winters() {
        let mut table = ResultsTable::new(&["S", "I"], 2, calendar());
        for times in [[0.0, 1.0], [4.0, 5.0]] {
            let mut traj = Trajectory::with_capacity(2, 2);
            for t in times {
                traj.push(t, &[9.0, 1.0]);
            }
            table.years.push(traj);
        }
        let reports = analyze(&table);

        assert_eq!(
            reports[2]["winter_intervals"],
            serde_json::json!([[2.0, 4.0], [6.0, 8.0]])
        );
        assert_eq!(reports[2]["winter_samples"], serde_json::json!([0, 0]));
        assert!(reports[1]["year_end"][0]["state"].get("P").is_none());
    }

    #[test]
    fn follows_calendar_stored_in_table() {
        let mut table = table();
        table.time = TimeParam {
            growing_length: 3.0,
            ..calendar()
        };
        let reports = analyze(&table);

        assert_eq!(
            reports[2]["winter_intervals"],
            serde_json::json!([[3.0, 4.0], [7.0, 8.0]])
        );
        assert_eq!(reports[2]["winter_samples"], serde_json::json!([1, 1]));
    }

    #[test]
    fn requires_infected_column() {
        let table = ResultsTable::new(&["P", "S"], 1, calendar());
        assert!(Analyzer::new(&table).is_err());
    }
}
