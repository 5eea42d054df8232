use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::types::ResultsTable;
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::{decode, encode};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn run_simulation(&self) -> Result<()> {
        let engine = Engine::new(
            self.cfg.model.clone(),
            self.cfg.time,
            self.cfg.solver.clone(),
        )
        .context("failed to construct engine")?;

        let table = engine
            .simulate_years(self.cfg.output.n_years, &self.cfg.init)
            .context("failed to simulate years")?;
        log::info!("simulated {} years", table.n_years());

        let run_dirs = self.run_dirs().context("failed to list run dirs")?;
        let run_idx = run_dirs.last().map_or(0, |(idx, _)| idx + 1);
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let results_file = self.results_file(run_idx);
        save_table(&table, &results_file)
            .with_context(|| format!("failed to save {results_file:?}"))?;
        log::info!("saved {results_file:?}");

        Ok(())
    }

    pub fn run_analysis(&self) -> Result<()> {
        for (run_idx, _) in self.run_dirs().context("failed to list run dirs")? {
            let results_file = self.results_file(run_idx);
            if !results_file.is_file() {
                log::warn!("skipped {results_file:?} (missing)");
                continue;
            }
            let table = load_table(&results_file)
                .with_context(|| format!("failed to load {results_file:?}"))?;

            let mut analyzer =
                Analyzer::new(&table).context("failed to construct analyzer")?;
            analyzer.add_table(&table).context("failed to add table")?;

            let analysis_file = self.analysis_file(run_idx);
            analyzer
                .save_results(&analysis_file)
                .context("failed to save results")?;
            log::info!("saved {analysis_file:?}");
        }

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for (_, run_dir) in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        Ok(())
    }

    /// Existing `run-NNNN` dirs, sorted by index.
    fn run_dirs(&self) -> Result<Vec<(usize, PathBuf)>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut run_dirs: Vec<_> = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .filter_map(|p| Some((parse_run_idx(&p)?, p)))
            .collect();
        run_dirs.sort_unstable_by_key(|(idx, _)| *idx);
        Ok(run_dirs)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }

    fn analysis_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("analysis.json")
    }
}

fn parse_run_idx(run_dir: &Path) -> Option<usize> {
    run_dir
        .file_name()?
        .to_str()?
        .strip_prefix("run-")?
        .parse()
        .ok()
}

fn save_table(table: &ResultsTable, file: &Path) -> Result<()> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, table).context("failed to serialize results")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

fn load_table(file: &Path) -> Result<ResultsTable> {
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let table = decode::from_read(&mut reader).context("failed to deserialize results")?;
    Ok(table)
}
