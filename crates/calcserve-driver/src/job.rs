use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fs;
use std::ops::{Range, RangeInclusive};
use std::path::{Path, PathBuf};

use calcserve::{Client, Task, TaskKind};

use crate::sink::{OutputFormat, Record, RecordSink};

const COUNT_RANGE: RangeInclusive<usize> = 1..=1_000_000;
const OPERAND_RANGE: Range<f64> = 0.0..10.0;
const EXPONENT_RANGE: RangeInclusive<i32> = 0..=10;

/// One producer's workload: `count` random tasks of a single kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub kind: TaskKind,
    pub count: usize,
}

impl JobSpec {
    pub fn random_task<R: Rng>(&self, rng: &mut R) -> Task {
        let operand = rng.random_range(OPERAND_RANGE);
        match self.kind {
            TaskKind::Sine => Task::sine(operand),
            TaskKind::SquareRoot => Task::square_root(operand),
            TaskKind::Power => Task::power(operand, rng.random_range(EXPONENT_RANGE)),
        }
    }
}

/// Parses `KIND:COUNT`, e.g. `sine:100` or `Power:5`.
pub fn parse_job(s: &str) -> std::result::Result<JobSpec, String> {
    let (kind, count) = s
        .split_once(':')
        .ok_or_else(|| format!("`{s}` is not of the form KIND:COUNT"))?;

    let kind = kind.parse::<TaskKind>().map_err(|e| e.to_string())?;
    let count: usize = count
        .trim()
        .parse()
        .map_err(|_| format!("`{count}` isn't a task count"))?;

    if COUNT_RANGE.contains(&count) {
        Ok(JobSpec { kind, count })
    } else {
        Err(format!(
            "task count not in range {}-{}",
            COUNT_RANGE.start(),
            COUNT_RANGE.end()
        ))
    }
}

/// One file per job, named after its kind. Repeated kinds get a numeric suffix.
pub fn output_paths(jobs: &[JobSpec], output_dir: &Path, format: OutputFormat) -> Vec<PathBuf> {
    let mut seen: HashMap<TaskKind, usize> = HashMap::new();
    jobs.iter()
        .map(|job| {
            let n = seen.entry(job.kind).or_insert(0);
            *n += 1;
            let stem = match *n {
                1 => job.kind.name().to_string(),
                n => format!("{}-{}", job.kind.name(), n),
            };
            output_dir.join(format!("{}.{}", stem, format.extension()))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: JobSpec,
    pub path: PathBuf,
    pub completed: usize,
    pub failed: usize,
}

/// Submit and await every task of `job` one by one, writing each outcome to `path`.
pub fn run_producer(
    client: &Client,
    job: &JobSpec,
    path: &Path,
    format: OutputFormat,
    seed: u64,
) -> Result<JobReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sink = RecordSink::create(path, format)?;
    let mut report = JobReport {
        job: job.clone(),
        path: path.to_owned(),
        completed: 0,
        failed: 0,
    };

    for _ in 0..job.count {
        let task = job.random_task(&mut rng);
        let id = client.submit(task)?;
        let outcome = client.await_result(id);
        match &outcome {
            Ok(_) => report.completed += 1,
            Err(_) => report.failed += 1,
        }
        sink.write(&Record {
            id,
            task,
            outcome: &outcome,
        })?;
    }
    sink.flush()?;

    tracing::debug!(
        "Producer for {} finished: {} completed, {} failed",
        job.kind,
        report.completed,
        report.failed
    );
    Ok(report)
}

/// Tasks that ended in an error across all jobs.
pub fn failed_tasks(reports: &[JobReport]) -> usize {
    reports.iter().map(|report| report.failed).sum()
}

/// Run every job on its own producer thread and wait for all of them.
pub fn run_jobs(
    client: &Client,
    jobs: &[JobSpec],
    output_dir: &Path,
    format: OutputFormat,
    seed: u64,
) -> Result<Vec<JobReport>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let paths = output_paths(jobs, output_dir, format);

    crossbeam::scope(|s| {
        let handles = jobs
            .iter()
            .zip(paths)
            .enumerate()
            .map(|(index, (job, path))| {
                let client = client.clone();
                let seed = seed.wrapping_add(index as u64);
                s.builder()
                    .name(format!("producer-{}-{}", job.kind, index))
                    .spawn(move |_| run_producer(&client, job, &path, format, seed))
                    .context("Failed to spawn producer thread")
            })
            .collect::<Result<Vec<_>>>()?;

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow!("Producer thread panicked"))?
            })
            .collect::<Result<Vec<_>>>()
    })
    .map_err(|_| anyhow!("Producer thread panicked"))?
}
