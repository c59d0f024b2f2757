//! Reading inputs from and writing results to column files.
//!
//! Text columns hold one value per line; blank lines are skipped and only the
//! first token of a line (split on `,`, `;`, space or tab) is read. Paths
//! ending in `.npy` are read and written as 1-D `f64` npy arrays instead.

use crate::config::KMeansConfig;
use crate::error::KMeansError;
use crate::kmeans::KMeansResult;
use ndarray::{Array1, ArrayView1};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

fn is_npy(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("npy"))
}

fn open(path: &Path) -> Result<File, KMeansError> {
    File::open(path).map_err(|e| {
        KMeansError::InvalidInput(format!("cannot open {}: {}", path.display(), e))
    })
}

/// Read a column of values from a text or `.npy` file.
///
/// # Errors
///
/// Returns `InvalidInput` if the file is missing, holds no values, or has a
/// line whose first token is not a number.
pub fn read_column<P: AsRef<Path>>(path: P) -> Result<Array1<f64>, KMeansError> {
    let path = path.as_ref();
    let file = open(path)?;

    let values = if is_npy(path) {
        Array1::<f64>::read_npy(BufReader::new(file))
            .map_err(|e| KMeansError::Npy(format!("{}: {}", path.display(), e)))?
    } else {
        parse_column(BufReader::new(file), &path.display().to_string())?
    };

    if values.is_empty() {
        return Err(KMeansError::InvalidInput(format!(
            "{} holds no values",
            path.display()
        )));
    }
    Ok(values)
}

/// Parse a text column. `source` names the input in error messages.
pub fn parse_column<R: BufRead>(reader: R, source: &str) -> Result<Array1<f64>, KMeansError> {
    let mut values = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let Some(token) = line
            .split(|c| matches!(c, ',' | ';' | ' ' | '\t' | '\r'))
            .find(|t| !t.is_empty())
        else {
            continue;
        };

        let value: f64 = token.parse().map_err(|_| {
            KMeansError::InvalidInput(format!(
                "{} line {}: '{}' is not a number",
                source,
                line_no + 1,
                token
            ))
        })?;
        values.push(value);
    }

    Ok(Array1::from(values))
}

/// Write values one per line with six decimals, or as npy for `.npy` paths.
pub fn write_column<P: AsRef<Path>>(path: P, values: &ArrayView1<f64>) -> Result<(), KMeansError> {
    let path = path.as_ref();
    let file = File::create(path)?;

    if is_npy(path) {
        return values
            .write_npy(BufWriter::new(file))
            .map_err(|e| KMeansError::Npy(format!("{}: {}", path.display(), e)));
    }

    let mut writer = BufWriter::new(file);
    for v in values.iter() {
        writeln!(writer, "{:.6}", v)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write cluster indices one per line, in point order.
pub fn write_labels<P: AsRef<Path>>(path: P, labels: &[usize]) -> Result<(), KMeansError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for label in labels {
        writeln!(writer, "{}", label)?;
    }
    writer.flush()?;
    Ok(())
}

/// Human- and machine-readable summary of a finished run.
///
/// The `FINAL_DATA:` and `SSE_HISTORY:` lines are stable and meant for
/// scripts collecting benchmark results.
pub struct Report<'a> {
    pub result: &'a KMeansResult,
    pub n: usize,
    pub max_iters: usize,
    pub tol: f64,
}

impl<'a> Report<'a> {
    pub fn new(result: &'a KMeansResult, n: usize, config: &KMeansConfig) -> Self {
        Self {
            result,
            n,
            max_iters: config.max_iters,
            tol: config.tol,
        }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.result;
        let k = r.centroids.len();
        let ms_total = r.elapsed.as_secs_f64() * 1000.0;
        let ms_comm = r.comm_time.as_secs_f64() * 1000.0;

        writeln!(f, "K-means 1D (distributed)")?;
        writeln!(
            f,
            "N={} K={} max_iter={} eps={} Processes={}",
            self.n, k, self.max_iters, self.tol, r.n_workers
        )?;
        writeln!(
            f,
            "Iterations: {} | SSE final: {:.6} | Total time: {:.1} ms | Comm time: {:.1} ms",
            r.n_iterations, r.sse, ms_total, ms_comm
        )?;
        writeln!(
            f,
            "FINAL_DATA: Time={:.1} Time_Comm={:.1} SSE={:.6} Iters={} N={} K={} Procs={}",
            ms_total, ms_comm, r.sse, r.n_iterations, self.n, k, r.n_workers
        )?;
        for (i, sse) in r.sse_history.iter().enumerate() {
            writeln!(f, "SSE_HISTORY: {} {:.6}", i, sse)?;
        }
        Ok(())
    }
}
