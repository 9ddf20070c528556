//! Calibration-record I/O (component L).
//!
//! A calibrated ensemble's state is expensive to recompute, so it is
//! persisted as a small whitespace-separated table: one line per chain,
//! `beta  step_1 ... step_n  param_1 ... param_n`. This is deliberately
//! narrower than a general parameter or data file parser (out of scope);
//! it only round-trips what `calibration::calibrate` produces across a
//! whole ensemble, not arbitrary input files.

use std::io::{BufRead, Write};

use rand::Rng;

use crate::chain::Chain;
use crate::error::{Result, SamplerError};

/// One chain's calibrated state: its temperature, step widths, and
/// starting (post-calibration) position.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationRecord {
    pub beta: f64,
    pub steps: Vec<f64>,
    pub start: Vec<f64>,
}

/// Snapshot one chain's calibration state.
pub fn to_record<R: Rng>(chain: &Chain<R>) -> CalibrationRecord {
    CalibrationRecord {
        beta: chain.beta(),
        steps: chain.params_step().iter().copied().collect(),
        start: chain.params().iter().copied().collect(),
    }
}

/// Apply a calibration record to a chain: its beta, step widths, and
/// position are overwritten from the record. Errors if the record's vector
/// lengths don't match the chain's parameter count.
pub fn apply_record<R: Rng>(chain: &mut Chain<R>, record: &CalibrationRecord) -> Result<()> {
    let n_par = chain.n_par();
    if record.steps.len() != n_par || record.start.len() != n_par {
        return Err(SamplerError::ConfigMismatch {
            detail: format!(
                "calibration record has {} steps / {} start values for a {}-parameter chain",
                record.steps.len(),
                record.start.len(),
                n_par
            ),
        });
    }
    for (i, &step) in record.steps.iter().enumerate() {
        if step <= 0.0 {
            return Err(SamplerError::InvalidStep { param: i, step });
        }
    }
    chain.set_beta(record.beta);
    for i in 0..n_par {
        chain.params_step_mut()[i] = record.steps[i];
        chain.params_mut()[i] = record.start[i];
    }
    chain.check()?;
    Ok(())
}

/// Apply one record per chain, in order. Errors if the counts differ.
pub fn apply_records<R: Rng>(chains: &mut [Chain<R>], records: &[CalibrationRecord]) -> Result<()> {
    if chains.len() != records.len() {
        return Err(SamplerError::ConfigMismatch {
            detail: format!("{} calibration records for {} chains", records.len(), chains.len()),
        });
    }
    for (chain, record) in chains.iter_mut().zip(records) {
        apply_record(chain, record)?;
    }
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, record: &CalibrationRecord) -> Result<()> {
    write!(writer, "{:e}", record.beta)?;
    for step in &record.steps {
        write!(writer, "\t{:e}", step)?;
    }
    for value in &record.start {
        write!(writer, "\t{:e}", value)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Write one calibration record per chain, in ensemble order.
pub fn write_calibration<R: Rng, W: Write>(chains: &[Chain<R>], writer: &mut W) -> Result<()> {
    for chain in chains {
        write_record(writer, &to_record(chain))?;
    }
    Ok(())
}

/// Parse records written by `write_calibration`. Blank lines are skipped;
/// any other malformed line is a hard error naming its 1-indexed line
/// number.
pub fn read_calibration<B: BufRead>(reader: B) -> Result<Vec<CalibrationRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 || (parts.len() - 1) % 2 != 0 {
            return Err(SamplerError::ParseRecord {
                line: idx + 1,
                detail: format!(
                    "expected beta followed by an equal number of step and start fields, found {} fields",
                    parts.len()
                ),
            });
        }
        let n_par = (parts.len() - 1) / 2;

        let parse_f64 = |s: &str, field: &str| -> Result<f64> {
            s.parse::<f64>().map_err(|e| SamplerError::ParseRecord {
                line: idx + 1,
                detail: format!("field '{}' ('{}'): {}", field, s, e),
            })
        };

        let beta = parse_f64(parts[0], "beta")?;
        let steps = (0..n_par).map(|i| parse_f64(parts[1 + i], "step")).collect::<Result<Vec<_>>>()?;
        let start = (0..n_par)
            .map(|i| parse_f64(parts[1 + n_par + i], "start"))
            .collect::<Result<Vec<_>>>()?;

        records.push(CalibrationRecord { beta, steps, start });
    }
    Ok(records)
}
