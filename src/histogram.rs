//! Marginal histogramming, MCMC error estimation, and peak detection
//! (component I).
//!
//! All three operate on a single parameter's visited-value stream (one
//! column of what `chain::Chain::record_sample` writes out), not on the
//! whole ensemble, so they take plain `&[f64]` slices rather than a
//! `Chain`.

/// A density-normalized histogram of one parameter's marginal
/// distribution, plus the MCMC error on its mean.
#[derive(Clone, Debug)]
pub struct Histogram {
    /// `nbins + 1` bin edges, evenly spaced between the observed range.
    pub bin_edges: Vec<f64>,
    /// Probability density per bin (integrates to ~1 over the domain).
    pub density: Vec<f64>,
    /// Batch-means standard error of the sample mean.
    pub mcmc_error: f64,
    /// Set when `mcmc_error` exceeds 1% of the sample standard deviation,
    /// signaling the chain has not run long enough to trust this
    /// histogram.
    pub error_flagged: bool,
    /// Sample mean of the value stream this histogram was built from.
    pub mean: f64,
    /// Sample standard deviation of the value stream this histogram was
    /// built from.
    pub std: f64,
}

fn sample_mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Batch-means standard error of the mean, using `sqrt(n)`-sized batches
/// (rounded down, minimum batch size 1) unless `batch_size` overrides it.
pub fn calc_mcmc_error(values: &[f64], batch_size: Option<usize>) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let batch = batch_size.unwrap_or_else(|| (n as f64).sqrt() as usize).max(1);
    let n_batches = n / batch;
    if n_batches < 2 {
        return 0.0;
    }
    let batch_means: Vec<f64> = (0..n_batches)
        .map(|b| {
            let slice = &values[b * batch..(b + 1) * batch];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect();
    let grand_mean = batch_means.iter().sum::<f64>() / n_batches as f64;
    let var = batch_means.iter().map(|m| (m - grand_mean).powi(2)).sum::<f64>() / (n_batches as f64 - 1.0);
    (var / n_batches as f64).sqrt()
}

/// Build a density-normalized histogram over `nbins` bins spanning either
/// `(min, max)` if given, or the observed range of `values`.
pub fn marginal_histogram(values: &[f64], nbins: usize, min: Option<f64>, max: Option<f64>, batch_size: Option<usize>) -> Histogram {
    let lo = min.unwrap_or_else(|| values.iter().cloned().fold(f64::INFINITY, f64::min));
    let hi = max.unwrap_or_else(|| values.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
    let nbins = nbins.max(1);
    let width = if hi > lo { (hi - lo) / nbins as f64 } else { 1.0 };

    let mut counts = vec![0u64; nbins];
    for &v in values {
        if v < lo || v > hi || width <= 0.0 {
            continue;
        }
        let mut bin = ((v - lo) / width) as usize;
        if bin >= nbins {
            bin = nbins - 1;
        }
        counts[bin] += 1;
    }

    let n = values.len().max(1) as f64;
    let density: Vec<f64> = counts.iter().map(|&c| c as f64 / (n * width)).collect();
    let bin_edges: Vec<f64> = (0..=nbins).map(|i| lo + i as f64 * width).collect();

    let (mean, sigma) = sample_mean_and_std(values);
    let mcmc_error = calc_mcmc_error(values, batch_size);
    let error_flagged = sigma > 0.0 && mcmc_error > 0.01 * sigma;

    Histogram { bin_edges, density, mcmc_error, error_flagged, mean, std: sigma }
}

/// One mode of a (possibly multimodal) marginal distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct Peak {
    pub median: f64,
    pub lower_quartile: f64,
    pub upper_quartile: f64,
    /// Fraction of all samples falling in this peak.
    pub mass_fraction: f64,
}

fn quartiles_of_sorted_segment(sorted: &[f64]) -> (f64, f64, f64) {
    let n = sorted.len();
    let lo_idx = n / 4;
    let mid_idx = n / 2;
    let hi_idx = (3 * n) / 4;
    (sorted[lo_idx.min(n - 1)], sorted[mid_idx.min(n - 1)], sorted[hi_idx.min(n - 1)])
}

/// Split a parameter's value stream into distinct peaks: sort, then start a
/// new peak whenever the gap between consecutive sorted values exceeds 1%
/// of the overall range. Peaks are reported sorted by descending mass
/// fraction.
pub fn detect_peaks(values: &[f64]) -> Vec<Peak> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let range = sorted[sorted.len() - 1] - sorted[0];
    let gap_threshold = if range > 0.0 { range / 100.0 } else { f64::INFINITY };

    let mut segments: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for i in 1..sorted.len() {
        if sorted[i] - sorted[i - 1] > gap_threshold {
            segments.push((start, i));
            start = i;
        }
    }
    segments.push((start, sorted.len()));

    let total = sorted.len() as f64;
    let mut peaks: Vec<Peak> = segments
        .into_iter()
        .map(|(a, b)| {
            let segment = &sorted[a..b];
            let (lower_quartile, median, upper_quartile) = quartiles_of_sorted_segment(segment);
            Peak { median, lower_quartile, upper_quartile, mass_fraction: (b - a) as f64 / total }
        })
        .collect();

    peaks.sort_by(|a, b| b.mass_fraction.partial_cmp(&a.mass_fraction).unwrap());
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_density_integrates_to_one() {
        let values: Vec<f64> = (0..10_000).map(|i| (i as f64 / 10_000.0) * 2.0 - 1.0).collect();
        let hist = marginal_histogram(&values, 50, Some(-1.0), Some(1.0), None);
        let bin_width = hist.bin_edges[1] - hist.bin_edges[0];
        let total: f64 = hist.density.iter().map(|d| d * bin_width).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mcmc_error_is_zero_for_constant_stream() {
        let values = vec![3.0; 1000];
        assert_eq!(calc_mcmc_error(&values, None), 0.0);
    }

    #[test]
    fn mcmc_error_shrinks_with_more_samples_for_iid_noise() {
        use rand::SeedableRng;
        use rand_distr::{Distribution, StandardNormal};
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(5);
        let short: Vec<f64> = (0..400).map(|_| StandardNormal.sample(&mut rng)).collect();
        let long: Vec<f64> = (0..40_000).map(|_| StandardNormal.sample(&mut rng)).collect();
        let e_short = calc_mcmc_error(&short, None);
        let e_long = calc_mcmc_error(&long, None);
        assert!(e_long < e_short);
    }

    #[test]
    fn detect_peaks_finds_two_well_separated_clusters() {
        let mut values: Vec<f64> = (0..500).map(|i| -10.0 + (i as f64) * 0.01).collect();
        values.extend((0..500).map(|i| 10.0 + (i as f64) * 0.01));
        let peaks = detect_peaks(&values);
        assert_eq!(peaks.len(), 2);
        assert!((peaks[0].mass_fraction - 0.5).abs() < 1e-6);
        assert!((peaks[1].mass_fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn detect_peaks_single_cluster_has_one_peak() {
        let values: Vec<f64> = (0..1000).map(|i| i as f64 * 0.001).collect();
        let peaks = detect_peaks(&values);
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0].mass_fraction - 1.0).abs() < 1e-9);
    }
}
