//! Signal metrics over recorded pressure histories.
//!
//! All helpers accumulate in `f64`; histories are short enough that this is
//! cheap and it keeps long decay tails from vanishing into rounding.

/// Decay levels (dB) bounding the primary RT60 fit.
pub const DECAY_FIT_START_DB: f64 = -5.0;
pub const DECAY_FIT_END_DB: f64 = -25.0;
/// Lower fit bound used when the decay never reaches `DECAY_FIT_END_DB`.
pub const DECAY_FIT_FALLBACK_END_DB: f64 = -15.0;

/// Sum of squared samples.
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

/// Root mean square of the samples, 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (energy(samples) / samples.len() as f64).sqrt()
}

/// Peak absolute value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()))
}

/// Index of the first sample whose magnitude reaches `threshold` times the
/// peak magnitude. `None` for a silent signal.
pub fn onset_index(samples: &[f32], threshold: f32) -> Option<usize> {
    let peak = peak(samples);
    if peak <= f32::EPSILON {
        return None;
    }
    let level = threshold.clamp(0.0, 1.0) * peak;
    samples.iter().position(|&s| s.abs() >= level)
}

/// Number of samples between the first and last crossing of `threshold`
/// times the peak, inclusive. 0 for a silent signal.
pub fn active_span(samples: &[f32], threshold: f32) -> usize {
    let Some(first) = onset_index(samples, threshold) else {
        return 0;
    };
    let level = threshold.clamp(0.0, 1.0) * peak(samples);
    let last = samples
        .iter()
        .rposition(|&s| s.abs() >= level)
        .unwrap_or(first);
    last - first + 1
}

/// Energy of the first difference relative to signal energy.
///
/// A crude spectral tilt measure: it grows with high-frequency content and is
/// bounded by 4. Returns 0 for a silent signal.
pub fn high_frequency_ratio(samples: &[f32]) -> f64 {
    let total = energy(samples);
    if total <= f64::EPSILON {
        return 0.0;
    }
    let diff: f64 = samples
        .windows(2)
        .map(|w| {
            let d = w[1] as f64 - w[0] as f64;
            d * d
        })
        .sum();
    diff / total
}

/// Schroeder backward-integrated energy decay curve in dB relative to the
/// total energy. Empty for a silent signal.
///
/// Entries after the last non-zero sample are `-inf`.
pub fn schroeder_decay(samples: &[f32]) -> Vec<f64> {
    let mut remaining: Vec<f64> = Vec::with_capacity(samples.len());
    let mut acc = 0.0f64;
    for &s in samples.iter().rev() {
        acc += (s as f64) * (s as f64);
        remaining.push(acc);
    }
    remaining.reverse();

    let total = acc;
    if total <= f64::EPSILON {
        return Vec::new();
    }
    remaining
        .into_iter()
        .map(|e| {
            if e > 0.0 {
                10.0 * (e / total).log10()
            } else {
                f64::NEG_INFINITY
            }
        })
        .collect()
}

/// Reverberation time from a decay curve sampled every `time_step` seconds.
///
/// Fits a line to the curve between -5 dB and -25 dB (or -15 dB if the
/// curve is too short) and extrapolates it to -60 dB. `None` if the curve
/// never reaches the fit range or does not decay.
pub fn rt60_from_decay(decay_db: &[f64], time_step: f64) -> Option<f64> {
    let start = decay_db.iter().position(|&d| d <= DECAY_FIT_START_DB)?;
    let end = decay_db
        .iter()
        .position(|&d| d <= DECAY_FIT_END_DB)
        .or_else(|| {
            decay_db
                .iter()
                .position(|&d| d <= DECAY_FIT_FALLBACK_END_DB)
        })?;
    if end <= start {
        return None;
    }

    let points: Vec<(f64, f64)> = (start..=end)
        .filter(|&i| decay_db[i].is_finite())
        .map(|i| (i as f64 * time_step, decay_db[i]))
        .collect();
    let slope = linear_slope(&points)?;
    if slope >= 0.0 {
        return None;
    }
    Some(-60.0 / slope)
}

/// Least-squares slope of `y` over `x`.
fn linear_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), &(x, y)| {
        let dx = x - mean_x;
        (num + dx * (y - mean_y), den + dx * dx)
    });
    if den <= f64::EPSILON * f64::EPSILON {
        None
    } else {
        Some(num / den)
    }
}
