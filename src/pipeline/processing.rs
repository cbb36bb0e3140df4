/// ESG editing operations
///
/// Each operation works on a Dataset in place and records itself in the
/// edit log. Arguments are validated before anything is touched, so an
/// operation that returns an error has changed nothing.

use serde::{Deserialize, Serialize};

use super::background::BackgroundPoints;
use crate::data::mask::MaskRange;
use crate::data::spectrum::{Dataset, Spectrum};
use crate::error::{EsgError, Result};
use crate::log::edit_log::EditLog;

/// Edit operation descriptor (for undo and the edit log)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EditOp {
    RemovePoints {
        azimuth: usize,
        theta_min: f64,
        theta_max: f64,
        intensity_min: f64,
        intensity_max: f64,
    },
    RestrictRange { min: f64, max: f64 },
    ApplyMask { ranges: usize },
    SubtractBackground { azimuth: usize, control_points: usize },
    Shift { azimuth: usize, delta: f64 },
    ShiftAll { delta: f64 },
    SetMinimum { target: f64 },
}

impl std::fmt::Display for EditOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditOp::RemovePoints {
                azimuth,
                theta_min,
                theta_max,
                intensity_min,
                intensity_max,
            } => write!(
                f,
                "Remove points (azimuth {}, 2θ {:.3}–{:.3}, I {:.3}–{:.3})",
                azimuth, theta_min, theta_max, intensity_min, intensity_max
            ),
            EditOp::RestrictRange { min, max } => {
                write!(f, "Restrict 2θ to {:.3}–{:.3}", min, max)
            }
            EditOp::ApplyMask { ranges } => write!(f, "Apply mask ({} ranges)", ranges),
            EditOp::SubtractBackground {
                azimuth,
                control_points,
            } => write!(
                f,
                "Subtract background (azimuth {}, {} points)",
                azimuth, control_points
            ),
            EditOp::Shift { azimuth, delta } => {
                write!(f, "Shift azimuth {} by {:+}", azimuth, delta)
            }
            EditOp::ShiftAll { delta } => write!(f, "Shift all azimuths by {:+}", delta),
            EditOp::SetMinimum { target } => write!(f, "Set minimum intensity to {}", target),
        }
    }
}

fn spectrum_mut(dataset: &mut Dataset, azimuth: usize) -> Result<&mut Spectrum> {
    let count = dataset.spectra.len();
    dataset.spectra.get_mut(azimuth).ok_or_else(|| {
        EsgError::validation(format!(
            "azimuth index {} out of range ({} spectra)",
            azimuth, count
        ))
    })
}

// =========================================================================
//  Point removal
// =========================================================================

/// Remove the points of one spectrum lying strictly inside a 2θ × intensity box.
/// Returns the number of points removed.
pub fn remove_points_in_rect(
    dataset: &mut Dataset,
    azimuth: usize,
    theta: (f64, f64),
    intensity: (f64, f64),
    log: &mut EditLog,
) -> Result<usize> {
    let spectrum = spectrum_mut(dataset, azimuth)?;
    let (t_lo, t_hi) = theta;
    let (i_lo, i_hi) = intensity;

    let before = spectrum.points.len();
    spectrum.points.retain(|p| {
        !(p.two_theta > t_lo && p.two_theta < t_hi && p.intensity > i_lo && p.intensity < i_hi)
    });
    let removed = before - spectrum.points.len();

    let op = EditOp::RemovePoints {
        azimuth,
        theta_min: t_lo,
        theta_max: t_hi,
        intensity_min: i_lo,
        intensity_max: i_hi,
    };
    log.add_entry(&op, &format!("{} of {} points removed", removed, before));
    Ok(removed)
}

/// Keep only points with `min <= 2θ <= max`, in every spectrum
pub fn restrict_range(dataset: &mut Dataset, min: f64, max: f64, log: &mut EditLog) -> Result<usize> {
    if min.is_nan() || max.is_nan() || max < min {
        return Err(EsgError::validation(format!(
            "not a proper 2theta range: {} to {}",
            min, max
        )));
    }

    let mut removed = 0;
    for spectrum in &mut dataset.spectra {
        let before = spectrum.points.len();
        spectrum
            .points
            .retain(|p| !(p.two_theta > max || p.two_theta < min));
        removed += before - spectrum.points.len();
    }

    log.add_entry(
        &EditOp::RestrictRange { min, max },
        &format!("{} points outside the range removed", removed),
    );
    Ok(removed)
}

/// Check that every range names an existing spectrum
pub fn validate_mask(dataset: &Dataset, ranges: &[MaskRange]) -> Result<()> {
    match ranges.iter().find(|r| r.azimuth >= dataset.spectra.len()) {
        Some(bad) => Err(EsgError::validation(format!(
            "mask refers to azimuth {} but the dataset has {} spectra",
            bad.azimuth,
            dataset.spectra.len()
        ))),
        None => Ok(()),
    }
}

/// Remove points strictly inside each mask range, whatever their intensity
pub fn apply_mask(dataset: &mut Dataset, ranges: &[MaskRange], log: &mut EditLog) -> Result<usize> {
    validate_mask(dataset, ranges)?;

    let mut removed = 0;
    for range in ranges {
        let spectrum = &mut dataset.spectra[range.azimuth];
        let before = spectrum.points.len();
        spectrum.points.retain(|p| !range.covers(p.two_theta));
        removed += before - spectrum.points.len();
    }

    log.add_entry(
        &EditOp::ApplyMask {
            ranges: ranges.len(),
        },
        &format!("{} points removed", removed),
    );
    Ok(removed)
}

// =========================================================================
//  Background
// =========================================================================

/// Subtract the piecewise-linear background from the points of one spectrum
/// lying strictly between the outermost control points.
///
/// When the control points span no 2θ interval, or a point's baseline
/// cannot be evaluated, the intensity is kept and a warning is logged.
/// Returns the number of points corrected.
pub fn subtract_background(
    dataset: &mut Dataset,
    azimuth: usize,
    background: &BackgroundPoints,
    log: &mut EditLog,
) -> Result<usize> {
    let spectrum = spectrum_mut(dataset, azimuth)?;
    let (lo, hi) = background
        .domain()
        .ok_or_else(|| EsgError::validation("no background points selected"))?;
    let op = EditOp::SubtractBackground {
        azimuth,
        control_points: background.len(),
    };

    // fewer than two distinct 2θ leaves no point strictly inside the domain
    let baseline = match background.interpolant() {
        Ok(baseline) => baseline,
        Err(e) => {
            log::warn!("Background not subtracted on azimuth {}: {}", azimuth, e);
            log.add_entry(&op, &format!("Background not subtracted: {}", e));
            return Ok(0);
        }
    };

    let mut corrected = 0;
    let mut skipped = 0;
    for point in spectrum
        .points
        .iter_mut()
        .filter(|p| p.two_theta > lo && p.two_theta < hi)
    {
        match baseline.evaluate(point.two_theta) {
            Ok(value) => {
                point.intensity -= value;
                corrected += 1;
            }
            Err(e) => {
                log::warn!("Background not subtracted at 2θ={}: {}", point.two_theta, e);
                skipped += 1;
            }
        }
    }

    log.add_entry(
        &op,
        &format!(
            "Piecewise-linear background over 2θ {:.3}–{:.3}: {} points corrected, {} skipped",
            lo, hi, corrected, skipped
        ),
    );
    Ok(corrected)
}

// =========================================================================
//  Intensity shifts
// =========================================================================

/// Add `delta` to every intensity of one spectrum
pub fn shift(dataset: &mut Dataset, azimuth: usize, delta: f64, log: &mut EditLog) -> Result<usize> {
    let spectrum = spectrum_mut(dataset, azimuth)?;
    for point in &mut spectrum.points {
        point.intensity += delta;
    }
    let n = spectrum.points.len();
    log.add_entry(&EditOp::Shift { azimuth, delta }, &format!("{} points shifted", n));
    Ok(n)
}

/// Add `delta` to every intensity of every spectrum
pub fn shift_all(dataset: &mut Dataset, delta: f64, log: &mut EditLog) -> usize {
    let mut n = 0;
    for point in dataset.spectra.iter_mut().flat_map(|s| s.points.iter_mut()) {
        point.intensity += delta;
        n += 1;
    }
    log.add_entry(&EditOp::ShiftAll { delta }, &format!("{} points shifted", n));
    n
}

/// Shift each spectrum so its lowest intensity becomes `target`.
///
/// Returns the shift applied to each spectrum (None for spectra without points).
pub fn set_minimum(dataset: &mut Dataset, target: f64, log: &mut EditLog) -> Vec<Option<f64>> {
    let shifts: Vec<Option<f64>> = dataset
        .spectra
        .iter_mut()
        .map(|spectrum| {
            let delta = target - spectrum.min_intensity()?;
            for point in &mut spectrum.points {
                point.intensity += delta;
            }
            Some(delta)
        })
        .collect();

    let shifted = shifts.iter().filter(|s| s.is_some()).count();
    log.add_entry(
        &EditOp::SetMinimum { target },
        &format!("{} of {} spectra shifted", shifted, shifts.len()),
    );
    shifts
}
