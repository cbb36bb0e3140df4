/// Background control points and piecewise-linear baseline
///
/// Control points are picked by hand (or seeded by [`auto_background`]) on the
/// active spectrum. They are kept sorted by 2θ; the baseline between them is
/// a straight line per segment and is undefined outside the outermost points.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::spectrum::DataPoint;
use crate::error::{EsgError, Result};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("2theta {x} is outside the background domain [{min}, {max}]")]
    OutOfDomain { x: f64, min: f64, max: f64 },
    #[error("background needs at least two distinct control points, got {0}")]
    Degenerate(usize),
}

/// A `(2θ, intensity)` anchor of the background line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub two_theta: f64,
    pub intensity: f64,
}

/// Staged control points, always ordered by ascending 2θ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundPoints {
    points: Vec<ControlPoint>,
}

impl BackgroundPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a point and re-sort. Equal 2θ keep their insertion order.
    pub fn add(&mut self, two_theta: f64, intensity: f64) -> Result<()> {
        if !two_theta.is_finite() || !intensity.is_finite() {
            return Err(EsgError::validation(format!(
                "background point ({}, {}) is not finite",
                two_theta, intensity
            )));
        }
        self.points.push(ControlPoint {
            two_theta,
            intensity,
        });
        self.points
            .sort_by(|a, b| a.two_theta.total_cmp(&b.two_theta));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// `(lowest, highest)` 2θ among the control points
    pub fn domain(&self) -> Option<(f64, f64)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.two_theta, last.two_theta)),
            _ => None,
        }
    }

    pub fn interpolant(&self) -> std::result::Result<LinearInterpolant, InterpolationError> {
        LinearInterpolant::new(&self.points)
    }
}

/// Piecewise-linear function through sorted control points
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterpolant {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolant {
    pub fn new(anchors: &[ControlPoint]) -> std::result::Result<Self, InterpolationError> {
        let mut anchors = anchors.to_vec();
        anchors.sort_by(|a, b| a.two_theta.total_cmp(&b.two_theta));

        let distinct = match (anchors.first(), anchors.last()) {
            (Some(first), Some(last)) => anchors.len() >= 2 && last.two_theta > first.two_theta,
            _ => false,
        };
        if !distinct {
            return Err(InterpolationError::Degenerate(anchors.len()));
        }

        Ok(Self {
            xs: anchors.iter().map(|a| a.two_theta).collect(),
            ys: anchors.iter().map(|a| a.intensity).collect(),
        })
    }

    pub fn evaluate(&self, x: f64) -> std::result::Result<f64, InterpolationError> {
        let min = self.xs[0];
        let max = self.xs[self.xs.len() - 1];
        if !(x >= min && x <= max) {
            return Err(InterpolationError::OutOfDomain { x, min, max });
        }

        for j in 0..self.xs.len() - 1 {
            let (x0, x1) = (self.xs[j], self.xs[j + 1]);
            // zero-width segments come from repeated 2θ; a wider neighbour covers x
            if x >= x0 && x <= x1 && x1 > x0 {
                let frac = (x - x0) / (x1 - x0);
                return Ok(self.ys[j] + frac * (self.ys[j + 1] - self.ys[j]));
            }
        }
        Err(InterpolationError::Degenerate(self.xs.len()))
    }
}

/// Seed background points from the data itself.
///
/// The 2θ span is cut into `windows` equal slices. In each slice the median
/// of the intensities above 2/3 of the overall median becomes a control
/// point at the slice centre, provided more than two points qualify.
pub fn auto_background(points: &[DataPoint], windows: usize) -> Vec<ControlPoint> {
    if points.is_empty() || windows == 0 {
        return Vec::new();
    }

    let lo = points.iter().map(|p| p.two_theta).fold(f64::INFINITY, f64::min);
    let hi = points
        .iter()
        .map(|p| p.two_theta)
        .fold(f64::NEG_INFINITY, f64::max);
    let width = (hi - lo) / windows as f64;

    let intensities: Vec<f64> = points.iter().map(|p| p.intensity).collect();
    let cutoff = match median(&intensities) {
        Some(m) => 2.0 * m / 3.0,
        None => return Vec::new(),
    };

    let mut anchors = Vec::new();
    for i in 0..windows {
        let x0 = lo + width * i as f64;
        let x1 = lo + width * (i + 1) as f64;
        let kept: Vec<f64> = points
            .iter()
            .filter(|p| p.two_theta > x0 && p.two_theta < x1 && p.intensity > cutoff)
            .map(|p| p.intensity)
            .collect();
        if kept.len() > 2 {
            if let Some(m) = median(&kept) {
                anchors.push(ControlPoint {
                    two_theta: (x0 + x1) / 2.0,
                    intensity: m,
                });
            }
        }
    }
    anchors
}

/// Median, averaging the two middle values for even counts. NaN is ignored.
fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_points_sorted() {
        let mut bg = BackgroundPoints::new();
        bg.add(9.0, 10.0).unwrap();
        bg.add(1.0, 12.0).unwrap();
        bg.add(5.0, 11.0).unwrap();
        let xs: Vec<f64> = bg.points().iter().map(|p| p.two_theta).collect();
        assert_eq!(xs, vec![1.0, 5.0, 9.0]);
        assert_eq!(bg.domain(), Some((1.0, 9.0)));
    }

    #[test]
    fn test_add_rejects_non_finite() {
        let mut bg = BackgroundPoints::new();
        assert!(bg.add(f64::NAN, 1.0).is_err());
        assert!(bg.add(1.0, f64::INFINITY).is_err());
        assert!(bg.is_empty());
    }

    #[test]
    fn test_interpolation() {
        let mut bg = BackgroundPoints::new();
        bg.add(1.0, 10.0).unwrap();
        bg.add(9.0, 10.0).unwrap();
        bg.add(5.0, 30.0).unwrap();
        let f = bg.interpolant().unwrap();
        assert!((f.evaluate(5.0).unwrap() - 30.0).abs() < 1e-12);
        assert!((f.evaluate(3.0).unwrap() - 20.0).abs() < 1e-12);
        assert!((f.evaluate(9.0).unwrap() - 10.0).abs() < 1e-12);
        assert!(matches!(
            f.evaluate(0.5),
            Err(InterpolationError::OutOfDomain { .. })
        ));
        assert!(f.evaluate(f64::NAN).is_err());
    }

    #[test]
    fn test_repeated_theta_uses_neighbouring_segment() {
        let anchors = [
            ControlPoint { two_theta: 1.0, intensity: 0.0 },
            ControlPoint { two_theta: 2.0, intensity: 10.0 },
            ControlPoint { two_theta: 2.0, intensity: 20.0 },
            ControlPoint { two_theta: 3.0, intensity: 20.0 },
        ];
        let f = LinearInterpolant::new(&anchors).unwrap();
        assert!((f.evaluate(1.5).unwrap() - 5.0).abs() < 1e-12);
        assert!((f.evaluate(2.5).unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate() {
        let one = [ControlPoint { two_theta: 1.0, intensity: 1.0 }];
        assert_eq!(
            LinearInterpolant::new(&one).unwrap_err(),
            InterpolationError::Degenerate(1)
        );
        let same = [one[0], one[0]];
        assert!(LinearInterpolant::new(&same).is_err());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_auto_background_flat_with_dip() {
        // 100 points on 0..=99 degrees at intensity 10, with a detector dip
        let mut points: Vec<DataPoint> = (0..100)
            .map(|i| DataPoint::new(i as f64, i as f64, 10.0))
            .collect();
        for p in points.iter_mut().skip(40).take(5) {
            p.intensity = 1.0;
        }
        let anchors = auto_background(&points, 5);
        assert_eq!(anchors.len(), 5);
        for a in &anchors {
            assert!((a.intensity - 10.0).abs() < 1e-12);
        }
        assert!((anchors[0].two_theta - 9.9).abs() < 1e-9);
    }

    #[test]
    fn test_auto_background_empty() {
        assert!(auto_background(&[], 5).is_empty());
    }
}
