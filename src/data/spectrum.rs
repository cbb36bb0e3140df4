use serde::{Deserialize, Serialize};

/// One measured point of an azimuthal scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Diffraction angle in degrees, derived from `abscissa` and the detector distance
    pub two_theta: f64,
    /// Original first column of the ESG file, written back unchanged
    pub abscissa: f64,
    pub intensity: f64,
}

impl DataPoint {
    pub fn new(two_theta: f64, abscissa: f64, intensity: f64) -> Self {
        Self {
            two_theta,
            abscissa,
            intensity,
        }
    }
}

/// One azimuthal scan (one `_pd_block_id` block of an ESG file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Header lines up to and including `_pd_meas_intensity_total`,
    /// one `\n` after each line, kept verbatim for output
    pub header: String,
    /// Value of `_pd_meas_angle_eta` as found in the header
    pub azimuth: String,
    pub points: Vec<DataPoint>,
}

impl Spectrum {
    /// The azimuth angle as a number, if the header text is numeric
    pub fn azimuth_degrees(&self) -> Option<f64> {
        self.azimuth.parse::<f64>().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Lowest intensity, ignoring NaN. None for an empty spectrum.
    pub fn min_intensity(&self) -> Option<f64> {
        min_max(self.points.iter().map(|p| p.intensity)).map(|(lo, _)| lo)
    }

    /// `(min, max)` of the intensities, for axis scaling
    pub fn intensity_range(&self) -> Option<(f64, f64)> {
        min_max(self.points.iter().map(|p| p.intensity))
    }

    /// `(min, max)` of 2θ
    pub fn two_theta_range(&self) -> Option<(f64, f64)> {
        min_max(self.points.iter().map(|p| p.two_theta))
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// A whole ESG file in memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Last `_pd_instr_dist_spec/detc` value found in the file
    pub detector_distance: f64,
    /// Spectra in file order; the index is the azimuth index used by edits and masks
    pub spectra: Vec<Spectrum>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn spectrum(&self, azimuth: usize) -> Option<&Spectrum> {
        self.spectra.get(azimuth)
    }

    pub fn total_points(&self) -> usize {
        self.spectra.iter().map(|s| s.points.len()).sum()
    }

    /// Copy of every spectrum's point array, in order
    pub fn point_arrays(&self) -> Vec<Vec<DataPoint>> {
        self.spectra.iter().map(|s| s.points.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(points: &[(f64, f64)]) -> Spectrum {
        Spectrum {
            header: String::new(),
            azimuth: "12.5".to_string(),
            points: points
                .iter()
                .map(|&(tt, i)| DataPoint::new(tt, tt * 10.0, i))
                .collect(),
        }
    }

    #[test]
    fn test_azimuth_degrees() {
        let mut s = spectrum(&[]);
        assert_eq!(s.azimuth_degrees(), Some(12.5));
        s.azimuth = "eta".to_string();
        assert_eq!(s.azimuth_degrees(), None);
    }

    #[test]
    fn test_ranges_skip_nan() {
        let s = spectrum(&[(1.0, 5.0), (2.0, f64::NAN), (3.0, -2.0)]);
        assert_eq!(s.min_intensity(), Some(-2.0));
        assert_eq!(s.intensity_range(), Some((-2.0, 5.0)));
        assert_eq!(s.two_theta_range(), Some((1.0, 3.0)));
        assert_eq!(spectrum(&[]).min_intensity(), None);
    }

    #[test]
    fn test_total_points() {
        let d = Dataset {
            detector_distance: 1000.0,
            spectra: vec![spectrum(&[(1.0, 1.0)]), spectrum(&[(1.0, 1.0), (2.0, 2.0)])],
        };
        assert_eq!(d.len(), 2);
        assert_eq!(d.total_points(), 3);
        assert_eq!(d.point_arrays()[1].len(), 2);
    }
}
