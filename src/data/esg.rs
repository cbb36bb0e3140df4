/// MAUD ESG spectrum reader and writer
///
/// An ESG file is a sequence of CIF-like blocks, one per azimuth:
///
/// ```text
/// _pd_block_id noname|#0
/// _pd_meas_angle_eta 5.0
/// _pd_instr_dist_spec/detc 1000.0
/// loop_
/// _pd_proc_2theta_corrected
/// _pd_meas_intensity_total
/// 100.00 50.00000000
/// 200.00 60.00000000
///
/// ```
///
/// Everything from the `_pd_block_id` line down to `_pd_meas_intensity_total`
/// is the header and is kept verbatim. The data block that follows is read
/// until the first line with fewer than two tokens.

use std::path::Path;

use super::spectrum::{DataPoint, Dataset, Spectrum};
use crate::error::{EsgError, Result};

const BLOCK_MARKER: &str = "_pd_block_id";
const HEADER_END: &str = "_pd_meas_intensity_total";
const DISTANCE_KEY: &str = "_pd_instr_dist_spec/detc";
const AZIMUTH_KEY: &str = "_pd_meas_angle_eta";

/// Read an ESG file from disk
pub fn open_file(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path)?;
    let dataset = parse_esg(&content)?;
    log::info!(
        "Loaded {}: {} spectra, {} points, detector distance {}",
        path.display(),
        dataset.len(),
        dataset.total_points(),
        dataset.detector_distance
    );
    Ok(dataset)
}

/// Write a dataset as an ESG file
pub fn save_file(dataset: &Dataset, path: &Path) -> Result<()> {
    std::fs::write(path, serialize_esg(dataset))?;
    log::info!("Saved {} spectra to {}", dataset.len(), path.display());
    Ok(())
}

/// Parse ESG content into a dataset
pub fn parse_esg(content: &str) -> Result<Dataset> {
    let loop_count = content.matches("loop_").count();
    log::debug!("ESG content holds {} loop_ markers", loop_count);

    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(BLOCK_MARKER))
        .map(|(num, _)| num)
        .collect();

    if starts.is_empty() {
        return Err(EsgError::Format(format!(
            "no `{}` line found",
            BLOCK_MARKER
        )));
    }

    // The distance is shared by the whole file: every header that sets it
    // overwrites the value used for the data blocks that follow.
    let mut detector_distance = 0.0;
    let mut spectra = Vec::with_capacity(starts.len());
    for start in starts {
        let spectrum = read_block(&lines, start, &mut detector_distance)?;
        log::debug!(
            "Spectrum {} (eta {}): {} points",
            spectra.len(),
            spectrum.azimuth,
            spectrum.points.len()
        );
        spectra.push(spectrum);
    }

    Ok(Dataset {
        detector_distance,
        spectra,
    })
}

/// Read one block starting at the `_pd_block_id` line `start` (0-based)
fn read_block(lines: &[&str], start: usize, detector_distance: &mut f64) -> Result<Spectrum> {
    let mut header = String::new();
    let mut azimuth: Option<String> = None;
    let mut num = start;

    loop {
        let txt = *lines.get(num).ok_or_else(|| {
            EsgError::parse(
                start + 1,
                format!("block has no `{}` line", HEADER_END),
            )
        })?;
        header.push_str(txt);
        header.push('\n');
        num += 1;

        if txt == HEADER_END {
            break;
        }
        let mut tokens = txt.split_whitespace();
        match tokens.next() {
            Some(DISTANCE_KEY) => {
                let value = tokens
                    .next()
                    .ok_or_else(|| EsgError::parse(num, "detector distance has no value"))?;
                *detector_distance = parse_float(value, num)?;
            }
            Some(AZIMUTH_KEY) => {
                let value = tokens
                    .next()
                    .ok_or_else(|| EsgError::parse(num, "azimuth has no value"))?;
                azimuth = Some(value.to_string());
            }
            _ => {}
        }
    }

    let azimuth = azimuth.ok_or_else(|| {
        EsgError::parse(start + 1, format!("block has no `{}` line", AZIMUTH_KEY))
    })?;

    let mut points = Vec::new();
    while let Some(txt) = lines.get(num) {
        num += 1;
        let tokens: Vec<&str> = txt.split_whitespace().collect();
        if tokens.len() < 2 {
            break;
        }
        let abscissa = parse_float(tokens[0], num)?;
        let intensity = parse_float(tokens[1], num)?;
        let two_theta = two_theta_degrees(abscissa, *detector_distance, num)?;
        points.push(DataPoint::new(two_theta, abscissa, intensity));
    }

    Ok(Spectrum {
        header,
        azimuth,
        points,
    })
}

/// 2θ in degrees for a detector coordinate at the given sample-detector distance
fn two_theta_degrees(abscissa: f64, distance: f64, line: usize) -> Result<f64> {
    if distance == 0.0 || !distance.is_finite() {
        return Err(EsgError::parse(
            line,
            format!(
                "detector distance is zero, missing or not finite (`{} {}`)",
                DISTANCE_KEY, distance
            ),
        ));
    }
    Ok((abscissa / distance).atan().to_degrees())
}

fn parse_float(token: &str, line: usize) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|e| EsgError::parse(line, format!("`{}` is not a number ({})", token, e)))
}

/// Serialize a dataset back to ESG text.
///
/// Points with a NaN intensity are dropped.
pub fn serialize_esg(dataset: &Dataset) -> String {
    let mut out = String::new();
    for spectrum in &dataset.spectra {
        out.push_str(&spectrum.header);
        for point in spectrum.points.iter().filter(|p| !p.intensity.is_nan()) {
            out.push_str(&format!("{:.2} {:.8}\n", point.abscissa, point.intensity));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_SPECTRUM: &str = "\
_pd_block_id noname|#0
_pd_meas_angle_eta 5
_pd_instr_dist_spec/detc 1000
loop_
_pd_meas_intensity_total
100.0 50.0
200.0 60.0

";

    const TWO_SPECTRA: &str = "\
_pd_block_id noname|#0
_pd_meas_angle_eta 0.0
_pd_instr_dist_spec/detc 500
loop_
_pd_meas_intensity_total
100.0 3.0
  200.0 4.0

_pd_block_id noname|#1
_pd_meas_angle_eta 5.0
_pd_instr_dist_spec/detc 1000
loop_
_pd_meas_intensity_total
100.0 7.0
";

    #[test]
    fn test_parse_single_spectrum() {
        let d = parse_esg(ONE_SPECTRUM).unwrap();
        assert_eq!(d.len(), 1);
        assert!((d.detector_distance - 1000.0).abs() < 1e-12);
        let s = &d.spectra[0];
        assert_eq!(s.azimuth, "5");
        assert_eq!(s.points.len(), 2);
        assert!((s.points[0].two_theta - 5.7106).abs() < 1e-3);
        assert!((s.points[1].two_theta - 11.3099).abs() < 1e-3);
        assert_eq!(s.points[0].abscissa, 100.0);
        assert_eq!(s.points[1].intensity, 60.0);
        assert!(s.header.starts_with("_pd_block_id noname|#0\n"));
        assert!(s.header.ends_with("_pd_meas_intensity_total\n"));
    }

    #[test]
    fn test_distance_applies_to_following_blocks_last_wins() {
        let d = parse_esg(TWO_SPECTRA).unwrap();
        assert_eq!(d.len(), 2);
        // Dataset keeps the last distance seen
        assert!((d.detector_distance - 1000.0).abs() < 1e-12);
        // First block was read with the distance known at that time
        let expected = (100.0f64 / 500.0).atan().to_degrees();
        assert!((d.spectra[0].points[0].two_theta - expected).abs() < 1e-12);
        // Whitespace around data lines is stripped
        assert_eq!(d.spectra[0].points[1].abscissa, 200.0);
        // End of input closes the last data block
        assert_eq!(d.spectra[1].points.len(), 1);
    }

    #[test]
    fn test_no_blocks_is_format_error() {
        let err = parse_esg("loop_\n1.0 2.0\n").unwrap_err();
        assert!(matches!(err, EsgError::Format(_)));
    }

    #[test]
    fn test_bad_number_names_line() {
        let text = ONE_SPECTRUM.replace("200.0 60.0", "200.0 sixty");
        match parse_esg(&text).unwrap_err() {
            EsgError::Parse { line, message } => {
                assert_eq!(line, 7);
                assert!(message.contains("sixty"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_zero_distance_is_parse_error() {
        let text = ONE_SPECTRUM.replace("detc 1000", "detc 0");
        assert!(matches!(parse_esg(&text), Err(EsgError::Parse { .. })));

        let missing = ONE_SPECTRUM.replace("_pd_instr_dist_spec/detc 1000\n", "");
        assert!(matches!(parse_esg(&missing), Err(EsgError::Parse { .. })));
    }

    #[test]
    fn test_non_finite_distance_is_parse_error() {
        for bad in ["nan", "inf", "-inf"] {
            let text = ONE_SPECTRUM.replace("detc 1000", &format!("detc {}", bad));
            assert!(
                matches!(parse_esg(&text), Err(EsgError::Parse { line: 6, .. })),
                "distance {} was accepted",
                bad
            );
        }
    }

    #[test]
    fn test_unterminated_header() {
        let err = parse_esg("_pd_block_id x\n_pd_meas_angle_eta 1\n").unwrap_err();
        assert!(matches!(err, EsgError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_serialize_format_and_nan_skipped() {
        let mut d = parse_esg(ONE_SPECTRUM).unwrap();
        d.spectra[0].points.push(DataPoint::new(12.0, 210.0, f64::NAN));
        let out = serialize_esg(&d);
        assert!(out.contains("\n_pd_meas_intensity_total\n100.00 50.00000000\n200.00 60.00000000\n\n"));
        assert!(!out.contains("210.00"));
    }

    #[test]
    fn test_round_trip() {
        let d = parse_esg(TWO_SPECTRA).unwrap();
        let again = parse_esg(&serialize_esg(&d)).unwrap();
        assert_eq!(again.len(), d.len());
        assert_eq!(again.detector_distance, d.detector_distance);
        for (a, b) in again.spectra.iter().zip(&d.spectra) {
            assert_eq!(a.header, b.header);
            assert_eq!(a.azimuth, b.azimuth);
            assert_eq!(a.points.len(), b.points.len());
            for (pa, pb) in a.points.iter().zip(&b.points) {
                assert!((pa.abscissa - pb.abscissa).abs() < 5e-3);
                assert!((pa.intensity - pb.intensity).abs() < 5e-8);
            }
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.esg");
        let d = parse_esg(ONE_SPECTRUM).unwrap();
        save_file(&d, &path).unwrap();
        let loaded = open_file(&path).unwrap();
        assert_eq!(loaded.spectra[0].points, d.spectra[0].points);
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_file(&dir.path().join("nope.esg")).unwrap_err();
        assert!(matches!(err, EsgError::Io(_)));
    }
}
