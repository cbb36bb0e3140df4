/// `.msk` mask files: azimuth and 2θ ranges to delete, replayable on a new ESG file
///
/// ```text
/// # Version: 1.0
/// # Mask for esg_edit
/// # Each line: azimuth number, 2theta range to remove
/// # Looks a bit like a cif file, but not a true CIF
/// #
///
/// loop_
/// _esg_azimuth_number _esg_2theta_delete_min _esg_2theta_delete_max
/// 0 5.000000 6.000000
/// 3 12.100000 12.400000
///
/// ```

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EsgError, Result};

const TABLE_MARKER: &str = "_esg_azimuth_number";

/// A 2θ interval to delete at one azimuth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskRange {
    pub azimuth: usize,
    pub theta_min: f64,
    pub theta_max: f64,
}

impl MaskRange {
    pub fn new(azimuth: usize, theta_min: f64, theta_max: f64) -> Self {
        Self {
            azimuth,
            theta_min,
            theta_max,
        }
    }

    /// Strictly inside the interval; boundary points are kept
    pub fn covers(&self, two_theta: f64) -> bool {
        two_theta > self.theta_min && two_theta < self.theta_max
    }
}

/// Mask record pushed alongside every undo record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaskEntry {
    /// Points removed by hand; the only kind of record that ends up in a mask file
    Removal(MaskRange),
    /// Edit that deletes nothing replayable (shift, background, 2θ restriction)
    Placeholder,
    /// A whole mask loaded from file and applied in one step
    Loaded(Vec<MaskRange>),
}

impl MaskEntry {
    pub fn is_active(&self) -> bool {
        !self.ranges().is_empty()
    }

    /// The ranges this record contributes to a saved mask
    pub fn ranges(&self) -> &[MaskRange] {
        match self {
            MaskEntry::Removal(range) => std::slice::from_ref(range),
            MaskEntry::Placeholder => &[],
            MaskEntry::Loaded(ranges) => ranges,
        }
    }
}

/// Read a mask file
pub fn load_mask(path: &Path) -> Result<Vec<MaskRange>> {
    let content = std::fs::read_to_string(path)?;
    let ranges = parse_mask(&content)?;
    log::info!("Loaded {} mask ranges from {}", ranges.len(), path.display());
    Ok(ranges)
}

/// Write the active ranges of `entries` to a mask file
pub fn save_mask(entries: &[MaskEntry], path: &Path) -> Result<()> {
    let text = serialize_mask(entries);
    std::fs::write(path, text)?;
    log::info!("Saved mask to {}", path.display());
    Ok(())
}

/// Parse every table introduced by an `_esg_azimuth_number` line.
///
/// A table ends at the first line with fewer than three tokens.
pub fn parse_mask(content: &str) -> Result<Vec<MaskRange>> {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    let mut ranges = Vec::new();
    let mut tables = 0;

    for (start, _) in lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(TABLE_MARKER))
    {
        tables += 1;
        for (offset, line) in lines[start + 1..].iter().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 {
                break;
            }
            let num = start + offset + 2;
            let azimuth = tokens[0].parse::<usize>().map_err(|e| {
                EsgError::parse(num, format!("azimuth `{}` is not an index ({})", tokens[0], e))
            })?;
            let theta_min = parse_theta(tokens[1], num)?;
            let theta_max = parse_theta(tokens[2], num)?;
            ranges.push(MaskRange::new(azimuth, theta_min, theta_max));
        }
    }

    if tables == 0 {
        log::warn!("No `{}` table found in mask", TABLE_MARKER);
    }
    Ok(ranges)
}

fn parse_theta(token: &str, line: usize) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|e| EsgError::parse(line, format!("2theta `{}` is not a number ({})", token, e)))
}

/// Render the active ranges of `entries`, sorted by azimuth then lower bound
pub fn serialize_mask(entries: &[MaskEntry]) -> String {
    let mut ranges: Vec<MaskRange> = entries
        .iter()
        .flat_map(|e| e.ranges().iter().copied())
        .collect();
    ranges.sort_by(|a, b| {
        a.azimuth
            .cmp(&b.azimuth)
            .then(a.theta_min.partial_cmp(&b.theta_min).unwrap_or(Ordering::Equal))
    });

    let mut out = String::new();
    out.push_str("# Version: 1.0\n");
    out.push_str(&format!("# Mask for {}\n", env!("CARGO_PKG_NAME")));
    out.push_str("# Each line: azimuth number, 2theta range to remove\n");
    out.push_str("# Looks a bit like a cif file, but not a true CIF\n");
    out.push_str("#\n");
    out.push_str("\nloop_\n");
    out.push_str("_esg_azimuth_number _esg_2theta_delete_min _esg_2theta_delete_max\n");
    for r in &ranges {
        out.push_str(&format!("{} {:.6} {:.6}\n", r.azimuth, r.theta_min, r.theta_max));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_only_active_sorted() {
        let entries = vec![
            MaskEntry::Removal(MaskRange::new(2, 10.0, 11.0)),
            MaskEntry::Placeholder,
            MaskEntry::Removal(MaskRange::new(0, 7.5, 8.0)),
            MaskEntry::Removal(MaskRange::new(0, 5.0, 6.0)),
        ];
        let text = serialize_mask(&entries);
        let body: Vec<&str> = text
            .lines()
            .skip_while(|l| !l.starts_with(TABLE_MARKER))
            .skip(1)
            .take_while(|l| !l.is_empty())
            .collect();
        assert_eq!(
            body,
            vec!["0 5.000000 6.000000", "0 7.500000 8.000000", "2 10.000000 11.000000"]
        );
        assert!(text.starts_with("# Version: 1.0\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_loaded_entry_contributes_all_ranges() {
        let entries = vec![MaskEntry::Loaded(vec![
            MaskRange::new(1, 3.0, 4.0),
            MaskRange::new(0, 1.0, 2.0),
        ])];
        assert!(entries[0].is_active());
        assert!(!MaskEntry::Placeholder.is_active());
        let parsed = parse_mask(&serialize_mask(&entries)).unwrap();
        assert_eq!(parsed, vec![MaskRange::new(0, 1.0, 2.0), MaskRange::new(1, 3.0, 4.0)]);
    }

    #[test]
    fn test_parse_stops_at_short_line() {
        let text = "loop_\n_esg_azimuth_number _esg_2theta_delete_min _esg_2theta_delete_max\n\
                    4 1.5 2.5\n  7 3 4  \n\n9 9.0 9.5\n";
        let ranges = parse_mask(text).unwrap();
        assert_eq!(ranges, vec![MaskRange::new(4, 1.5, 2.5), MaskRange::new(7, 3.0, 4.0)]);
    }

    #[test]
    fn test_parse_without_table_is_empty() {
        assert!(parse_mask("# nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_bad_azimuth() {
        let text = "_esg_azimuth_number a b\n1.5 2 3\n";
        assert!(matches!(parse_mask(text), Err(EsgError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_covers_is_strict() {
        let r = MaskRange::new(0, 5.0, 6.0);
        assert!(r.covers(5.5));
        assert!(!r.covers(5.0));
        assert!(!r.covers(6.0));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleanup.msk");
        let entries = vec![MaskEntry::Removal(MaskRange::new(3, 20.25, 20.75))];
        save_mask(&entries, &path).unwrap();
        assert_eq!(load_mask(&path).unwrap(), vec![MaskRange::new(3, 20.25, 20.75)]);
    }
}
