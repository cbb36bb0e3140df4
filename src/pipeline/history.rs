/// Undo history: one record per applied edit, holding the point arrays the
/// edit replaced and the mask record it produced.
///
/// Keeping both in the same record means the undo stack and the mask list
/// can never drift out of step.

use crate::data::mask::MaskEntry;
use crate::data::spectrum::{DataPoint, Dataset};
use crate::error::{EsgError, Result};

use super::processing::EditOp;

/// Point arrays captured before an edit
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// One spectrum was edited
    Single { azimuth: usize, points: Vec<DataPoint> },
    /// The edit touched every spectrum
    All(Vec<Vec<DataPoint>>),
}

impl Snapshot {
    pub fn single(dataset: &Dataset, azimuth: usize) -> Result<Self> {
        let spectrum = dataset.spectrum(azimuth).ok_or_else(|| {
            EsgError::validation(format!(
                "azimuth index {} out of range ({} spectra)",
                azimuth,
                dataset.len()
            ))
        })?;
        Ok(Snapshot::Single {
            azimuth,
            points: spectrum.points.clone(),
        })
    }

    pub fn all(dataset: &Dataset) -> Self {
        Snapshot::All(dataset.point_arrays())
    }

    /// Azimuth of a single-spectrum snapshot
    pub fn azimuth(&self) -> Option<usize> {
        match self {
            Snapshot::Single { azimuth, .. } => Some(*azimuth),
            Snapshot::All(_) => None,
        }
    }

    /// Put the captured points back
    pub fn restore(self, dataset: &mut Dataset) {
        match self {
            Snapshot::Single { azimuth, points } => {
                if let Some(spectrum) = dataset.spectra.get_mut(azimuth) {
                    spectrum.points = points;
                }
            }
            Snapshot::All(arrays) => {
                for (spectrum, points) in dataset.spectra.iter_mut().zip(arrays) {
                    spectrum.points = points;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoRecord {
    pub op: EditOp,
    pub snapshot: Snapshot,
    pub mask: MaskEntry,
}

/// Last-in-first-out undo stack. There is no redo.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<UndoRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: EditOp, snapshot: Snapshot, mask: MaskEntry) {
        self.records.push(UndoRecord { op, snapshot, mask });
    }

    /// Pop the newest record and restore its snapshot into `dataset`
    pub fn undo(&mut self, dataset: &mut Dataset) -> Option<(EditOp, Option<usize>)> {
        let record = self.records.pop()?;
        let azimuth = record.snapshot.azimuth();
        record.snapshot.restore(dataset);
        Some((record.op, azimuth))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[UndoRecord] {
        &self.records
    }

    /// Mask records, oldest first, one per undo record
    pub fn mask_entries(&self) -> Vec<MaskEntry> {
        self.records.iter().map(|r| r.mask.clone()).collect()
    }
}
