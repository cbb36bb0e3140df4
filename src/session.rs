/// Editing session: the single dataset being cleaned, its undo history,
/// the staged background points and the active azimuth.
///
/// Every method runs to completion and returns a [`Status`] the caller can
/// use to enable or disable its controls. An edit that fails leaves the
/// dataset, the history and the mask exactly as they were.

use std::path::Path;

use crate::config::SessionConfig;
use crate::data::esg;
use crate::data::mask::{self, MaskEntry, MaskRange};
use crate::data::spectrum::Dataset;
use crate::error::{EsgError, Result};
use crate::log::edit_log::EditLog;
use crate::pipeline::background::{self, BackgroundPoints};
use crate::pipeline::history::{History, Snapshot};
use crate::pipeline::input::check_finite;
use crate::pipeline::processing::{self, EditOp};

/// What the caller should reflect after an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub undo_available: bool,
    /// Enough control points staged to draw a background line
    pub background_ready: bool,
    /// Edits were applied since the last open or save
    pub needs_save: bool,
    pub active_azimuth: usize,
}

#[derive(Debug)]
pub struct EditSession {
    config: SessionConfig,
    dataset: Option<Dataset>,
    history: History,
    background: BackgroundPoints,
    active: usize,
    needs_save: bool,
    edit_log: EditLog,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl EditSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            dataset: None,
            history: History::new(),
            background: BackgroundPoints::new(),
            active: 0,
            needs_save: false,
            edit_log: EditLog::new(),
        }
    }

    pub fn status(&self) -> Status {
        Status {
            undo_available: !self.history.is_empty(),
            background_ready: self.background.len() > 1,
            needs_save: self.needs_save,
            active_azimuth: self.active,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn active_azimuth(&self) -> usize {
        self.active
    }

    pub fn background(&self) -> &BackgroundPoints {
        &self.background
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn edit_log(&self) -> &EditLog {
        &self.edit_log
    }

    /// Mask records of the current history, oldest first
    pub fn mask_entries(&self) -> Vec<MaskEntry> {
        self.history.mask_entries()
    }

    /// Ranges that a saved mask would contain
    pub fn mask_ranges(&self) -> Vec<MaskRange> {
        self.history
            .records()
            .iter()
            .flat_map(|r| r.mask.ranges().iter().copied())
            .collect()
    }

    // =====================================================================
    //  Files
    // =====================================================================

    /// Open an ESG file. On failure the current dataset is kept.
    pub fn open_file(&mut self, path: &Path) -> Result<Status> {
        let dataset = esg::open_file(path)?;
        Ok(self.load(dataset, &path.to_string_lossy()))
    }

    /// Replace the dataset, dropping history, mask and background points
    pub fn load(&mut self, dataset: Dataset, source: &str) -> Status {
        self.dataset = Some(dataset);
        self.history.clear();
        self.background.clear();
        self.active = 0;
        self.needs_save = false;
        self.edit_log = EditLog::new();
        self.edit_log.set_source(source);
        self.status()
    }

    /// Write the dataset. History is kept.
    pub fn save_file(&mut self, path: &Path) -> Result<Status> {
        let dataset = self.dataset.as_ref().ok_or(EsgError::NoDataset)?;
        esg::save_file(dataset, path)?;
        self.needs_save = false;
        Ok(self.status())
    }

    pub fn save_mask(&self, path: &Path) -> Result<()> {
        mask::save_mask(&self.history.mask_entries(), path)
    }

    pub fn load_and_apply_mask(&mut self, path: &Path) -> Result<Status> {
        let ranges = mask::load_mask(path)?;
        self.apply_mask(ranges)
    }

    // =====================================================================
    //  Edits
    // =====================================================================

    /// Delete points of one spectrum strictly inside a 2θ × intensity box.
    /// Only the 2θ bounds go into the mask.
    pub fn remove_points_in_rect(
        &mut self,
        azimuth: usize,
        theta_min: f64,
        theta_max: f64,
        intensity_min: f64,
        intensity_max: f64,
    ) -> Result<Status> {
        let dataset = self.dataset.as_mut().ok_or(EsgError::NoDataset)?;
        check_finite("Minimum 2theta", theta_min)?;
        check_finite("Maximum 2theta", theta_max)?;
        check_finite("Minimum intensity", intensity_min)?;
        check_finite("Maximum intensity", intensity_max)?;
        let snapshot = Snapshot::single(dataset, azimuth)?;
        processing::remove_points_in_rect(
            dataset,
            azimuth,
            (theta_min, theta_max),
            (intensity_min, intensity_max),
            &mut self.edit_log,
        )?;
        let op = EditOp::RemovePoints {
            azimuth,
            theta_min,
            theta_max,
            intensity_min,
            intensity_max,
        };
        let removal = MaskEntry::Removal(MaskRange::new(azimuth, theta_min, theta_max));
        self.history.push(op, snapshot, removal);
        Ok(self.committed())
    }

    /// Keep `min <= 2θ <= max` in every spectrum
    pub fn restrict_range(&mut self, min: f64, max: f64) -> Result<Status> {
        let dataset = self.dataset.as_mut().ok_or(EsgError::NoDataset)?;
        let snapshot = Snapshot::all(dataset);
        processing::restrict_range(dataset, min, max, &mut self.edit_log)?;
        self.history.push(
            EditOp::RestrictRange { min, max },
            snapshot,
            MaskEntry::Placeholder,
        );
        Ok(self.committed())
    }

    /// Apply a loaded mask as a single undoable step.
    ///
    /// Earlier history is discarded and the mask becomes exactly `ranges`.
    pub fn apply_mask(&mut self, ranges: Vec<MaskRange>) -> Result<Status> {
        let dataset = self.dataset.as_mut().ok_or(EsgError::NoDataset)?;
        processing::validate_mask(dataset, &ranges)?;

        self.history.clear();
        self.edit_log.clear_entries();
        let snapshot = Snapshot::all(dataset);
        processing::apply_mask(dataset, &ranges, &mut self.edit_log)?;
        self.history.push(
            EditOp::ApplyMask {
                ranges: ranges.len(),
            },
            snapshot,
            MaskEntry::Loaded(ranges),
        );
        Ok(self.committed())
    }

    /// Subtract the staged background from one spectrum, then drop the staged points
    pub fn subtract_background(&mut self, azimuth: usize) -> Result<Status> {
        let dataset = self.dataset.as_mut().ok_or(EsgError::NoDataset)?;
        if self.background.is_empty() {
            return Err(EsgError::validation("no background points selected"));
        }
        let snapshot = Snapshot::single(dataset, azimuth)?;
        processing::subtract_background(dataset, azimuth, &self.background, &mut self.edit_log)?;
        self.history.push(
            EditOp::SubtractBackground {
                azimuth,
                control_points: self.background.len(),
            },
            snapshot,
            MaskEntry::Placeholder,
        );
        Ok(self.committed())
    }

    /// Add `delta` to the intensities of one spectrum. A spectrum without
    /// points is left alone and nothing is recorded.
    pub fn shift_one(&mut self, azimuth: usize, delta: f64) -> Result<Status> {
        let delta = check_finite("Shift", delta)?;
        let dataset = self.dataset.as_mut().ok_or(EsgError::NoDataset)?;
        let snapshot = Snapshot::single(dataset, azimuth)?;
        if matches!(&snapshot, Snapshot::Single { points, .. } if points.is_empty()) {
            log::warn!("Azimuth {} has no data, nothing to shift", azimuth);
            return Ok(self.status());
        }
        processing::shift(dataset, azimuth, delta, &mut self.edit_log)?;
        self.history.push(
            EditOp::Shift { azimuth, delta },
            snapshot,
            MaskEntry::Placeholder,
        );
        Ok(self.committed())
    }

    pub fn shift_all(&mut self, delta: f64) -> Result<Status> {
        let delta = check_finite("Shift", delta)?;
        let dataset = self.dataset.as_mut().ok_or(EsgError::NoDataset)?;
        let snapshot = Snapshot::all(dataset);
        processing::shift_all(dataset, delta, &mut self.edit_log);
        self.history
            .push(EditOp::ShiftAll { delta }, snapshot, MaskEntry::Placeholder);
        Ok(self.committed())
    }

    /// Shift each spectrum so its own minimum intensity becomes `target`
    pub fn set_min_all(&mut self, target: f64) -> Result<Status> {
        let target = check_finite("Minimum intensity", target)?;
        let dataset = self.dataset.as_mut().ok_or(EsgError::NoDataset)?;
        let snapshot = Snapshot::all(dataset);
        processing::set_minimum(dataset, target, &mut self.edit_log);
        self.history
            .push(EditOp::SetMinimum { target }, snapshot, MaskEntry::Placeholder);
        Ok(self.committed())
    }

    /// Revert the most recent edit and drop its mask record.
    /// Undoing a single-azimuth edit makes that azimuth active.
    pub fn undo(&mut self) -> Status {
        let undone = match self.dataset.as_mut() {
            Some(dataset) => self.history.undo(dataset),
            None => None,
        };
        if let Some((op, azimuth)) = undone {
            self.edit_log.pop_entry();
            if let Some(azimuth) = azimuth {
                self.activate(azimuth);
            }
            log::info!("Undone: {}", op);
        }
        self.status()
    }

    fn committed(&mut self) -> Status {
        self.background.clear();
        self.needs_save = true;
        self.status()
    }

    // =====================================================================
    //  Background points
    // =====================================================================

    pub fn add_background_point(&mut self, two_theta: f64, intensity: f64) -> Result<Status> {
        if self.dataset.is_none() {
            return Err(EsgError::NoDataset);
        }
        self.background.add(two_theta, intensity)?;
        Ok(self.status())
    }

    pub fn clear_background_points(&mut self) -> Status {
        self.background.clear();
        self.status()
    }

    /// Seed background points for the active spectrum, if enabled in the
    /// config, none are staged yet, and the spectrum has enough points
    pub fn auto_background(&mut self) -> Status {
        if !self.config.auto_background || !self.background.is_empty() {
            return self.status();
        }
        let windows = self.config.auto_background_windows;
        let anchors = match self.dataset.as_ref().and_then(|d| d.spectrum(self.active)) {
            Some(spectrum) if spectrum.points.len() > 10 * windows => {
                background::auto_background(&spectrum.points, windows)
            }
            _ => return self.status(),
        };
        for anchor in anchors {
            if let Err(e) = self.background.add(anchor.two_theta, anchor.intensity) {
                log::warn!("Auto-background point skipped: {}", e);
            }
        }
        log::debug!(
            "Auto-background staged {} points on azimuth {}",
            self.background.len(),
            self.active
        );
        self.status()
    }

    // =====================================================================
    //  Navigation
    // =====================================================================

    pub fn select_azimuth(&mut self, azimuth: usize) -> Result<Status> {
        let count = self.dataset.as_ref().ok_or(EsgError::NoDataset)?.len();
        if azimuth >= count {
            return Err(EsgError::validation(format!(
                "azimuth index {} out of range ({} spectra)",
                azimuth, count
            )));
        }
        self.activate(azimuth);
        Ok(self.status())
    }

    pub fn next_azimuth(&mut self) -> Status {
        let count = self.dataset.as_ref().map_or(0, Dataset::len);
        if self.active + 1 < count {
            self.activate(self.active + 1);
        }
        self.status()
    }

    pub fn previous_azimuth(&mut self) -> Status {
        if self.dataset.is_some() && self.active > 0 {
            self.activate(self.active - 1);
        }
        self.status()
    }

    fn activate(&mut self, azimuth: usize) {
        if azimuth != self.active {
            self.active = azimuth;
            self.background.clear();
        }
    }
}
