use crate::enums::{FrameRemainder, SortBy};

use std::path::PathBuf;

/// Host settings the importer depends on.
pub trait Settings {
    /// Base directory for temporary files.
    fn temporary_directory(&self) -> PathBuf;
}

/// Settings with a fixed temporary directory.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticSettings(pub PathBuf);

impl Default for StaticSettings {
    fn default() -> Self {
        Self(std::env::temp_dir())
    }
}

impl Settings for StaticSettings {
    fn temporary_directory(&self) -> PathBuf {
        self.0.clone()
    }
}

pub const DEFAULT_SCRATCH_DIR_NAME: &str = "MultiVolumeImportPlugin";

/// Options of the multivolume importer.
///
/// ```
/// # use dicom_multivolume::config::ImporterOptions;
/// # use dicom_multivolume::enums::FrameRemainder;
/// let options = ImporterOptions::new()
///     .with_frame_remainder(FrameRemainder::Truncate)
///     .with_geometry_tolerance(0.001);
/// assert_eq!(options.scratch_dir_name, "MultiVolumeImportPlugin");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ImporterOptions {
    /// Name of the scratch directory below the temporary directory.
    pub scratch_dir_name: String,
    pub frame_remainder: FrameRemainder,
    /// Largest per-element difference allowed between the transforms of the
    /// first frame and any later frame. `0.0` requires them to be identical.
    pub geometry_tolerance: f64,
    /// Slice order within each frame.
    pub sort_by: SortBy,
}

impl Default for ImporterOptions {
    fn default() -> Self {
        Self {
            scratch_dir_name: DEFAULT_SCRATCH_DIR_NAME.to_string(),
            frame_remainder: FrameRemainder::default(),
            geometry_tolerance: 0.01,
            sort_by: SortBy::default(),
        }
    }
}

impl ImporterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scratch_dir_name(mut self, name: impl Into<String>) -> Self {
        self.scratch_dir_name = name.into();
        self
    }

    pub fn with_frame_remainder(mut self, frame_remainder: FrameRemainder) -> Self {
        self.frame_remainder = frame_remainder;
        self
    }

    pub fn with_geometry_tolerance(mut self, tolerance: f64) -> Self {
        self.geometry_tolerance = tolerance;
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }
}
