//! # DICOM-multivolume library
//!
//! This crate finds, among a set of DICOM files, the series whose images are
//! temporal or parametric frames of one volume (diffusion weighted or
//! dynamic contrast series, for instance). It assembles each of them into a
//! single multi-component volume.
//!
//! This library is part of the dicom-rs ecosystem. Importing happens in two
//! steps, mirroring the import plugin contract of DICOM browsers:
//!
//!  - `examine` groups files by Series Instance UID and, for every series
//!    that splits into at least two frames along a frame-identifying tag
//!    (trigger time, b-value, echo time, ...), proposes a [`Candidate`]
//!  - `load` reads each frame as a scalar volume, checks that all frames
//!    share the first frame's dimensions and geometry, and packs them into
//!    one buffer with a component per frame, then hands the result to the
//!    host [`Scene`]
//!
//! Slices are decoded in parallel using rayon. The host collaborators
//! (header access, frame analysis, scalar volume reading, settings and the
//! scene graph) are traits with DICOM-backed default implementations.
//!
//! # Examples
//!
//! ## Loading the multivolumes of a directory
//!
//! ```no_run
//! # use dicom_multivolume::{DicomMultiVolumeImporter, DicomPlugin, ImporterOptions, MemoryScene, StaticSettings};
//! # use std::path::PathBuf;
//! let files: Vec<PathBuf> = std::fs::read_dir("dicom")
//!     .expect("should have listed the directory")
//!     .filter_map(Result::ok)
//!     .map(|entry| entry.path())
//!     .collect();
//! let importer = DicomMultiVolumeImporter::dicom(StaticSettings::default(), ImporterOptions::new());
//! let mut scene = MemoryScene::new();
//! for mut candidate in importer.examine(&[files]) {
//!     println!("{}", candidate.name);
//!     importer.load(&mut candidate, &mut scene);
//! }
//! ```
//!
//! [`Candidate`]: importer::Candidate
//! [`Scene`]: scene::Scene

pub mod assembler;
pub mod config;
pub mod enums;
pub mod frame_detector;
pub mod geometry;
pub mod header;
pub mod importer;
pub mod multivolume;
pub mod registry;
pub mod scene;
pub mod series;
pub mod volume;
pub mod volume_loader;

pub use config::{ImporterOptions, Settings, StaticSettings};
pub use importer::{Candidate, DicomMultiVolumeImporter, DicomPlugin, MultiVolumeImporter};
pub use multivolume::MultiVolume;
pub use scene::{MemoryScene, Scene};
