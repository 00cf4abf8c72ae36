use crate::{
    assembler::{AssembledVolume, AssemblyError, VolumeAssembler, prepare_scratch_dir},
    config::{ImporterOptions, Settings, StaticSettings},
    frame_detector::{FrameAnalyzer, FrameDetector, TagFrameAnalyzer},
    header::{DicomFileHeaders, HeaderSource},
    multivolume::{FrameAttributes, MultiVolume, MultiVolumeDisplayNode},
    scene::Scene,
    series::SeriesGrouper,
    volume_loader::{DicomScalarReader, ScalarVolumeReader},
};

use log::{debug, error, info};
use std::path::PathBuf;

/// A proposed interpretation of a file list, offered to the user before
/// anything is loaded.
#[derive(Clone, Debug, Default)]
pub struct Candidate {
    pub files: Vec<PathBuf>,
    pub name: String,
    pub tooltip: String,
    pub selected: bool,
    pub multivolume: Option<MultiVolume>,
}

/// Import plugin contract of the host's DICOM browser.
pub trait DicomPlugin {
    fn load_type(&self) -> &str;

    /// Ways of interpreting each of `file_lists`.
    fn examine(&self, file_lists: &[Vec<PathBuf>]) -> Vec<Candidate>;

    /// Materialize `candidate` in `scene`. Returns `false` and leaves the
    /// scene untouched on failure.
    fn load(&self, candidate: &mut Candidate, scene: &mut dyn Scene) -> bool;
}

pub fn candidate_name(description: &str, n_frames: usize, tag_name: &str) -> String {
    format!("{description} - as a {n_frames} frames MultiVolume by {tag_name}")
}

/// Finds multi-frame series and loads them as multivolumes.
pub struct MultiVolumeImporter<H, A, R, S> {
    headers: H,
    analyzer: A,
    reader: R,
    settings: S,
    options: ImporterOptions,
}

pub type DicomMultiVolumeImporter<S = StaticSettings> =
    MultiVolumeImporter<DicomFileHeaders, TagFrameAnalyzer<DicomFileHeaders>, DicomScalarReader, S>;

impl<S: Settings> DicomMultiVolumeImporter<S> {
    /// Importer reading headers and pixel data straight from DICOM files.
    pub fn dicom(settings: S, options: ImporterOptions) -> Self {
        let reader = DicomScalarReader::new(options.sort_by);
        Self::new(
            DicomFileHeaders,
            TagFrameAnalyzer::new(DicomFileHeaders),
            reader,
            settings,
            options,
        )
    }
}

impl<H, A, R, S> MultiVolumeImporter<H, A, R, S>
where
    H: HeaderSource,
    A: FrameAnalyzer,
    R: ScalarVolumeReader,
    S: Settings,
{
    pub fn new(headers: H, analyzer: A, reader: R, settings: S, options: ImporterOptions) -> Self {
        Self {
            headers,
            analyzer,
            reader,
            settings,
            options,
        }
    }

    pub fn options(&self) -> &ImporterOptions {
        &self.options
    }

    /// Candidates for one file list: one per series that splits into at
    /// least two frames.
    pub fn examine_files(&self, files: &[PathBuf]) -> Vec<Candidate> {
        info!("Examining {} files for multivolumes", files.len());
        let subseries = SeriesGrouper::new(&self.headers).group(files);
        let detector = FrameDetector::new(&self.analyzer);

        let mut candidates = Vec::new();
        // reused across series until a candidate takes it
        let mut placeholder: Option<MultiVolume> = None;
        for series in subseries.values() {
            let multivolume = placeholder.get_or_insert_with(MultiVolume::placeholder);
            let Some(group) = detector.detect(series) else {
                continue;
            };
            multivolume.attributes = FrameAttributes::from(&group);

            let name = candidate_name(&series.description, group.n_frames(), &group.tag_name);
            debug!("Candidate: {name}");
            candidates.push(Candidate {
                files: files.to_vec(),
                tooltip: name.clone(),
                name,
                selected: true,
                multivolume: placeholder.take(),
            });
        }
        candidates
    }

    /// Prepare the scratch directory and read every frame of `multivolume`.
    pub fn assemble(&self, multivolume: &MultiVolume) -> Result<AssembledVolume, AssemblyError> {
        let base = self.settings.temporary_directory();
        let scratch_dir = prepare_scratch_dir(&base, &self.options.scratch_dir_name).map_err(
            |source| AssemblyError::Scratch {
                path: base.join(&self.options.scratch_dir_name),
                source,
            },
        )?;

        VolumeAssembler::new(&self.reader)
            .with_frame_remainder(self.options.frame_remainder)
            .with_geometry_tolerance(self.options.geometry_tolerance)
            .assemble(&multivolume.attributes, &scratch_dir)
    }

    fn hand_off(mut multivolume: MultiVolume, assembled: AssembledVolume, scene: &mut dyn Scene) {
        let n_frames = assembled.data.dim().3;

        let mut display = MultiVolumeDisplayNode::default();
        display.set_default_color_map();
        multivolume.display_node = Some(scene.add_display_node(display));

        multivolume.data = Some(assembled.data);
        multivolume.geometry = assembled.geometry;
        multivolume.frame_values = assembled.frame_values;
        multivolume.frame_directions = assembled.frame_directions;
        multivolume.set_number_of_frames(n_frames);

        let name = multivolume.name.clone();
        let id = scene.add_multi_volume_node(multivolume);
        info!("{name} with {n_frames} frames added to the scene as {id:?}");
    }
}

impl<H, A, R, S> DicomPlugin for MultiVolumeImporter<H, A, R, S>
where
    H: HeaderSource,
    A: FrameAnalyzer,
    R: ScalarVolumeReader,
    S: Settings,
{
    fn load_type(&self) -> &str {
        "MultiVolume"
    }

    fn examine(&self, file_lists: &[Vec<PathBuf>]) -> Vec<Candidate> {
        file_lists
            .iter()
            .flat_map(|files| self.examine_files(files))
            .collect()
    }

    fn load(&self, candidate: &mut Candidate, scene: &mut dyn Scene) -> bool {
        let Some(multivolume) = candidate.multivolume.as_ref() else {
            return false;
        };

        info!("Loading {}", candidate.name);
        let assembled = match self.assemble(multivolume) {
            Ok(assembled) => assembled,
            Err(err) => {
                error!("Failed to load {}: {err}", candidate.name);
                return false;
            }
        };

        match candidate.multivolume.take() {
            Some(multivolume) => {
                Self::hand_off(multivolume, assembled, scene);
                true
            }
            None => false,
        }
    }
}
