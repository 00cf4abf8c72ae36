use crate::{
    enums::FrameRemainder,
    geometry::Geometry,
    multivolume::FrameAttributes,
    volume::ScalarFrame,
    volume_loader::{ScalarReaderError, ScalarVolumeReader},
};

use log::{debug, warn};
use ndarray::{Array1, Array2, Array4, Axis};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Failed to prepare scratch directory {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Multivolume has no frames")]
    NoFrames,

    #[error("{files} files do not divide into {frames} frames")]
    UnevenFrames { files: usize, frames: usize },

    #[error("No scalar volume found for frame {frame}")]
    NoScalarCandidate { frame: usize },

    #[error("Failed to read frame {frame}: {source}")]
    FrameRead {
        frame: usize,
        #[source]
        source: ScalarReaderError,
    },

    #[error("Frame {frame} contains no voxels")]
    EmptyFrame { frame: usize },

    #[error("Frame {frame} has dimensions {found:?}, expected {expected:?}")]
    InconsistentExtent {
        frame: usize,
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    #[error("Frame {frame} is not aligned with the first frame")]
    InconsistentGeometry { frame: usize },
}

/// Create `base/name`, or empty it if it exists.
///
/// Returns the path of the scratch directory.
pub fn prepare_scratch_dir(base: &Path, name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(base)?;
    let dir = base.join(name);
    if !dir.is_dir() {
        fs::create_dir(&dir)?;
        return Ok(dir);
    }

    debug!("Clearing scratch directory {}", dir.display());
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(dir)
}

/// Split a flat frame file list into `n_frames` consecutive slices of
/// `files.len() / n_frames` files each.
pub fn frame_slices(
    files: &[PathBuf],
    n_frames: usize,
    remainder: FrameRemainder,
) -> Result<Vec<&[PathBuf]>, AssemblyError> {
    if n_frames == 0 {
        return Err(AssemblyError::NoFrames);
    }
    let uneven = AssemblyError::UnevenFrames {
        files: files.len(),
        frames: n_frames,
    };
    let files_per_frame = files.len() / n_frames;
    if files_per_frame == 0 {
        return Err(uneven);
    }

    let dropped = files.len() % n_frames;
    if dropped != 0 {
        match remainder {
            FrameRemainder::Reject => return Err(uneven),
            FrameRemainder::Truncate => warn!(
                "{} files do not divide into {} frames, ignoring the last {}",
                files.len(),
                n_frames,
                dropped
            ),
        }
    }

    Ok(files
        .chunks_exact(files_per_frame)
        .take(n_frames)
        .collect())
}

/// Result of packing all frames into one buffer.
#[derive(Clone, Debug)]
pub struct AssembledVolume {
    /// (depth, height, width, frames)
    pub data: Array4<u16>,
    /// Geometry of the first frame.
    pub geometry: Geometry,
    pub frame_values: Array1<f64>,
    pub frame_directions: Array2<f64>,
}

impl AssembledVolume {
    fn allocate(first: &ScalarFrame, n_frames: usize) -> Self {
        let (depth, height, width) = first.dim();
        Self {
            data: Array4::zeros((depth, height, width, n_frames)),
            geometry: first.geometry,
            frame_values: Array1::zeros(n_frames),
            frame_directions: Array2::ones((n_frames, 3)),
        }
    }

    /// Dimensions of one frame (depth, height, width).
    pub fn dim(&self) -> (usize, usize, usize) {
        let (depth, height, width, _) = self.data.dim();
        (depth, height, width)
    }
}

/// Reads frames one at a time and packs them into a multi-component buffer.
pub struct VolumeAssembler<'a, R> {
    reader: &'a R,
    frame_remainder: FrameRemainder,
    geometry_tolerance: f64,
}

impl<'a, R: ScalarVolumeReader> VolumeAssembler<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            frame_remainder: FrameRemainder::default(),
            geometry_tolerance: 0.01,
        }
    }

    pub fn with_frame_remainder(mut self, frame_remainder: FrameRemainder) -> Self {
        self.frame_remainder = frame_remainder;
        self
    }

    pub fn with_geometry_tolerance(mut self, tolerance: f64) -> Self {
        self.geometry_tolerance = tolerance;
        self
    }

    fn read_frame(
        &self,
        index: usize,
        files: &[PathBuf],
        scratch_dir: &Path,
    ) -> Result<ScalarFrame, AssemblyError> {
        // the reader may reorder the files by slice position
        let candidate = self
            .reader
            .examine(&[files.to_vec()])
            .into_iter()
            .next()
            .ok_or(AssemblyError::NoScalarCandidate { frame: index })?;

        let frame = self
            .reader
            .read(&candidate.files, scratch_dir)
            .map_err(|source| AssemblyError::FrameRead {
                frame: index,
                source,
            })?;
        if frame.is_empty() {
            return Err(AssemblyError::EmptyFrame { frame: index });
        }
        Ok(frame)
    }

    fn check_consistency(
        &self,
        volume: &AssembledVolume,
        frame: &ScalarFrame,
        index: usize,
    ) -> Result<(), AssemblyError> {
        if frame.dim() != volume.dim() {
            return Err(AssemblyError::InconsistentExtent {
                frame: index,
                expected: volume.dim(),
                found: frame.dim(),
            });
        }
        if !volume
            .geometry
            .approx_eq(&frame.geometry, self.geometry_tolerance)
        {
            return Err(AssemblyError::InconsistentGeometry { frame: index });
        }
        Ok(())
    }

    /// Read every frame listed in `attributes` and pack them into one
    /// buffer. The first frame fixes dimensions and geometry.
    pub fn assemble(
        &self,
        attributes: &FrameAttributes,
        scratch_dir: &Path,
    ) -> Result<AssembledVolume, AssemblyError> {
        let n_frames = attributes.n_frames;
        let frames = frame_slices(
            &attributes.frame_file_list,
            n_frames,
            self.frame_remainder,
        )?;

        let mut assembled: Option<AssembledVolume> = None;
        for (index, files) in frames.into_iter().enumerate() {
            let frame = self.read_frame(index, files, scratch_dir)?;
            let volume =
                assembled.get_or_insert_with(|| AssembledVolume::allocate(&frame, n_frames));
            if index > 0 {
                self.check_consistency(volume, &frame, index)?;
            }
            volume
                .data
                .index_axis_mut(Axis(3), index)
                .assign(&frame.data);
            debug!("Frame {index} of {n_frames} packed ({} files)", files.len());
        }

        assembled.ok_or(AssemblyError::NoFrames)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::IDENTITY;
    use crate::volume_loader::ScalarCandidate;
    use ndarray::{Array3, Array2 as Slice};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Reader over in-memory slices. Examination sorts files by name.
    #[derive(Default)]
    pub(crate) struct FakeReader {
        pub(crate) slices: HashMap<PathBuf, (Slice<u16>, Geometry)>,
        pub(crate) read_files: RefCell<Vec<PathBuf>>,
    }

    impl FakeReader {
        pub(crate) fn add(&mut self, name: &str, value: u16, shape: (usize, usize)) {
            self.add_with_geometry(name, value, shape, Geometry::default());
        }

        pub(crate) fn add_with_geometry(
            &mut self,
            name: &str,
            value: u16,
            shape: (usize, usize),
            geometry: Geometry,
        ) {
            let slice = Slice::from_shape_fn(shape, |(y, x)| value + (y * shape.1 + x) as u16);
            self.slices.insert(PathBuf::from(name), (slice, geometry));
        }
    }

    impl ScalarVolumeReader for FakeReader {
        fn examine(&self, file_groups: &[Vec<PathBuf>]) -> Vec<ScalarCandidate> {
            file_groups
                .iter()
                .filter(|files| !files.is_empty())
                .filter(|files| files.iter().all(|f| self.slices.contains_key(f)))
                .map(|files| {
                    let mut files = files.clone();
                    files.sort();
                    ScalarCandidate { files }
                })
                .collect()
        }

        fn read(
            &self,
            files: &[PathBuf],
            _scratch_dir: &Path,
        ) -> Result<ScalarFrame, ScalarReaderError> {
            self.read_files.borrow_mut().extend_from_slice(files);
            let slices: Vec<_> = files
                .iter()
                .map(|f| self.slices.get(f).ok_or(ScalarReaderError::NoValidImages))
                .collect::<Result<_, _>>()?;
            let (height, width) = slices[0].0.dim();
            let mut data = Array3::zeros((slices.len(), height, width));
            for (i, (slice, _)) in slices.iter().enumerate() {
                if slice.dim() != (height, width) {
                    return Err(ScalarReaderError::InconsistentDimensions);
                }
                data.index_axis_mut(Axis(0), i).assign(slice);
            }
            Ok(ScalarFrame::new(data, slices[0].1))
        }
    }

    fn attributes(names: &[&str], n_frames: usize) -> FrameAttributes {
        FrameAttributes {
            n_frames,
            frame_tag_name: "TriggerTime".into(),
            frame_file_list: names.iter().map(PathBuf::from).collect(),
        }
    }

    fn paths(range: std::ops::Range<usize>) -> Vec<PathBuf> {
        range.map(|i| PathBuf::from(format!("f{i}"))).collect()
    }

    #[test]
    fn seven_files_in_three_frames() {
        let files = paths(0..7);
        assert!(matches!(
            frame_slices(&files, 3, FrameRemainder::Reject),
            Err(AssemblyError::UnevenFrames { files: 7, frames: 3 })
        ));

        let frames = frame_slices(&files, 3, FrameRemainder::Truncate).expect("truncated");
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|frame| frame.len() == 2));
        assert_eq!(frames[2], &files[4..6]);
        assert!(!frames.iter().any(|frame| frame.contains(&files[6])));
    }

    #[test]
    fn degenerate_frame_counts_fail() {
        let files = paths(0..2);
        assert!(matches!(
            frame_slices(&files, 0, FrameRemainder::Truncate),
            Err(AssemblyError::NoFrames)
        ));
        assert!(matches!(
            frame_slices(&files, 3, FrameRemainder::Truncate),
            Err(AssemblyError::UnevenFrames { .. })
        ));
    }

    #[test]
    fn frames_round_trip_through_components() {
        let mut reader = FakeReader::default();
        for (i, name) in ["a0", "a1", "b0", "b1", "c0", "c1"].iter().enumerate() {
            reader.add(name, (i as u16) * 100, (2, 3));
        }
        // files of a frame arrive unsorted, the reader sorts them
        let attrs = attributes(&["a1", "a0", "b0", "b1", "c1", "c0"], 3);

        let assembled = VolumeAssembler::new(&reader)
            .assemble(&attrs, Path::new("/unused"))
            .expect("assembled");

        assert_eq!(assembled.data.dim(), (2, 2, 3, 3));
        for (index, files) in [["a0", "a1"], ["b0", "b1"], ["c0", "c1"]].iter().enumerate() {
            let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
            let expected = reader.read(&files, Path::new("/unused")).expect("frame");
            assert_eq!(assembled.data.index_axis(Axis(3), index), expected.data);
        }
        assert_eq!(assembled.frame_values, Array1::<f64>::zeros(3));
        assert_eq!(assembled.frame_directions, Array2::<f64>::ones((3, 3)));
    }

    #[test]
    fn geometry_comes_from_the_first_frame() {
        let mut first = Geometry::default();
        first.ijk_to_ras[0][3] = 12.5;
        let mut second = first;
        second.ijk_to_ras[0][3] = 12.504;

        let mut reader = FakeReader::default();
        reader.add_with_geometry("a", 1, (2, 2), first);
        reader.add_with_geometry("b", 2, (2, 2), second);

        let assembled = VolumeAssembler::new(&reader)
            .assemble(&attributes(&["a", "b"], 2), Path::new("/unused"))
            .expect("within tolerance");
        assert_eq!(assembled.geometry, first);
        assert_eq!(assembled.geometry.ras_to_ijk, IDENTITY);

        let strict = VolumeAssembler::new(&reader).with_geometry_tolerance(1e-6);
        assert!(matches!(
            strict.assemble(&attributes(&["a", "b"], 2), Path::new("/unused")),
            Err(AssemblyError::InconsistentGeometry { frame: 1 })
        ));
    }

    #[test]
    fn zero_tolerance_requires_identical_transforms() {
        let mut reader = FakeReader::default();
        let mut shifted = Geometry::default();
        shifted.ijk_to_ras[2][3] = 1e-9;
        reader.add("a", 1, (2, 2));
        reader.add("b", 2, (2, 2));
        reader.add_with_geometry("c", 3, (2, 2), shifted);

        let exact = VolumeAssembler::new(&reader).with_geometry_tolerance(0.0);
        exact
            .assemble(&attributes(&["a", "b"], 2), Path::new("/unused"))
            .expect("identical transforms");
        assert!(matches!(
            exact.assemble(&attributes(&["a", "c"], 2), Path::new("/unused")),
            Err(AssemblyError::InconsistentGeometry { frame: 1 })
        ));
    }

    #[test]
    fn mismatched_extent_fails() {
        let mut reader = FakeReader::default();
        reader.add("a", 1, (2, 2));
        reader.add("b", 2, (2, 3));
        let result =
            VolumeAssembler::new(&reader).assemble(&attributes(&["a", "b"], 2), Path::new("/"));
        assert!(matches!(
            result,
            Err(AssemblyError::InconsistentExtent {
                frame: 1,
                expected: (1, 2, 2),
                found: (1, 2, 3),
            })
        ));
    }

    #[test]
    fn unknown_frame_files_abort_the_assembly() {
        let mut reader = FakeReader::default();
        reader.add("a", 1, (2, 2));
        let result =
            VolumeAssembler::new(&reader).assemble(&attributes(&["a", "zz"], 2), Path::new("/"));
        assert!(matches!(
            result,
            Err(AssemblyError::NoScalarCandidate { frame: 1 })
        ));
    }

    #[test]
    fn truncation_never_reads_the_dropped_file() {
        let mut reader = FakeReader::default();
        for i in 0..7 {
            reader.add(&format!("f{i}"), i, (1, 1));
        }
        let names: Vec<String> = (0..7).map(|i| format!("f{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let rejecting = VolumeAssembler::new(&reader);
        assert!(matches!(
            rejecting.assemble(&attributes(&names, 3), Path::new("/")),
            Err(AssemblyError::UnevenFrames { .. })
        ));
        assert!(reader.read_files.borrow().is_empty());

        let assembled = VolumeAssembler::new(&reader)
            .with_frame_remainder(FrameRemainder::Truncate)
            .assemble(&attributes(&names, 3), Path::new("/"))
            .expect("truncated");
        assert_eq!(assembled.dim(), (2, 1, 1));
        assert!(!reader.read_files.borrow().contains(&PathBuf::from("f6")));
    }

    #[test]
    fn scratch_dir_is_created_then_cleared() {
        let base = tempfile::tempdir().expect("tempdir");
        let root = base.path().join("tmp");

        let dir = prepare_scratch_dir(&root, "scratch").expect("created");
        assert_eq!(dir, root.join("scratch"));
        assert!(dir.is_dir());

        fs::write(dir.join("leftover.nrrd"), b"x").expect("write");
        fs::create_dir(dir.join("nested")).expect("mkdir");
        fs::write(dir.join("nested").join("inner"), b"y").expect("write");

        let again = prepare_scratch_dir(&root, "scratch").expect("cleared");
        assert_eq!(again, dir);
        assert_eq!(fs::read_dir(&dir).expect("list").count(), 0);
    }

    #[test]
    fn scratch_dir_failure_is_reported() {
        let base = tempfile::tempdir().expect("tempdir");
        let file = base.path().join("not-a-dir");
        fs::write(&file, b"x").expect("write");
        assert!(prepare_scratch_dir(&file, "scratch").is_err());
    }
}
