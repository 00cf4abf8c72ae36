use crate::geometry::{cross, dot};
use crate::header::{FileHeader, HeaderSource, UNKNOWN};
use crate::series::{FileRecord, Subseries};

use dicom::core::Tag;
use dicom_dictionary_std::tags;
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Tags that can tell the frames of a multi-frame acquisition apart, in the
/// order they are tried.
pub const FRAME_IDENTIFYING_TAGS: &[(&str, Tag)] = &[
    ("TriggerTime", tags::TRIGGER_TIME),
    ("SiemensDiffusionBValue", Tag(0x0019, 0x100C)),
    ("GEDiffusionBValue", Tag(0x0043, 0x1039)),
    ("PhilipsDiffusionBValue", Tag(0x2001, 0x1003)),
    ("EchoTime", tags::ECHO_TIME),
    ("RepetitionTime", tags::REPETITION_TIME),
    ("FlipAngle", tags::FLIP_ANGLE),
    ("InversionTime", tags::INVERSION_TIME),
    ("AcquisitionTime", tags::ACQUISITION_TIME),
];

/// One frame as reported by a [`FrameAnalyzer`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalyzedFrame {
    /// Value of the frame-identifying tag shared by the files.
    pub value: String,
    pub files: Vec<PathBuf>,
}

/// Best-guess partition of a file list into frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameAssignment {
    pub tag_name: String,
    pub frames: Vec<AnalyzedFrame>,
}

impl FrameAssignment {
    /// Everything in one frame, no distinguishing tag.
    pub fn single(files: &[PathBuf]) -> Self {
        Self {
            tag_name: String::new(),
            frames: vec![AnalyzedFrame {
                value: String::new(),
                files: files.to_vec(),
            }],
        }
    }
}

/// Splits the files of one series into frames.
pub trait FrameAnalyzer {
    fn analyze(&self, files: &[PathBuf]) -> FrameAssignment;
}

/// Largest distance, in millimetres, between matching slices of two frames.
const SLICE_POSITION_TOLERANCE: f64 = 0.01;

/// Splits files on the first of [`FRAME_IDENTIFYING_TAGS`] that every file
/// carries, that takes at least two values, and whose values each cover the
/// same number of files. When the files carry Image Position and Image
/// Orientation, every frame must also cover the same slice positions.
pub struct TagFrameAnalyzer<H> {
    headers: H,
    candidates: Vec<(String, Tag)>,
}

impl<H: HeaderSource> TagFrameAnalyzer<H> {
    pub fn new(headers: H) -> Self {
        Self {
            headers,
            candidates: FRAME_IDENTIFYING_TAGS
                .iter()
                .map(|(name, tag)| (name.to_string(), *tag))
                .collect(),
        }
    }

    /// Replace the list of tags to try.
    pub fn with_tags(mut self, candidates: Vec<(String, Tag)>) -> Self {
        self.candidates = candidates;
        self
    }

    fn split_by(headers: &[(&Path, FileHeader)], tag: Tag) -> Option<Vec<AnalyzedFrame>> {
        let mut frames: Vec<AnalyzedFrame> = Vec::new();
        let mut positions: Vec<Vec<Option<f64>>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (path, header) in headers {
            let value = header.value(tag);
            if value == UNKNOWN {
                return None;
            }
            let slot = *index.entry(value.clone()).or_insert_with(|| {
                frames.push(AnalyzedFrame {
                    value,
                    files: Vec::new(),
                });
                positions.push(Vec::new());
                frames.len() - 1
            });
            frames[slot].files.push(path.to_path_buf());
            positions[slot].push(slice_position(header));
        }

        let per_frame = frames.first()?.files.len();
        if frames.len() < 2 || frames.iter().any(|frame| frame.files.len() != per_frame) {
            return None;
        }
        if !same_slice_positions(positions) {
            debug!("Frames by {tag} sample different slice positions");
            return None;
        }
        Self::sort_frames(&mut frames);
        Some(frames)
    }

    /// Numeric order when every value is a number (first component of a
    /// multi-valued element), lexicographic otherwise.
    fn sort_frames(frames: &mut [AnalyzedFrame]) {
        let numeric: Option<Vec<f64>> = frames
            .iter()
            .map(|frame| numeric_value(&frame.value))
            .collect();
        match numeric {
            Some(_) => frames.sort_by(|a, b| {
                numeric_value(&a.value)
                    .partial_cmp(&numeric_value(&b.value))
                    .unwrap_or(Ordering::Equal)
            }),
            None => frames.sort_by(|a, b| a.value.cmp(&b.value)),
        }
    }
}

fn numeric_value(value: &str) -> Option<f64> {
    value.split('\\').next()?.trim().parse().ok()
}

/// Image Position Patient projected on the slice normal.
fn slice_position(header: &FileHeader) -> Option<f64> {
    let orientation = header.numbers(tags::IMAGE_ORIENTATION_PATIENT)?;
    let position = header.numbers(tags::IMAGE_POSITION_PATIENT)?;
    let [rx, ry, rz, cx, cy, cz] = orientation[..] else {
        return None;
    };
    let [x, y, z] = position[..] else {
        return None;
    };
    Some(dot(cross([rx, ry, rz], [cx, cy, cz]), [x, y, z]))
}

/// Whether every frame covers the same set of slice positions. Frames
/// without complete position information are not compared.
fn same_slice_positions(frames: Vec<Vec<Option<f64>>>) -> bool {
    let Some(mut sorted) = frames
        .into_iter()
        .map(|positions| positions.into_iter().collect::<Option<Vec<f64>>>())
        .collect::<Option<Vec<_>>>()
    else {
        return true;
    };
    for positions in &mut sorted {
        positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    }
    let Some((first, rest)) = sorted.split_first() else {
        return true;
    };
    rest.iter().all(|positions| {
        positions
            .iter()
            .zip(first)
            .all(|(a, b)| (a - b).abs() <= SLICE_POSITION_TOLERANCE)
    })
}

impl<H: HeaderSource> FrameAnalyzer for TagFrameAnalyzer<H> {
    fn analyze(&self, files: &[PathBuf]) -> FrameAssignment {
        let mut headers = Vec::with_capacity(files.len());
        for file in files {
            match self.headers.load_file_header(file) {
                Ok(header) => headers.push((file.as_path(), header)),
                Err(err) => {
                    warn!("Frame analysis skipped: {err}");
                    return FrameAssignment::single(files);
                }
            }
        }

        self.candidates
            .iter()
            .find_map(|(name, tag)| {
                Self::split_by(&headers, *tag).map(|frames| FrameAssignment {
                    tag_name: name.clone(),
                    frames,
                })
            })
            .unwrap_or_else(|| FrameAssignment::single(files))
    }
}

/// The frames of one subseries, each an ordered subset of its files.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameGroup {
    pub tag_name: String,
    pub frames: Vec<Vec<FileRecord>>,
}

impl FrameGroup {
    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// All files, frame after frame.
    pub fn file_list(&self) -> Vec<PathBuf> {
        self.frames
            .iter()
            .flatten()
            .map(|record| record.path.clone())
            .collect()
    }
}

pub struct FrameDetector<'a, A> {
    analyzer: &'a A,
}

impl<'a, A: FrameAnalyzer> FrameDetector<'a, A> {
    pub fn new(analyzer: &'a A) -> Self {
        Self { analyzer }
    }

    /// Returns the frames of `subseries`, or `None` if it does not decompose
    /// into at least two frames of equal size.
    pub fn detect(&self, subseries: &Subseries) -> Option<FrameGroup> {
        let assignment = self.analyzer.analyze(&subseries.paths());
        let n_frames = assignment.frames.len();
        if n_frames <= 1 {
            debug!(
                "No multivolumes found in series {} ({} files)",
                subseries.key,
                subseries.len()
            );
            return None;
        }

        let per_frame = assignment.frames[0].files.len();
        if assignment
            .frames
            .iter()
            .any(|frame| frame.files.len() != per_frame)
        {
            warn!(
                "Series {} split by {} into frames of unequal size",
                subseries.key, assignment.tag_name
            );
            return None;
        }

        let records: HashMap<&Path, &FileRecord> = subseries
            .files
            .iter()
            .map(|record| (record.path.as_path(), record))
            .collect();
        let frames = assignment
            .frames
            .into_iter()
            .map(|frame| {
                frame
                    .files
                    .into_iter()
                    .map(|path| {
                        let mut record = match records.get(path.as_path()) {
                            Some(record) => (*record).clone(),
                            None => FileRecord {
                                series_uid: subseries.key.clone(),
                                series_description: subseries.description.clone(),
                                frame_tag_value: None,
                                path,
                            },
                        };
                        record.frame_tag_value = Some(frame.value.clone());
                        record
                    })
                    .collect()
            })
            .collect();

        debug!(
            "Series {} has {} frames by {}",
            subseries.key, n_frames, assignment.tag_name
        );
        Some(FrameGroup {
            tag_name: assignment.tag_name,
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesGrouper;
    use crate::series::tests::FakeHeaders;
    use crate::header::{SERIES_DESCRIPTION, SERIES_INSTANCE_UID};

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn dwi_headers() -> FakeHeaders {
        let mut headers = FakeHeaders::default();
        for (file, b_value) in [
            ("f0", "1000"),
            ("f1", "0"),
            ("f2", "500"),
            ("f3", "1000"),
            ("f4", "0"),
            ("f5", "500"),
        ] {
            headers.add(
                file,
                &[
                    (SERIES_INSTANCE_UID, "1.2"),
                    (SERIES_DESCRIPTION, "DWI"),
                    (tags::ECHO_TIME, "90"),
                    (Tag(0x0019, 0x100C), b_value),
                ],
            );
        }
        headers
    }

    #[test]
    fn splits_on_first_varying_tag_in_numeric_order() {
        let analyzer = TagFrameAnalyzer::new(dwi_headers());
        let assignment = analyzer.analyze(&paths(&["f0", "f1", "f2", "f3", "f4", "f5"]));

        assert_eq!(assignment.tag_name, "SiemensDiffusionBValue");
        let values: Vec<&str> = assignment.frames.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, ["0", "500", "1000"]);
        assert_eq!(assignment.frames[0].files, paths(&["f1", "f4"]));
        assert_eq!(assignment.frames[2].files, paths(&["f0", "f3"]));
    }

    #[test]
    fn constant_tags_give_a_single_frame() {
        let analyzer = TagFrameAnalyzer::new(dwi_headers())
            .with_tags(vec![("EchoTime".to_string(), tags::ECHO_TIME)]);
        let assignment = analyzer.analyze(&paths(&["f0", "f1"]));
        assert_eq!(assignment.frames.len(), 1);
        assert!(assignment.tag_name.is_empty());
    }

    #[test]
    fn unequal_frame_sizes_are_not_split() {
        let analyzer = TagFrameAnalyzer::new(dwi_headers());
        let assignment = analyzer.analyze(&paths(&["f0", "f1", "f3"]));
        assert_eq!(assignment.frames.len(), 1);
    }

    #[test]
    fn lexicographic_order_for_non_numeric_values() {
        let mut frames = vec![
            AnalyzedFrame {
                value: "b".into(),
                files: vec![],
            },
            AnalyzedFrame {
                value: "a".into(),
                files: vec![],
            },
        ];
        TagFrameAnalyzer::<FakeHeaders>::sort_frames(&mut frames);
        assert_eq!(frames[0].value, "a");
    }

    fn add_slice(headers: &mut FakeHeaders, file: &str, tag: Tag, value: &str, z: &str) {
        let position = format!("0\\0\\{z}");
        headers.add(
            file,
            &[
                (SERIES_INSTANCE_UID, "1.3"),
                (tags::IMAGE_ORIENTATION_PATIENT, "1\\0\\0\\0\\1\\0"),
                (tags::IMAGE_POSITION_PATIENT, position.as_str()),
                (tag, value),
            ],
        );
    }

    #[test]
    fn per_slice_values_do_not_make_frames() {
        let mut headers = FakeHeaders::default();
        for (file, time, z) in [("s0", "101500", "0"), ("s1", "101502", "5"), ("s2", "101504", "10")] {
            add_slice(&mut headers, file, tags::ACQUISITION_TIME, time, z);
        }
        let assignment = TagFrameAnalyzer::new(headers).analyze(&paths(&["s0", "s1", "s2"]));
        assert_eq!(assignment.frames.len(), 1);
        assert!(assignment.tag_name.is_empty());
    }

    #[test]
    fn frames_over_the_same_slices_are_split() {
        let mut headers = FakeHeaders::default();
        for (file, time, z) in [
            ("t0z1", "0", "1.0"),
            ("t0z0", "0", "0"),
            ("t1z0", "1000", "0.001"),
            ("t1z1", "1000", "1"),
        ] {
            add_slice(&mut headers, file, tags::TRIGGER_TIME, time, z);
        }
        let assignment =
            TagFrameAnalyzer::new(headers).analyze(&paths(&["t0z1", "t0z0", "t1z0", "t1z1"]));
        assert_eq!(assignment.tag_name, "TriggerTime");
        assert_eq!(assignment.frames[1].files, paths(&["t1z0", "t1z1"]));
    }

    #[test]
    fn shifted_frames_are_not_split() {
        let mut headers = FakeHeaders::default();
        for (file, time, z) in [("a", "0", "0"), ("b", "0", "2"), ("c", "1000", "4"), ("d", "1000", "6")] {
            add_slice(&mut headers, file, tags::TRIGGER_TIME, time, z);
        }
        let assignment = TagFrameAnalyzer::new(headers).analyze(&paths(&["a", "b", "c", "d"]));
        assert_eq!(assignment.frames.len(), 1);
    }

    struct FixedAnalyzer(FrameAssignment);

    impl FrameAnalyzer for FixedAnalyzer {
        fn analyze(&self, _files: &[PathBuf]) -> FrameAssignment {
            self.0.clone()
        }
    }

    #[test]
    fn detect_annotates_records_with_frame_values() {
        let headers = dwi_headers();
        let groups = SeriesGrouper::new(&headers).group(&paths(&["f0", "f1", "f2", "f3", "f4", "f5"]));
        let analyzer = TagFrameAnalyzer::new(dwi_headers());

        let group = FrameDetector::new(&analyzer)
            .detect(&groups["1.2"])
            .expect("three frames");

        assert_eq!(group.n_frames(), 3);
        assert_eq!(group.tag_name, "SiemensDiffusionBValue");
        assert_eq!(group.frames[1][0].frame_tag_value.as_deref(), Some("500"));
        assert_eq!(group.frames[1][0].series_description, "DWI");
        assert_eq!(
            group.file_list(),
            paths(&["f1", "f4", "f2", "f5", "f0", "f3"])
        );
    }

    #[test]
    fn detect_rejects_single_frame_and_uneven_frames() {
        let subseries = Subseries {
            key: "1.2".into(),
            description: "DWI".into(),
            files: Vec::new(),
        };
        let single = FixedAnalyzer(FrameAssignment::single(&paths(&["a"])));
        assert!(FrameDetector::new(&single).detect(&subseries).is_none());

        let uneven = FixedAnalyzer(FrameAssignment {
            tag_name: "TriggerTime".into(),
            frames: vec![
                AnalyzedFrame {
                    value: "0".into(),
                    files: paths(&["a", "b"]),
                },
                AnalyzedFrame {
                    value: "1".into(),
                    files: paths(&["c"]),
                },
            ],
        });
        assert!(FrameDetector::new(&uneven).detect(&subseries).is_none());
    }
}
