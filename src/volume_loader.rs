use crate::{
    enums::SortBy,
    geometry::{Geometry, cross, dot},
    volume::ScalarFrame,
};

use dicom::{
    object::{DefaultDicomObject, OpenFileOptions, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use log::{debug, warn};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScalarReaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Failed to decode the pixel data of {}", .0.display())]
    UndecodableSlice(PathBuf),

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing orientation, position or spacing information")]
    MissingGeometry,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// A file list that reads into one scalar volume, in slice order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScalarCandidate {
    pub files: Vec<PathBuf>,
}

/// Single-volume detection and reading.
pub trait ScalarVolumeReader {
    /// Turn each file group into a geometrically sorted candidate. Groups that
    /// cannot form a volume yield nothing.
    fn examine(&self, file_groups: &[Vec<PathBuf>]) -> Vec<ScalarCandidate>;

    /// Read already sorted files into one volume. `scratch_dir` is available
    /// for intermediate artifacts.
    fn read(&self, files: &[PathBuf], scratch_dir: &Path)
    -> Result<ScalarFrame, ScalarReaderError>;
}

/// Reads scalar volumes from DICOM files, decoding slices in parallel.
#[derive(Clone, Copy, Debug, Default)]
pub struct DicomScalarReader {
    sort_by: SortBy,
}

impl DicomScalarReader {
    pub fn new(sort_by: SortBy) -> Self {
        Self { sort_by }
    }

    fn open_header(path: &Path) -> Option<DefaultDicomObject> {
        OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
            .ok()
    }

    fn get_sort_order(dicom_object: &DefaultDicomObject, sort_by: &SortBy) -> Option<f64> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let orientation = Self::orientation(dicom_object)?;
                let position = Self::position(dicom_object)?;
                Some(dot(Self::normal(&orientation), position))
            }
            SortBy::InstanceNumber => dicom_object
                .element(tags::INSTANCE_NUMBER)
                .ok()?
                .to_int::<i32>()
                .ok()
                .map(f64::from),
            SortBy::None => Some(0.0),
        }
    }

    fn sort_files(files_with_order: &mut [(f64, PathBuf)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            files_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }
    }

    fn orientation(dicom_object: &DefaultDicomObject) -> Option<[f64; 6]> {
        let values = dicom_object
            .element(tags::IMAGE_ORIENTATION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        values.get(..6)?.try_into().ok()
    }

    fn position(dicom_object: &DefaultDicomObject) -> Option<[f64; 3]> {
        let values = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        values.get(..3)?.try_into().ok()
    }

    fn pixel_spacing(dicom_object: &DefaultDicomObject) -> Option<[f64; 2]> {
        let values = dicom_object
            .element(tags::PIXEL_SPACING)
            .ok()?
            .to_multi_float64()
            .ok()?;
        values.get(..2)?.try_into().ok()
    }

    fn normal(orientation: &[f64; 6]) -> [f64; 3] {
        cross(
            [orientation[0], orientation[1], orientation[2]],
            [orientation[3], orientation[4], orientation[5]],
        )
    }

    /// Distance between the first two slices along the normal, falling back
    /// to Slice Thickness and then to 1.
    fn slice_spacing(dicom_objects: &[DefaultDicomObject], normal: [f64; 3]) -> f64 {
        let projected: Vec<f64> = dicom_objects
            .iter()
            .take(2)
            .filter_map(|dicom_object| Self::position(dicom_object).map(|p| dot(normal, p)))
            .collect();
        if let [first, second] = projected[..] {
            let spacing = (second - first).abs();
            if spacing > 0.0 {
                return spacing;
            }
        }
        dicom_objects
            .first()
            .and_then(|dicom_object| dicom_object.element(tags::SLICE_THICKNESS).ok())
            .and_then(|element| element.to_float64().ok())
            .filter(|thickness| *thickness > 0.0)
            .unwrap_or(1.0)
    }

    fn get_geometry(dicom_objects: &[DefaultDicomObject]) -> Option<Geometry> {
        let first = dicom_objects.first()?;
        let orientation = Self::orientation(first)?;
        let origin = Self::position(first)?;
        let pixel_spacing = Self::pixel_spacing(first)?;
        let slice_spacing = Self::slice_spacing(dicom_objects, Self::normal(&orientation));
        Geometry::from_dicom(orientation, origin, pixel_spacing, slice_spacing)
    }

    fn decode_image(dicom_object: &DefaultDicomObject) -> Option<Array2<u16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        // stored values, frames are compared voxel by voxel
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::None)
            .with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn validate_dimensions(images: &[Array2<u16>]) -> Result<(), ScalarReaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(ScalarReaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<u16>]) -> Array3<u16> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<u16>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }
}

impl ScalarVolumeReader for DicomScalarReader {
    fn examine(&self, file_groups: &[Vec<PathBuf>]) -> Vec<ScalarCandidate> {
        file_groups
            .iter()
            .filter_map(|files| {
                // one unplaceable slice disqualifies the whole group
                let files_with_order: Option<Vec<(f64, PathBuf)>> = files
                    .par_iter()
                    .map(|path| {
                        let header = Self::open_header(path)?;
                        let order = Self::get_sort_order(&header, &self.sort_by)?;
                        Some((order, path.clone()))
                    })
                    .collect();
                let Some(mut files_with_order) = files_with_order else {
                    warn!(
                        "Group of {} files has slices without a {:?} sort key",
                        files.len(),
                        self.sort_by
                    );
                    return None;
                };
                if files_with_order.is_empty() {
                    debug!("No scalar volume in a group of {} files", files.len());
                    return None;
                }
                Self::sort_files(&mut files_with_order, self.sort_by);
                Some(ScalarCandidate {
                    files: files_with_order.into_iter().map(|(_, path)| path).collect(),
                })
            })
            .collect()
    }

    fn read(
        &self,
        files: &[PathBuf],
        scratch_dir: &Path,
    ) -> Result<ScalarFrame, ScalarReaderError> {
        debug!(
            "Reading {} slices (scratch {})",
            files.len(),
            scratch_dir.display()
        );
        let dicom_objects = files
            .par_iter()
            .map(|path| open_file(path))
            .collect::<Result<Vec<_>, _>>()?;

        let images = files
            .par_iter()
            .zip(dicom_objects.par_iter())
            .map(|(path, dicom_object)| {
                Self::decode_image(dicom_object)
                    .ok_or_else(|| ScalarReaderError::UndecodableSlice(path.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if images.is_empty() {
            return Err(ScalarReaderError::NoValidImages);
        }
        Self::validate_dimensions(&images)?;

        let geometry =
            Self::get_geometry(&dicom_objects).ok_or(ScalarReaderError::MissingGeometry)?;
        Ok(ScalarFrame::new(Self::build_volume_array(&images), geometry))
    }
}
