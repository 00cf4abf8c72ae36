use crate::enums::ColorMap;
use crate::frame_detector::FrameGroup;
use crate::geometry::Geometry;
use crate::scene::NodeId;

use ndarray::{Array1, Array2, Array4, ArrayView3, Axis};
use std::path::PathBuf;

/// What the frame detection found out about a multivolume.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameAttributes {
    pub n_frames: usize,
    /// Name of the DICOM tag whose value differs between frames.
    pub frame_tag_name: String,
    /// All frame files, frame after frame.
    pub frame_file_list: Vec<PathBuf>,
}

impl From<&FrameGroup> for FrameAttributes {
    fn from(group: &FrameGroup) -> Self {
        Self {
            n_frames: group.n_frames(),
            frame_tag_name: group.tag_name.clone(),
            frame_file_list: group.file_list(),
        }
    }
}

/// A volume whose voxels carry one component per frame.
#[derive(Clone, Debug, Default)]
pub struct MultiVolume {
    pub name: String,
    pub attributes: FrameAttributes,
    pub geometry: Geometry,
    /// (depth, height, width, frames), components contiguous per voxel.
    pub data: Option<Array4<u16>>,
    /// One scalar per frame, e.g. the b-value.
    pub frame_values: Array1<f64>,
    /// One 3-vector per frame, e.g. the gradient direction.
    pub frame_directions: Array2<f64>,
    pub display_node: Option<NodeId>,
}

impl MultiVolume {
    /// An empty multivolume as created before any frames are known.
    pub fn placeholder() -> Self {
        Self {
            name: "MultiVolume node".to_string(),
            ..Default::default()
        }
    }

    pub fn n_frames(&self) -> usize {
        self.attributes.n_frames
    }

    pub fn set_number_of_frames(&mut self, n_frames: usize) {
        self.attributes.n_frames = n_frames;
    }

    /// Dimensions of one frame (depth, height, width).
    pub fn dim(&self) -> Option<(usize, usize, usize)> {
        self.data.as_ref().map(|data| {
            let (depth, height, width, _) = data.dim();
            (depth, height, width)
        })
    }

    /// Voxel data of frame `index`.
    pub fn component(&self, index: usize) -> Option<ArrayView3<'_, u16>> {
        let data = self.data.as_ref()?;
        (index < data.len_of(Axis(3))).then(|| data.index_axis(Axis(3), index))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiVolumeDisplayNode {
    pub color_map: ColorMap,
}

impl MultiVolumeDisplayNode {
    pub fn set_default_color_map(&mut self) {
        self.color_map = ColorMap::Grey;
    }
}
