use crate::geometry::Geometry;

use ndarray::Array3;

/// A single 3-D scalar volume read from the files of one frame.
#[derive(Clone, Debug, Default)]
pub struct ScalarFrame {
    pub data: Array3<u16>,
    pub geometry: Geometry,
}

impl ScalarFrame {
    pub fn new(data: Array3<u16>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
