/// Order in which the slices of a single frame are stacked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Position along the slice normal (Image Position Patient projected on
    /// the cross product of the Image Orientation Patient cosines).
    #[default]
    ImagePositionPatient,
    InstanceNumber,
    /// Keep the order the files were given in.
    None,
}

/// What to do when the frame file list does not divide evenly into frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameRemainder {
    /// Fail the load.
    #[default]
    Reject,
    /// Use `files / frames` files per frame and drop the trailing files.
    Truncate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMap {
    #[default]
    None,
    Grey,
}
