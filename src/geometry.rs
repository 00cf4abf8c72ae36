pub type Matrix4 = [[f64; 4]; 4];

pub const IDENTITY: Matrix4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Voxel (IJK) to patient (RAS) mapping of a volume, forward and inverse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub ijk_to_ras: Matrix4,
    pub ras_to_ijk: Matrix4,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            ijk_to_ras: IDENTITY,
            ras_to_ijk: IDENTITY,
        }
    }
}

impl Geometry {
    /// Build the geometry from DICOM attributes.
    ///
    /// * `orientation` - Image Orientation Patient (row cosines, column cosines)
    /// * `origin` - Image Position Patient of the first slice
    /// * `pixel_spacing` - Pixel Spacing (between rows, between columns)
    /// * `slice_spacing` - distance between slices along the normal
    pub fn from_dicom(
        orientation: [f64; 6],
        origin: [f64; 3],
        pixel_spacing: [f64; 2],
        slice_spacing: f64,
    ) -> Option<Self> {
        let row = [orientation[0], orientation[1], orientation[2]];
        let column = [orientation[3], orientation[4], orientation[5]];
        let normal = cross(row, column);

        // columns of the IJK -> LPS affine
        let axes = [
            scale(row, pixel_spacing[1]),
            scale(column, pixel_spacing[0]),
            scale(normal, slice_spacing),
        ];
        let mut ijk_to_ras = IDENTITY;
        for r in 0..3 {
            // LPS -> RAS flips the first two axes
            let sign = if r < 2 { -1.0 } else { 1.0 };
            for (c, axis) in axes.iter().enumerate() {
                ijk_to_ras[r][c] = sign * axis[r];
            }
            ijk_to_ras[r][3] = sign * origin[r];
        }

        let ras_to_ijk = invert_affine(&ijk_to_ras)?;
        Some(Self {
            ijk_to_ras,
            ras_to_ijk,
        })
    }

    /// True if every element of both transforms is within `tolerance`.
    pub fn approx_eq(&self, other: &Geometry, tolerance: f64) -> bool {
        let close = |a: &Matrix4, b: &Matrix4| {
            a.iter()
                .flatten()
                .zip(b.iter().flatten())
                .all(|(x, y)| (x - y).abs() <= tolerance)
        };
        close(&self.ijk_to_ras, &other.ijk_to_ras) && close(&self.ras_to_ijk, &other.ras_to_ijk)
    }
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0].mul_add(b[0], a[1].mul_add(b[1], a[2] * b[2]))
}

fn scale(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Invert an affine matrix (last row `0 0 0 1`). `None` if singular.
pub fn invert_affine(m: &Matrix4) -> Option<Matrix4> {
    let a = |r: usize, c: usize| m[r][c];
    let cofactor = [
        [
            a(1, 1) * a(2, 2) - a(1, 2) * a(2, 1),
            a(0, 2) * a(2, 1) - a(0, 1) * a(2, 2),
            a(0, 1) * a(1, 2) - a(0, 2) * a(1, 1),
        ],
        [
            a(1, 2) * a(2, 0) - a(1, 0) * a(2, 2),
            a(0, 0) * a(2, 2) - a(0, 2) * a(2, 0),
            a(0, 2) * a(1, 0) - a(0, 0) * a(1, 2),
        ],
        [
            a(1, 0) * a(2, 1) - a(1, 1) * a(2, 0),
            a(0, 1) * a(2, 0) - a(0, 0) * a(2, 1),
            a(0, 0) * a(1, 1) - a(0, 1) * a(1, 0),
        ],
    ];
    let det = a(0, 0) * cofactor[0][0] + a(0, 1) * cofactor[1][0] + a(0, 2) * cofactor[2][0];
    if det.abs() < f64::EPSILON {
        return None;
    }

    let mut inverse = IDENTITY;
    for r in 0..3 {
        for c in 0..3 {
            inverse[r][c] = cofactor[r][c] / det;
        }
    }
    for r in 0..3 {
        inverse[r][3] = -(0..3).map(|c| inverse[r][c] * m[c][3]).sum::<f64>();
    }
    Some(inverse)
}
