//! Plane index arithmetic.
//!
//! A series holds `size_z × size_c × size_t` planes addressed by one flat
//! index. The [`DimensionOrder`] says which of Z, C and T varies fastest:
//! the three coordinates form a mixed-radix number whose digits follow the
//! order string after its leading `XY`.
//!
//! A modulo annotation folds a second logical axis into Z, C or T. Sizes
//! passed to the modulo functions are the full axis sizes; the modulo size
//! splits a coordinate into `coordinate / modulo` (outer) and
//! `coordinate % modulo` (inner).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DimensionError;

// =============================================================================
// DimensionOrder
// =============================================================================

/// Rasterization order of the Z, C and T axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DimensionOrder {
    #[default]
    XYZCT,
    XYZTC,
    XYCTZ,
    XYCZT,
    XYTCZ,
    XYTZC,
}

impl DimensionOrder {
    pub const ALL: [DimensionOrder; 6] = [
        DimensionOrder::XYZCT,
        DimensionOrder::XYZTC,
        DimensionOrder::XYCTZ,
        DimensionOrder::XYCZT,
        DimensionOrder::XYTCZ,
        DimensionOrder::XYTZC,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DimensionOrder::XYZCT => "XYZCT",
            DimensionOrder::XYZTC => "XYZTC",
            DimensionOrder::XYCTZ => "XYCTZ",
            DimensionOrder::XYCZT => "XYCZT",
            DimensionOrder::XYTCZ => "XYTCZ",
            DimensionOrder::XYTZC => "XYTZC",
        }
    }

    /// Plane axes from fastest to slowest.
    pub const fn plane_axes(self) -> [char; 3] {
        match self {
            DimensionOrder::XYZCT => ['Z', 'C', 'T'],
            DimensionOrder::XYZTC => ['Z', 'T', 'C'],
            DimensionOrder::XYCTZ => ['C', 'T', 'Z'],
            DimensionOrder::XYCZT => ['C', 'Z', 'T'],
            DimensionOrder::XYTCZ => ['T', 'C', 'Z'],
            DimensionOrder::XYTZC => ['T', 'Z', 'C'],
        }
    }

    /// Position of Z, C and T among the plane axes (0 = fastest).
    fn positions(self) -> [usize; 3] {
        let axes = self.plane_axes();
        let pos = |axis: char| axes.iter().position(|a| *a == axis).unwrap_or(0);
        [pos('Z'), pos('C'), pos('T')]
    }
}

impl fmt::Display for DimensionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionOrder {
    type Err = DimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        DimensionOrder::ALL
            .iter()
            .copied()
            .find(|o| o.as_str() == upper)
            .ok_or_else(|| DimensionError::InvalidOrder(s.to_string()))
    }
}

// =============================================================================
// Modulo
// =============================================================================

/// Sub-axis folded into Z, C or T.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modulo {
    pub start: f64,
    pub end: f64,
    pub step: f64,
    /// Explicit labels; when present they define the size
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Kind of the folded axis (e.g. "lifetime", "angle")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Modulo {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self {
            start,
            end,
            step,
            labels: Vec::new(),
            kind: None,
            unit: None,
        }
    }

    /// Number of positions along the folded axis.
    pub fn size(&self) -> usize {
        if !self.labels.is_empty() {
            return self.labels.len();
        }
        if self.step == 0.0 || !self.step.is_finite() {
            return 1;
        }
        let span = ((self.end - self.start) / self.step).ceil();
        if span.is_finite() && span > 0.0 {
            span as usize + 1
        } else {
            1
        }
    }
}

impl Default for Modulo {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

// =============================================================================
// Coordinates
// =============================================================================

/// Plane coordinates along Z, C and T.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ZctCoords {
    pub z: usize,
    pub c: usize,
    pub t: usize,
}

impl ZctCoords {
    pub const fn new(z: usize, c: usize, t: usize) -> Self {
        Self { z, c, t }
    }
}

/// Outer and inner coordinates of each modulo-folded axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ZctModuloCoords {
    pub z: usize,
    pub c: usize,
    pub t: usize,
    pub modulo_z: usize,
    pub modulo_c: usize,
    pub modulo_t: usize,
}

/// Per-axis modulo sizes; 1 means no folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuloSizes {
    pub z: usize,
    pub c: usize,
    pub t: usize,
}

impl Default for ModuloSizes {
    fn default() -> Self {
        Self { z: 1, c: 1, t: 1 }
    }
}

// =============================================================================
// Index arithmetic
// =============================================================================

fn check_sizes(size_z: usize, size_c: usize, size_t: usize, num: usize) -> Result<(), DimensionError> {
    for (axis, size) in [('Z', size_z), ('C', size_c), ('T', size_t)] {
        if size == 0 {
            return Err(DimensionError::InvalidSize { axis, size });
        }
    }
    let product = size_z
        .checked_mul(size_c)
        .and_then(|p| p.checked_mul(size_t))
        .ok_or(DimensionError::SizeOverflow {
            size_z,
            size_c,
            size_t,
        })?;
    if num == 0 || num > product {
        return Err(DimensionError::CountMismatch { product, total: num });
    }
    Ok(())
}

/// Flat plane index of (z, c, t).
#[allow(clippy::too_many_arguments)]
pub fn get_index(
    order: DimensionOrder,
    size_z: usize,
    size_c: usize,
    size_t: usize,
    num: usize,
    z: usize,
    c: usize,
    t: usize,
) -> Result<usize, DimensionError> {
    check_sizes(size_z, size_c, size_t, num)?;
    for (axis, value, size) in [('Z', z, size_z), ('C', c, size_c), ('T', t, size_t)] {
        if value >= size {
            return Err(DimensionError::CoordinateOutOfRange { axis, value, size });
        }
    }

    let values = [z, c, t];
    let sizes = [size_z, size_c, size_t];
    let mut digits = [0usize; 3];
    let mut radix = [0usize; 3];
    for (axis, position) in order.positions().into_iter().enumerate() {
        digits[position] = values[axis];
        radix[position] = sizes[axis];
    }
    Ok(digits[0] + digits[1] * radix[0] + digits[2] * radix[0] * radix[1])
}

/// Inverse of [`get_index`].
pub fn get_zct_coords(
    order: DimensionOrder,
    size_z: usize,
    size_c: usize,
    size_t: usize,
    num: usize,
    index: usize,
) -> Result<ZctCoords, DimensionError> {
    check_sizes(size_z, size_c, size_t, num)?;
    if index >= num {
        return Err(DimensionError::IndexOutOfRange { index, total: num });
    }

    let sizes = [size_z, size_c, size_t];
    let positions = order.positions();
    let mut radix = [0usize; 3];
    for (axis, position) in positions.into_iter().enumerate() {
        radix[position] = sizes[axis];
    }
    let digits = [
        index % radix[0],
        index / radix[0] % radix[1],
        index / radix[0] / radix[1],
    ];
    Ok(ZctCoords {
        z: digits[positions[0]],
        c: digits[positions[1]],
        t: digits[positions[2]],
    })
}

/// Flat plane index of outer and inner coordinates on modulo-folded axes.
pub fn get_index_modulo(
    order: DimensionOrder,
    size_z: usize,
    size_c: usize,
    size_t: usize,
    modulo: ModuloSizes,
    num: usize,
    coords: ZctModuloCoords,
) -> Result<usize, DimensionError> {
    for (axis, inner, size) in [
        ('z', coords.modulo_z, modulo.z),
        ('c', coords.modulo_c, modulo.c),
        ('t', coords.modulo_t, modulo.t),
    ] {
        if size == 0 {
            return Err(DimensionError::InvalidSize { axis, size });
        }
        if inner >= size {
            return Err(DimensionError::CoordinateOutOfRange { axis, value: inner, size });
        }
    }
    get_index(
        order,
        size_z,
        size_c,
        size_t,
        num,
        coords.z * modulo.z + coords.modulo_z,
        coords.c * modulo.c + coords.modulo_c,
        coords.t * modulo.t + coords.modulo_t,
    )
}

/// Inverse of [`get_index_modulo`].
pub fn get_zct_modulo_coords(
    order: DimensionOrder,
    size_z: usize,
    size_c: usize,
    size_t: usize,
    modulo: ModuloSizes,
    num: usize,
    index: usize,
) -> Result<ZctModuloCoords, DimensionError> {
    for (axis, size) in [('z', modulo.z), ('c', modulo.c), ('t', modulo.t)] {
        if size == 0 {
            return Err(DimensionError::InvalidSize { axis, size });
        }
    }
    let flat = get_zct_coords(order, size_z, size_c, size_t, num, index)?;
    Ok(ZctModuloCoords {
        z: flat.z / modulo.z,
        c: flat.c / modulo.c,
        t: flat.t / modulo.t,
        modulo_z: flat.z % modulo.z,
        modulo_c: flat.c % modulo.c,
        modulo_t: flat.t % modulo.t,
    })
}

// =============================================================================
// Tests
// =============================================================================
