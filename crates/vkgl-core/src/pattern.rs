//! Pixel generators used to fill a shared image.
//!
//! Every generator returns tightly packed RGBA8 bytes, row-major, top row
//! first. Colors are given as `0xAABBGGRR` so that the little-endian byte
//! order matches `R, G, B, A` in memory.

use bytemuck::cast_slice;

use crate::types::Extent2D;

/// Opaque red, the color the demo fills its image with.
pub const DEFAULT_FILL: u32 = 0xFF00_00FF;

/// Fill pattern selectable from the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pattern {
    /// Leave the image contents to whatever the driver provides.
    None,
    #[default]
    Solid,
    Checkerboard,
    Gradient,
}

impl Pattern {
    /// Parse a pattern name as accepted by `--pattern`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "solid" => Some(Self::Solid),
            "checker" | "checkerboard" => Some(Self::Checkerboard),
            "gradient" => Some(Self::Gradient),
            _ => None,
        }
    }

    /// Generate pixels for this pattern, or `None` for [`Pattern::None`].
    pub fn generate(self, extent: Extent2D) -> Option<Vec<u8>> {
        match self {
            Self::None => None,
            Self::Solid => Some(solid(extent, DEFAULT_FILL)),
            Self::Checkerboard => Some(checkerboard(extent, 16, DEFAULT_FILL, 0xFFFF_FFFF)),
            Self::Gradient => Some(gradient(extent)),
        }
    }
}

fn pack(pixels: &[u32]) -> Vec<u8> {
    cast_slice::<u32, u8>(pixels).to_vec()
}

/// Every texel set to `color`.
pub fn solid(extent: Extent2D, color: u32) -> Vec<u8> {
    let count = extent.texel_count() as usize;
    pack(&vec![color.to_le(); count])
}

/// Alternating squares of `cell` texels.
pub fn checkerboard(extent: Extent2D, cell: u32, a: u32, b: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity(extent.texel_count() as usize);
    for y in 0..extent.height {
        for x in 0..extent.width {
            let even = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.push(if even { a } else { b }.to_le());
        }
    }
    pack(&pixels)
}

/// Red increasing left to right, green increasing top to bottom.
pub fn gradient(extent: Extent2D) -> Vec<u8> {
    let ramp = |v: u32, max: u32| -> u32 {
        if max <= 1 {
            0
        } else {
            v * 255 / (max - 1)
        }
    };

    let mut pixels = Vec::with_capacity(extent.texel_count() as usize);
    for y in 0..extent.height {
        for x in 0..extent.width {
            let r = ramp(x, extent.width);
            let g = ramp(y, extent.height);
            pixels.push((0xFF00_0000 | (g << 8) | r).to_le());
        }
    }
    pack(&pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_fill_byte_order() {
        let bytes = solid(Extent2D::new(2, 1), DEFAULT_FILL);
        assert_eq!(bytes, [0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let extent = Extent2D::new(4, 2);
        let bytes = checkerboard(extent, 2, 0xFF00_0000, 0xFFFF_FFFF);
        assert_eq!(bytes.len(), 32);
        // (0,0) is `a`, (2,0) is `b`.
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0xFF]);
        assert_eq!(&bytes[8..12], &[0xFF; 4]);
    }

    #[test]
    fn gradient_corners() {
        let extent = Extent2D::square(4);
        let bytes = gradient(extent);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0xFF]);
        let last = bytes.len() - 4;
        assert_eq!(&bytes[last..], &[0xFF, 0xFF, 0, 0xFF]);
    }

    #[test]
    fn pattern_names() {
        assert_eq!(Pattern::from_name("checker"), Some(Pattern::Checkerboard));
        assert_eq!(Pattern::from_name("stripes"), None);
        assert!(Pattern::None.generate(Extent2D::square(8)).is_none());
        assert_eq!(
            Pattern::Solid.generate(Extent2D::square(8)).map(|p| p.len()),
            Some(256)
        );
    }
}
