//! Discretized occupancy model of a container interior.
//!
//! The interior is split into cubic cells of `resolution` centimeters. A carton
//! reserves every cell its coordinate range touches (floor of the start, ceil of the
//! end), so boundary cells are over-reserved and collision checks reduce to boolean
//! lookups.

use crate::types::{Dimensions, EPSILON_GENERAL, Vec3};

/// Half-open range of cell indices along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub start: usize,
    pub end: usize,
}

impl CellRange {
    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks whether two ranges share at least one cell.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Cells covered by one carton on all three axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellBox {
    pub x: CellRange,
    pub y: CellRange,
    pub z: CellRange,
}

impl CellBox {
    /// Checks whether the XY projections of both boxes share a cell.
    #[inline]
    pub fn overlaps_footprint(&self, other: &Self) -> bool {
        self.x.overlaps(&other.x) && self.y.overlaps(&other.y)
    }

    /// Checks whether two boxes share at least one cell.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.overlaps_footprint(other) && self.z.overlaps(&other.z)
    }
}

/// Maps the interval `[start, start + length)` to the cells it touches.
///
/// Every interval covers at least one cell, however short it is.
pub fn cell_range(start: f64, length: f64, resolution: f64, limit: usize) -> CellRange {
    let first = ((start + EPSILON_GENERAL) / resolution).floor().max(0.0) as usize;
    let last = ((start + length - EPSILON_GENERAL) / resolution)
        .ceil()
        .max(0.0) as usize;
    CellRange {
        start: first.min(limit),
        end: last.max(first + 1).min(limit),
    }
}

/// Length of the overlap of two intervals, at least 0.0.
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// 3D boolean occupancy grid of one container.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    resolution: f64,
    nx: usize,
    ny: usize,
    nz: usize,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// Upper bound on the number of cells of one grid.
    pub const MAX_CELLS: usize = 1 << 25;

    /// Creates an empty grid for an interior of `interior` centimeters.
    ///
    /// Each axis holds `ceil(dim / resolution)` cells. While that exceeds
    /// `MAX_CELLS` the resolution is doubled, so `resolution()` may be coarser than
    /// requested.
    pub fn new(interior: &Dimensions, resolution: f64) -> Self {
        let mut current = resolution;
        while current.is_finite() && current > 0.0 {
            if let Some(grid) = Self::try_new(interior, current) {
                return grid;
            }
            current *= 2.0;
        }
        // no cell of an empty grid is ever free
        Self {
            resolution,
            nx: 0,
            ny: 0,
            nz: 0,
            cells: Vec::new(),
        }
    }

    /// Like `new` at exactly `resolution`; `None` when the grid would exceed `MAX_CELLS`.
    pub fn try_new(interior: &Dimensions, resolution: f64) -> Option<Self> {
        let axis = |dim: f64| ((dim / resolution) - EPSILON_GENERAL).ceil().max(0.0) as usize;
        let (nx, ny, nz) = (
            axis(interior.length),
            axis(interior.width),
            axis(interior.height),
        );
        let len = nx.checked_mul(ny)?.checked_mul(nz)?;
        (len <= Self::MAX_CELLS).then(|| Self {
            resolution,
            nx,
            ny,
            nz,
            cells: vec![false; len],
        })
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Cell counts along (x, y, z).
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.ny + y) * self.nx + x
    }

    /// Returns whether the cell is reserved; cells outside the grid count as occupied.
    pub fn is_occupied(&self, x: usize, y: usize, z: usize) -> bool {
        if x >= self.nx || y >= self.ny || z >= self.nz {
            return true;
        }
        self.cells[self.index(x, y, z)]
    }

    /// Cells covered by a carton of `dims` whose near-bottom-left corner is at `position`.
    pub fn cells_for(&self, position: Vec3, dims: &Dimensions) -> CellBox {
        CellBox {
            x: cell_range(position.x, dims.length, self.resolution, self.nx),
            y: cell_range(position.y, dims.width, self.resolution, self.ny),
            z: cell_range(position.z, dims.height, self.resolution, self.nz),
        }
    }

    /// Checks that no cell of `cells` is reserved.
    ///
    /// A box without cells lies outside the grid and is never free.
    pub fn is_free(&self, cells: &CellBox) -> bool {
        if cells.x.is_empty() || cells.y.is_empty() || cells.z.is_empty() {
            return false;
        }
        for z in cells.z.start..cells.z.end {
            for y in cells.y.start..cells.y.end {
                for x in cells.x.start..cells.x.end {
                    if self.cells[self.index(x, y, z)] {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Reserves every cell of `cells`.
    pub fn occupy(&mut self, cells: &CellBox) {
        self.fill(cells, true);
    }

    /// Frees every cell of `cells`.
    pub fn release(&mut self, cells: &CellBox) {
        self.fill(cells, false);
    }

    fn fill(&mut self, cells: &CellBox, value: bool) {
        for z in cells.z.start..cells.z.end {
            for y in cells.y.start..cells.y.end {
                for x in cells.x.start..cells.x.end {
                    let idx = self.index(x, y, z);
                    self.cells[idx] = value;
                }
            }
        }
    }

    /// Fraction of the footprint of `cells` resting on reserved cells one layer below.
    ///
    /// The floor supports everything in layer 0.
    pub fn support_ratio(&self, cells: &CellBox) -> f64 {
        if cells.z.start == 0 {
            return 1.0;
        }
        let footprint = cells.x.len() * cells.y.len();
        if footprint == 0 {
            return 0.0;
        }
        let below = cells.z.start - 1;
        let mut supported = 0usize;
        for y in cells.y.start..cells.y.end {
            for x in cells.x.start..cells.x.end {
                if self.cells[self.index(x, y, below)] {
                    supported += 1;
                }
            }
        }
        supported as f64 / footprint as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_20x20x20() -> OccupancyGrid {
        OccupancyGrid::new(&Dimensions::new(20.0, 20.0, 20.0), 10.0)
    }

    #[test]
    fn grid_shape_rounds_up_partial_cells() {
        let grid = OccupancyGrid::new(&Dimensions::new(590.0, 235.0, 239.0), 10.0);
        assert_eq!(grid.shape(), (59, 24, 24));
    }

    #[test]
    fn fine_resolutions_are_coarsened_to_the_cell_limit() {
        let interior = Dimensions::new(590.0, 235.0, 239.0);
        assert!(OccupancyGrid::try_new(&interior, 0.01).is_none());

        let grid = OccupancyGrid::new(&interior, 0.01);
        let (nx, ny, nz) = grid.shape();
        assert!(nx * ny * nz <= OccupancyGrid::MAX_CELLS);
        assert!((grid.resolution() - 1.28).abs() < 1e-9);

        let huge = OccupancyGrid::new(&Dimensions::new(1e12, 1e12, 1e12), 10.0);
        let (nx, ny, nz) = huge.shape();
        assert!(nx * ny * nz <= OccupancyGrid::MAX_CELLS);
    }

    #[test]
    fn boxes_outside_the_grid_are_never_free() {
        let grid = grid_20x20x20();
        let outside = grid.cells_for(Vec3::new(20.0, 0.0, 0.0), &Dimensions::new(10.0, 10.0, 10.0));
        assert!(outside.x.is_empty());
        assert!(!grid.is_free(&outside));
    }

    #[test]
    fn cell_range_dilates_to_touched_cells() {
        assert_eq!(cell_range(0.0, 40.0, 10.0, 100), CellRange { start: 0, end: 4 });
        assert_eq!(cell_range(10.0, 25.0, 10.0, 100), CellRange { start: 1, end: 4 });
        assert_eq!(cell_range(5.0, 10.0, 10.0, 100), CellRange { start: 0, end: 2 });
        assert_eq!(cell_range(80.0, 40.0, 10.0, 10), CellRange { start: 8, end: 10 });
    }

    #[test]
    fn sliver_intervals_still_reserve_a_cell() {
        assert_eq!(cell_range(0.0, 1e-7, 10.0, 100), CellRange { start: 0, end: 1 });
        assert_eq!(cell_range(30.0, 1e-9, 10.0, 100), CellRange { start: 3, end: 4 });
        assert_eq!(cell_range(100.0, 1e-7, 10.0, 10), CellRange { start: 10, end: 10 });
    }

    #[test]
    fn occupy_and_release_toggle_cells() {
        let mut grid = grid_20x20x20();
        let cells = grid.cells_for(Vec3::zero(), &Dimensions::new(10.0, 20.0, 10.0));
        assert!(grid.is_free(&cells));

        grid.occupy(&cells);
        assert!(!grid.is_free(&cells));
        assert!(grid.is_occupied(0, 1, 0));
        assert!(!grid.is_occupied(1, 0, 0));

        grid.release(&cells);
        assert!(grid.is_free(&cells));
    }

    #[test]
    fn cells_outside_grid_count_as_occupied() {
        let grid = grid_20x20x20();
        assert!(grid.is_occupied(2, 0, 0));
        assert!(!grid.is_occupied(1, 1, 1));
    }

    #[test]
    fn support_ratio_counts_layer_below() {
        let mut grid = grid_20x20x20();
        let floor_half = grid.cells_for(Vec3::zero(), &Dimensions::new(10.0, 20.0, 10.0));
        grid.occupy(&floor_half);

        let on_floor = grid.cells_for(Vec3::new(10.0, 0.0, 0.0), &Dimensions::new(10.0, 10.0, 10.0));
        assert_eq!(grid.support_ratio(&on_floor), 1.0);

        let upper = grid.cells_for(Vec3::new(0.0, 0.0, 10.0), &Dimensions::new(20.0, 20.0, 10.0));
        assert!((grid.support_ratio(&upper) - 0.5).abs() < EPSILON_GENERAL);

        let fully_supported =
            grid.cells_for(Vec3::new(0.0, 0.0, 10.0), &Dimensions::new(10.0, 20.0, 10.0));
        assert_eq!(grid.support_ratio(&fully_supported), 1.0);
    }

    #[test]
    fn cell_boxes_intersect_only_when_sharing_cells() {
        let grid = grid_20x20x20();
        let a = grid.cells_for(Vec3::zero(), &Dimensions::new(10.0, 10.0, 10.0));
        let b = grid.cells_for(Vec3::new(10.0, 0.0, 0.0), &Dimensions::new(10.0, 10.0, 10.0));
        let c = grid.cells_for(Vec3::new(5.0, 0.0, 0.0), &Dimensions::new(10.0, 10.0, 10.0));
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(b.intersects(&c));
    }

    #[test]
    fn overlap_1d_is_never_negative() {
        assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
        assert_eq!(overlap_1d(0.0, 5.0, 6.0, 8.0), 0.0);
    }
}
