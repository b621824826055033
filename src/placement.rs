//! Carton placement engine.
//!
//! Greedy first-fit placement of cartons into a single container on a discretized
//! occupancy grid:
//! - robust cargo before fragile cargo, heavier cartons first
//! - scan order z → x → y at grid-resolution steps, rotation 0° before 90°
//! - cartons above the floor need a minimum share of their footprint supported
//! - non-fragile cartons are not lifted above the current stack height
//!
//! The scan is exhaustive: the worst case is O(cartons × grid cells × rotations).

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::geometry::{CellBox, OccupancyGrid};
use crate::model::{ContainerDims, PlacedCarton, Product, plannable};
use crate::types::{
    CenterOfGravityCalculator, Dimensions, EPSILON_GENERAL, Rotation, Vec3, cm3_to_m3, percent_of,
};

/// Display colors assigned to products by their position in the request.
const PRODUCT_COLORS: [&str; 8] = [
    "#3b82f6", "#ef4444", "#10b981", "#f59e0b", "#8b5cf6", "#ec4899", "#14b8a6", "#f97316",
];

/// Configuration for the placement engine.
#[derive(Copy, Clone, Debug)]
pub struct PlacementConfig {
    /// Edge of one grid cell in centimeters; also the scan step.
    pub grid_resolution: f64,
    /// Minimum share of the footprint that must rest on the layer below (0.0 to 1.0).
    pub support_ratio: f64,
    /// Whether the 90° orientation is tried after 0°.
    pub allow_rotation: bool,
}

impl PlacementConfig {
    pub const DEFAULT_GRID_RESOLUTION: f64 = 10.0;
    pub const DEFAULT_SUPPORT_RATIO: f64 = 0.8;
    pub const DEFAULT_ALLOW_ROTATION: bool = true;
    /// Finest accepted grid resolution in centimeters.
    pub const MIN_GRID_RESOLUTION: f64 = 1.0;

    pub fn builder() -> PlacementConfigBuilder {
        PlacementConfigBuilder::default()
    }

    fn rotations(&self) -> &'static [Rotation] {
        if self.allow_rotation {
            &Rotation::ALL
        } else {
            &Rotation::ALL[..1]
        }
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            grid_resolution: Self::DEFAULT_GRID_RESOLUTION,
            support_ratio: Self::DEFAULT_SUPPORT_RATIO,
            allow_rotation: Self::DEFAULT_ALLOW_ROTATION,
        }
    }
}

/// Builder for `PlacementConfig`.
#[derive(Clone, Debug, Default)]
pub struct PlacementConfigBuilder {
    config: PlacementConfig,
}

impl PlacementConfigBuilder {
    /// Values below `PlacementConfig::MIN_GRID_RESOLUTION` are raised to it.
    pub fn grid_resolution(mut self, resolution: f64) -> Self {
        self.config.grid_resolution = resolution.max(PlacementConfig::MIN_GRID_RESOLUTION);
        self
    }

    pub fn support_ratio(mut self, ratio: f64) -> Self {
        self.config.support_ratio = ratio;
        self
    }

    pub fn allow_rotation(mut self, allow: bool) -> Self {
        self.config.allow_rotation = allow;
        self
    }

    pub fn build(self) -> PlacementConfig {
        self.config
    }
}

/// Why a carton could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    TooHeavyForContainer,
    DimensionsExceedContainer,
    NoStablePosition,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::TooHeavyForContainer => "too_heavy_for_container",
            UnplacedReason::DimensionsExceedContainer => "dimensions_exceed_container",
            UnplacedReason::NoStablePosition => "no_stable_position",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::TooHeavyForContainer => {
                write!(f, "Carton would exceed the container weight limit")
            }
            UnplacedReason::DimensionsExceedContainer => {
                write!(f, "Carton does not fit the container in any orientation")
            }
            UnplacedReason::NoStablePosition => {
                write!(f, "No free, supported position left in the container")
            }
        }
    }
}

/// A carton that could not be placed.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnplacedCarton {
    pub id: String,
    pub product_code: String,
    pub reason_code: String,
    pub reason: String,
}

/// Result of one placement run.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlacementResult {
    pub placed_cartons: Vec<PlacedCarton>,
    pub unplaced_cartons: usize,
    pub unplaced: Vec<UnplacedCarton>,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    /// Weight-weighted average of carton centers, in centimeters.
    pub center_of_gravity: Vec3,
    /// Tallest occupied height relative to the container height, in percent.
    pub stacking_efficiency: f64,
}

impl PlacementResult {
    pub fn is_complete(&self) -> bool {
        self.unplaced_cartons == 0
    }

    pub fn total_placed_weight(&self) -> f64 {
        self.placed_cartons.iter().map(|c| c.weight).sum()
    }

    /// Volume of all placed cartons in m³.
    pub fn total_placed_volume(&self) -> f64 {
        cm3_to_m3(self.placed_cartons.iter().map(|c| c.volume_cm3()).sum())
    }
}

/// Events emitted during a placement run, for live visualization.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum PlacementEvent {
    /// A carton was placed.
    CartonPlaced {
        carton: PlacedCarton,
        total_weight: f64,
    },
    /// A carton could not be placed.
    CartonRejected {
        id: String,
        product_code: String,
        reason_code: String,
        reason_text: String,
    },
    /// Placement finished.
    Finished { placed: usize, unplaced: usize },
}

/// Places the products into the container with the default configuration.
///
/// # Examples
/// ```
/// use load_planner::model::{ContainerDims, Product};
/// use load_planner::placement::place;
/// use load_planner::types::Dimensions;
///
/// let container = ContainerDims::new(1.0, 1.0, 1.0, 500.0).unwrap();
/// let products = vec![
///     Product::new("p1", "BOX", 4, Dimensions::new(50.0, 50.0, 50.0), 10.0, false).unwrap(),
/// ];
/// let result = place(&container, &products);
/// assert_eq!(result.placed_cartons.len(), 4);
/// assert_eq!(result.unplaced_cartons, 0);
/// ```
pub fn place(container: &ContainerDims, products: &[Product]) -> PlacementResult {
    place_with_config(container, products, PlacementConfig::default())
}

/// Like `place`, with custom parameters.
pub fn place_with_config(
    container: &ContainerDims,
    products: &[Product],
    config: PlacementConfig,
) -> PlacementResult {
    place_with_progress(container, products, config, |_| {})
}

/// Placement with a progress callback invoked for every carton and at the end.
pub fn place_with_progress(
    container: &ContainerDims,
    products: &[Product],
    config: PlacementConfig,
    mut on_event: impl FnMut(&PlacementEvent),
) -> PlacementResult {
    let mut run = PlacementRun::new(container, config);

    for (color_index, product) in placement_order(products) {
        let color = PRODUCT_COLORS[color_index % PRODUCT_COLORS.len()];
        for seq in 1..=product.cartons {
            let id = format!("{}-{}", product.id, seq);
            match run.place_carton(product, id.clone(), color) {
                Ok(carton) => {
                    on_event(&PlacementEvent::CartonPlaced {
                        carton: carton.clone(),
                        total_weight: run.total_weight,
                    });
                    run.placed.push(carton);
                }
                Err(reason) => {
                    debug!(carton = %id, reason = reason.code(), "carton rejected");
                    on_event(&PlacementEvent::CartonRejected {
                        id: id.clone(),
                        product_code: product.product_code.clone(),
                        reason_code: reason.code().to_string(),
                        reason_text: reason.to_string(),
                    });
                    run.unplaced.push(UnplacedCarton {
                        id,
                        product_code: product.product_code.clone(),
                        reason_code: reason.code().to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }

    on_event(&PlacementEvent::Finished {
        placed: run.placed.len(),
        unplaced: run.unplaced.len(),
    });
    run.finish()
}

/// Plannable products in placement order, each paired with its index in the request.
///
/// Non-fragile before fragile, heavier cartons first within each group; the sort is
/// stable so equal products keep request order.
fn placement_order(products: &[Product]) -> Vec<(usize, &Product)> {
    let mut ordered: Vec<(usize, &Product)> = products
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_plannable())
        .collect();
    ordered.sort_by(|(_, a), (_, b)| {
        a.fragile.cmp(&b.fragile).then_with(|| {
            b.weight_per_carton
                .partial_cmp(&a.weight_per_carton)
                .unwrap_or(Ordering::Equal)
        })
    });
    ordered
}

/// State of a single placement run. Built fresh for every call.
struct PlacementRun {
    config: PlacementConfig,
    interior: Dimensions,
    max_weight: f64,
    grid: OccupancyGrid,
    placed: Vec<PlacedCarton>,
    placed_cells: Vec<CellBox>,
    unplaced: Vec<UnplacedCarton>,
    total_weight: f64,
    max_stack_height: f64,
}

impl PlacementRun {
    fn new(container: &ContainerDims, mut config: PlacementConfig) -> Self {
        let interior = container.interior_cm();
        let requested = config
            .grid_resolution
            .max(PlacementConfig::MIN_GRID_RESOLUTION);
        let grid = OccupancyGrid::new(&interior, requested);
        if grid.resolution() > requested {
            warn!(
                requested,
                used = grid.resolution(),
                "grid too fine for this container, using a coarser resolution"
            );
        }
        config.grid_resolution = grid.resolution();
        Self {
            config,
            interior,
            max_weight: container.max_weight,
            grid,
            placed: Vec::new(),
            placed_cells: Vec::new(),
            unplaced: Vec::new(),
            total_weight: 0.0,
            max_stack_height: 0.0,
        }
    }

    /// Finds a position for one carton and reserves it.
    ///
    /// The returned carton is not yet pushed to `placed`.
    fn place_carton(
        &mut self,
        product: &Product,
        id: String,
        color: &str,
    ) -> Result<PlacedCarton, UnplacedReason> {
        if self.total_weight + product.weight_per_carton > self.max_weight + EPSILON_GENERAL {
            return Err(UnplacedReason::TooHeavyForContainer);
        }

        let fits_somehow = self.config.rotations().iter().any(|r| {
            product
                .dimensions
                .rotated(*r)
                .fits_within(&self.interior, EPSILON_GENERAL)
        });
        if !fits_somehow {
            return Err(UnplacedReason::DimensionsExceedContainer);
        }

        let (position, rotation, dims, cells) = self
            .find_position(&product.dimensions, product.fragile)
            .ok_or(UnplacedReason::NoStablePosition)?;

        let stack_level = self.stack_level_at(&cells);
        self.grid.occupy(&cells);
        self.placed_cells.push(cells);
        self.total_weight += product.weight_per_carton;
        self.max_stack_height = self.max_stack_height.max(position.z + dims.height);

        Ok(PlacedCarton {
            id,
            product_id: product.id.clone(),
            product_code: product.product_code.clone(),
            position,
            rotation,
            dimensions: dims,
            stack_level,
            weight: product.weight_per_carton,
            fragile: product.fragile,
            color: color.to_string(),
        })
    }

    /// First accepted position in scan order z → x → y, rotation 0° before 90°.
    fn find_position(
        &self,
        dims: &Dimensions,
        fragile: bool,
    ) -> Option<(Vec3, Rotation, Dimensions, CellBox)> {
        let step = self.config.grid_resolution;
        // non-fragile cartons only start below the stack height plus their own height
        let scan_limit = if fragile {
            self.interior.height
        } else {
            self.max_stack_height + dims.height
        };

        let mut zi = 0u32;
        loop {
            let z = f64::from(zi) * step;
            if z >= scan_limit - EPSILON_GENERAL
                || z + dims.height > self.interior.height + EPSILON_GENERAL
            {
                return None;
            }

            let mut xi = 0u32;
            while f64::from(xi) * step < self.interior.length - EPSILON_GENERAL {
                let x = f64::from(xi) * step;

                let mut yi = 0u32;
                while f64::from(yi) * step < self.interior.width - EPSILON_GENERAL {
                    let y = f64::from(yi) * step;

                    for &rotation in self.config.rotations() {
                        let rotated = dims.rotated(rotation);
                        if x + rotated.length > self.interior.length + EPSILON_GENERAL
                            || y + rotated.width > self.interior.width + EPSILON_GENERAL
                        {
                            continue;
                        }

                        let position = Vec3::new(x, y, z);
                        let cells = self.grid.cells_for(position, &rotated);
                        if !self.grid.is_free(&cells) {
                            continue;
                        }
                        if z > EPSILON_GENERAL
                            && self.grid.support_ratio(&cells)
                                < self.config.support_ratio - EPSILON_GENERAL
                        {
                            continue;
                        }

                        return Some((position, rotation, rotated, cells));
                    }
                    yi += 1;
                }
                xi += 1;
            }
            zi += 1;
        }
    }

    /// 0 on the floor, otherwise one above the highest carton directly underneath.
    fn stack_level_at(&self, cells: &CellBox) -> u32 {
        if cells.z.start == 0 {
            return 0;
        }
        self.placed
            .iter()
            .zip(&self.placed_cells)
            .filter(|(_, below)| {
                below.z.end == cells.z.start && below.overlaps_footprint(cells)
            })
            .map(|(carton, _)| carton.stack_level + 1)
            .max()
            .unwrap_or(1)
    }

    fn finish(self) -> PlacementResult {
        let container_volume = self.interior.volume();
        let placed_volume: f64 = self.placed.iter().map(|c| c.volume_cm3()).sum();

        let mut cog = CenterOfGravityCalculator::new();
        for carton in &self.placed {
            cog.add_point(carton.center(), carton.weight);
        }

        let tallest = self
            .placed
            .iter()
            .map(|c| c.top_z())
            .fold(0.0_f64, f64::max);

        PlacementResult {
            unplaced_cartons: self.unplaced.len(),
            unplaced: self.unplaced,
            volume_utilization: percent_of(placed_volume, container_volume),
            weight_utilization: percent_of(self.total_weight, self.max_weight),
            center_of_gravity: cog.compute().unwrap_or_default(),
            stacking_efficiency: percent_of(tallest, self.interior.height),
            placed_cartons: self.placed,
        }
    }
}

/// Total cartons the plannable products ask for.
pub fn requested_carton_count(products: &[Product]) -> usize {
    plannable(products).map(|p| p.cartons as usize).sum()
}
