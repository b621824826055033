//! Data models for load planning.
//!
//! This module defines the inputs and per-carton outputs shared by the planners:
//! - `Product`: a line of cartons to ship
//! - `ContainerSpec` / `ContainerDims`: a container type and its usable interior
//! - `PlacedCarton`: one carton with its position inside the container
//! - `Truck`: a fleet vehicle as reported by the dispatch system

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Dimensions, EPSILON_GENERAL, Rotation, Vec3, cm3_to_m3};

/// Validation error for planning input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("At least one product with a product code and cartons is required")]
    NoPlannableProducts,
    #[error("Duplicate product code: {0}")]
    DuplicateProductCode(String),
    #[error("Unknown container type: {0}")]
    UnknownContainer(String),
    #[error("Unknown product code '{0}': dimensions and weight must be provided")]
    UnknownProductCode(String),
    #[error("Pickup origin must not be empty")]
    MissingOrigin,
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_value(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_dimensions(dims: &Dimensions, owner: &str) -> Result<(), ValidationError> {
    validate_dimension(dims.length, &format!("{} length", owner))?;
    validate_dimension(dims.width, &format!("{} width", owner))?;
    validate_dimension(dims.height, &format!("{} height", owner))?;
    Ok(())
}

/// A line of identical cartons in a planning request.
///
/// Carton dimensions are in centimeters, weights in kg.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": "p1",
    "productCode": "GLAS-JAR24",
    "cartons": 100,
    "dimensions": { "length": 40.0, "width": 30.0, "height": 30.0 },
    "weightPerCarton": 10.0,
    "fragile": false
}))]
pub struct Product {
    pub id: String,
    pub product_code: String,
    pub cartons: u32,
    pub dimensions: Dimensions,
    pub weight_per_carton: f64,
    #[serde(default)]
    pub fragile: bool,
}

impl Product {
    /// Creates a product after validating dimensions and weight.
    ///
    /// # Examples
    /// ```
    /// use load_planner::model::Product;
    /// use load_planner::types::Dimensions;
    ///
    /// let ok = Product::new("p1", "TV-55", 4, Dimensions::new(140.0, 20.0, 85.0), 25.0, true);
    /// assert!(ok.is_ok());
    ///
    /// let bad = Product::new("p2", "TV-55", 4, Dimensions::new(-1.0, 20.0, 85.0), 25.0, true);
    /// assert!(bad.is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        product_code: impl Into<String>,
        cartons: u32,
        dimensions: Dimensions,
        weight_per_carton: f64,
        fragile: bool,
    ) -> Result<Self, ValidationError> {
        let product = Self {
            id: id.into(),
            product_code: product_code.into(),
            cartons,
            dimensions,
            weight_per_carton,
            fragile,
        };
        product.validate()?;
        Ok(product)
    }

    /// Checks dimensions and weight of one carton.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let owner = format!("Carton of '{}'", self.product_code);
        validate_dimensions(&self.dimensions, &owner)?;
        validate_weight_value(self.weight_per_carton, &format!("{} weight", owner))
    }

    /// Only products with a product code and at least one carton take part in planning.
    pub fn is_plannable(&self) -> bool {
        !self.product_code.trim().is_empty() && self.cartons > 0
    }

    /// Volume of one carton in cm³.
    pub fn carton_volume_cm3(&self) -> f64 {
        self.dimensions.volume()
    }

    /// Volume of all cartons in m³.
    pub fn total_volume_m3(&self) -> f64 {
        cm3_to_m3(self.carton_volume_cm3()) * f64::from(self.cartons)
    }

    /// Weight of all cartons in kg.
    pub fn total_weight(&self) -> f64 {
        self.weight_per_carton * f64::from(self.cartons)
    }
}

/// Iterates over the products that take part in planning.
pub fn plannable(products: &[Product]) -> impl Iterator<Item = &Product> {
    products.iter().filter(|p| p.is_plannable())
}

/// Validates a planning request before any planner runs.
///
/// Products without a code or without cartons are ignored; every remaining product
/// must have valid dimensions and weight and a code unique within the request.
pub fn validate_products(products: &[Product]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut count = 0usize;
    for product in plannable(products) {
        product.validate()?;
        let code = product.product_code.trim().to_ascii_uppercase();
        if !seen.insert(code) {
            return Err(ValidationError::DuplicateProductCode(
                product.product_code.clone(),
            ));
        }
        count += 1;
    }
    if count == 0 {
        return Err(ValidationError::NoPlannableProducts);
    }
    Ok(())
}

/// Usable interior of a container as seen by the placement engine.
///
/// Edges in meters, weight limit in kg.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDims {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub max_weight: f64,
}

impl ContainerDims {
    /// Creates container dimensions with validation.
    pub fn new(
        length: f64,
        width: f64,
        height: f64,
        max_weight: f64,
    ) -> Result<Self, ValidationError> {
        validate_dimensions(&Dimensions::new(length, width, height), "Container")?;
        validate_weight_value(max_weight, "Container max weight")?;
        Ok(Self {
            length,
            width,
            height,
            max_weight,
        })
    }

    /// Interior edges in meters.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.length, self.width, self.height)
    }

    /// Interior edges in centimeters.
    pub fn interior_cm(&self) -> Dimensions {
        self.dimensions().meters_to_cm()
    }
}

/// Catalog entry for a container type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    /// Stable key, e.g. `20ft-standard`.
    pub key: String,
    /// Display name, also the key into the truck compatibility tables.
    pub name: String,
    /// Maximum cargo volume in m³.
    pub max_volume: f64,
    /// Maximum cargo weight in kg.
    pub max_weight: f64,
    /// Cost per container.
    pub cost: f64,
    /// Interior dimensions in meters.
    pub dimensions: Dimensions,
}

impl ContainerSpec {
    pub fn is_high_cube(&self) -> bool {
        self.key.contains("high-cube")
    }

    pub fn is_forty_foot(&self) -> bool {
        self.key.starts_with("40ft")
    }

    pub fn is_refrigerated(&self) -> bool {
        self.key.contains("refrigerated")
    }

    /// The interior as placement engine input.
    pub fn placement_dims(&self) -> ContainerDims {
        ContainerDims {
            length: self.dimensions.length,
            width: self.dimensions.width,
            height: self.dimensions.height,
            max_weight: self.max_weight,
        }
    }
}

/// One physical carton placed inside a container.
///
/// Position is the near-bottom-left corner in centimeters; dimensions are post-rotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlacedCarton {
    /// Product id plus 1-based sequence, e.g. `p1-3`.
    pub id: String,
    pub product_id: String,
    pub product_code: String,
    pub position: Vec3,
    #[schema(value_type = u16, example = 90)]
    pub rotation: Rotation,
    pub dimensions: Dimensions,
    /// 0 for cartons on the floor.
    pub stack_level: u32,
    pub weight: f64,
    pub fragile: bool,
    /// Display color derived from the product's position in the request.
    pub color: String,
}

impl PlacedCarton {
    /// Top Z coordinate.
    pub fn top_z(&self) -> f64 {
        self.position.z + self.dimensions.height
    }

    /// Geometric center of the carton.
    pub fn center(&self) -> Vec3 {
        self.position + self.dimensions.as_vec3() * 0.5
    }

    pub fn volume_cm3(&self) -> f64 {
        self.dimensions.volume()
    }

    /// Checks that the carton lies within an interior of `interior` centimeters.
    pub fn within(&self, interior: &Dimensions) -> bool {
        self.position.x >= -EPSILON_GENERAL
            && self.position.y >= -EPSILON_GENERAL
            && self.position.z >= -EPSILON_GENERAL
            && self.position.x + self.dimensions.length <= interior.length + EPSILON_GENERAL
            && self.position.y + self.dimensions.width <= interior.width + EPSILON_GENERAL
            && self.top_z() <= interior.height + EPSILON_GENERAL
    }
}

/// Operational status of a fleet vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TruckStatus {
    Available,
    #[serde(rename = "En Route")]
    EnRoute,
    #[serde(rename = "In Transit")]
    InTransit,
    Maintenance,
    Loading,
    Unloading,
}

/// Body type of a fleet vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum TruckType {
    #[serde(rename = "Container Truck")]
    ContainerTruck,
    Flatbed,
    Refrigerated,
    Tanker,
    #[serde(rename = "Box Truck")]
    BoxTruck,
}

impl fmt::Display for TruckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TruckType::ContainerTruck => "Container Truck",
            TruckType::Flatbed => "Flatbed",
            TruckType::Refrigerated => "Refrigerated",
            TruckType::Tanker => "Tanker",
            TruckType::BoxTruck => "Box Truck",
        };
        f.write_str(label)
    }
}

/// Load limits of a vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruckCapacity {
    /// kg
    pub max_weight: f64,
    /// m³
    pub max_volume: f64,
    /// Container display names the operator has rated the truck for.
    #[serde(default)]
    pub compatible_containers: Option<Vec<String>>,
}

/// A fleet vehicle, read-only input to truck selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Truck {
    pub id: String,
    pub driver_name: String,
    pub driver_contact: String,
    pub current_location: String,
    #[serde(default)]
    pub destination: Option<String>,
    pub status: TruckStatus,
    /// Estimated time of arrival at the pickup origin.
    pub estimated_arrival: DateTime<Utc>,
    pub capacity: TruckCapacity,
    pub truck_type: TruckType,
    pub last_updated: DateTime<Utc>,
    pub plate_number: String,
    pub available_for_booking: bool,
}

impl Truck {
    /// Checks that the truck can carry the given cargo.
    pub fn can_carry(&self, weight: f64, volume: f64) -> bool {
        weight <= self.capacity.max_weight + EPSILON_GENERAL
            && volume <= self.capacity.max_volume + EPSILON_GENERAL
    }

    /// Checks whether the truck currently stands at `origin` (case-insensitive).
    pub fn is_at(&self, origin: &str) -> bool {
        self.current_location
            .trim()
            .eq_ignore_ascii_case(origin.trim())
    }

    /// Whether the operator lists `container_name` among the truck's rated containers.
    pub fn is_rated_for(&self, container_name: &str) -> bool {
        self.capacity
            .compatible_containers
            .as_ref()
            .is_some_and(|names| names.iter().any(|n| n == container_name))
    }
}
