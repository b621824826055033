//! End-to-end planning pipeline.
//!
//! validate → select container → place cartons → select truck. Each stage works on
//! the container recommended by the one before, unless the caller overrides it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::catalog;
use crate::container_selector::{ContainerSelectionResult, select_container};
use crate::model::{Product, Truck, ValidationError, validate_products};
use crate::placement::{PlacementConfig, PlacementResult, place_with_config};
use crate::truck_selector::{TripRequest, TruckSelectionResult, select_truck};

/// Input of one planning run.
#[derive(Clone, Debug)]
pub struct PlanRequest {
    pub products: Vec<Product>,
    /// Catalog key or name that replaces the recommended container.
    pub container_key: Option<String>,
    pub fleet: Vec<Truck>,
    pub trip: TripRequest,
}

/// Output of one planning run.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub container: ContainerSelectionResult,
    pub placement: PlacementResult,
    pub truck: TruckSelectionResult,
}

/// Runs container selection, honouring an optional override.
///
/// With an override, the returned result recommends the overridden container.
pub fn choose_container(
    products: &[Product],
    container_key: Option<&str>,
) -> Result<ContainerSelectionResult, ValidationError> {
    let selection = select_container(products);
    match container_key.map(str::trim).filter(|k| !k.is_empty()) {
        None => Ok(selection),
        Some(key) => {
            let spec = catalog::find_container(key)
                .ok_or_else(|| ValidationError::UnknownContainer(key.to_string()))?;
            Ok(selection.with_recommendation(spec))
        }
    }
}

/// Plans a shipment. Fails only on invalid input; infeasible cargo is reported in
/// the result.
pub fn plan(
    request: &PlanRequest,
    config: PlacementConfig,
    now: DateTime<Utc>,
) -> Result<PlanResult, ValidationError> {
    validate_products(&request.products)?;

    let container = choose_container(&request.products, request.container_key.as_deref())?;
    let spec = &container.recommended_option.container;
    info!(
        container = %spec.name,
        can_fit = container.recommended_option.can_fit,
        volume_m3 = container.total_volume,
        weight_kg = container.total_weight,
        "container chosen"
    );

    let placement = place_with_config(&spec.placement_dims(), &request.products, config);
    if placement.is_complete() {
        info!(placed = placement.placed_cartons.len(), "all cartons placed");
    } else {
        info!(
            placed = placement.placed_cartons.len(),
            unplaced = placement.unplaced_cartons,
            "placement incomplete"
        );
    }

    let truck = select_truck(&request.fleet, &container, &request.trip, now);
    match &truck.recommended_truck {
        Some(option) => info!(truck = %option.truck.id, score = option.score, "truck recommended"),
        None => info!(
            available = truck.available_trucks,
            "no truck can take this shipment"
        ),
    }

    Ok(PlanResult {
        container,
        placement,
        truck,
    })
}
