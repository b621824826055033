//! Static reference data: container catalog, product catalog, truck compatibility
//! tables and a demo fleet snapshot.
//!
//! Everything here is read-only configuration built once per process.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{ContainerSpec, Truck, TruckCapacity, TruckStatus, TruckType};
use crate::types::Dimensions;

/// Display name of the less-than-container-load option in the compatibility tables.
pub const LCL_SHIPMENT: &str = "LCL Shipment";

static CONTAINER_CATALOG: OnceLock<Vec<ContainerSpec>> = OnceLock::new();

fn spec(
    key: &str,
    name: &str,
    max_volume: f64,
    max_weight: f64,
    cost: f64,
    dims: Dimensions,
) -> ContainerSpec {
    ContainerSpec {
        key: key.to_string(),
        name: name.to_string(),
        max_volume,
        max_weight,
        cost,
        dimensions: dims,
    }
}

/// The container catalog in its canonical order.
pub fn containers() -> &'static [ContainerSpec] {
    CONTAINER_CATALOG.get_or_init(|| {
        vec![
            spec(
                "20ft-standard",
                "20ft Standard Container",
                33.2,
                28_230.0,
                1_500.0,
                Dimensions::new(5.90, 2.35, 2.39),
            ),
            spec(
                "40ft-standard",
                "40ft Standard Container",
                67.7,
                26_680.0,
                2_500.0,
                Dimensions::new(12.03, 2.35, 2.39),
            ),
            spec(
                "40ft-high-cube",
                "40ft High Cube Container",
                76.4,
                28_750.0,
                2_800.0,
                Dimensions::new(12.03, 2.35, 2.70),
            ),
            spec(
                "20ft-refrigerated",
                "20ft Refrigerated Container",
                28.3,
                27_400.0,
                3_200.0,
                Dimensions::new(5.44, 2.29, 2.27),
            ),
        ]
    })
}

/// Looks up a catalog entry by key or display name.
pub fn find_container(key_or_name: &str) -> Option<&'static ContainerSpec> {
    let needle = key_or_name.trim();
    containers()
        .iter()
        .find(|c| c.key.eq_ignore_ascii_case(needle) || c.name.eq_ignore_ascii_case(needle))
}

/// Known product used to auto-fill carton data from a product code.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    #[schema(value_type = String)]
    pub code: &'static str,
    #[schema(value_type = String)]
    pub name: &'static str,
    /// Carton dimensions in centimeters.
    pub dimensions: Dimensions,
    pub weight_per_carton: f64,
    pub fragile: bool,
}

const PRODUCT_CATALOG: &[CatalogProduct] = &[
    CatalogProduct {
        code: "ELEC-TV55",
        name: "55\" LED television",
        dimensions: Dimensions::new(140.0, 20.0, 85.0),
        weight_per_carton: 25.0,
        fragile: true,
    },
    CatalogProduct {
        code: "APPL-WM07",
        name: "Front-load washing machine",
        dimensions: Dimensions::new(60.0, 60.0, 85.0),
        weight_per_carton: 70.0,
        fragile: false,
    },
    CatalogProduct {
        code: "FURN-CHR01",
        name: "Stackable office chair",
        dimensions: Dimensions::new(60.0, 60.0, 90.0),
        weight_per_carton: 12.0,
        fragile: false,
    },
    CatalogProduct {
        code: "TEXT-BALE",
        name: "Cotton fabric bale",
        dimensions: Dimensions::new(80.0, 50.0, 40.0),
        weight_per_carton: 45.0,
        fragile: false,
    },
    CatalogProduct {
        code: "GLAS-JAR24",
        name: "Glass jars, 24 pack",
        dimensions: Dimensions::new(40.0, 30.0, 30.0),
        weight_per_carton: 10.0,
        fragile: true,
    },
    CatalogProduct {
        code: "FOOD-RICE25",
        name: "Rice, 25 kg carton",
        dimensions: Dimensions::new(50.0, 35.0, 15.0),
        weight_per_carton: 25.0,
        fragile: false,
    },
];

/// All known products.
pub fn products() -> &'static [CatalogProduct] {
    PRODUCT_CATALOG
}

/// Looks up a product by code (case-insensitive).
pub fn lookup_product(code: &str) -> Option<&'static CatalogProduct> {
    let needle = code.trim();
    PRODUCT_CATALOG
        .iter()
        .find(|p| p.code.eq_ignore_ascii_case(needle))
}

/// Truck types that carry the named container without any caveat.
pub fn tier_one_truck_types(container_name: &str) -> &'static [TruckType] {
    match container_name {
        "20ft Standard Container" | "40ft Standard Container" | "40ft High Cube Container" => {
            &[TruckType::ContainerTruck]
        }
        "20ft Refrigerated Container" => &[TruckType::Refrigerated],
        LCL_SHIPMENT => &[TruckType::BoxTruck],
        _ => &[],
    }
}

/// Truck types that can carry the named container with limitations.
pub fn tier_two_truck_types(container_name: &str) -> &'static [TruckType] {
    match container_name {
        "20ft Standard Container" | "40ft Standard Container" | "40ft High Cube Container" => {
            &[TruckType::Flatbed]
        }
        "20ft Refrigerated Container" => &[TruckType::ContainerTruck],
        LCL_SHIPMENT => &[TruckType::ContainerTruck, TruckType::Refrigerated],
        _ => &[],
    }
}

/// A demo fleet snapshot with arrival times relative to `now`.
pub fn demo_fleet(now: DateTime<Utc>) -> Vec<Truck> {
    let truck = |id: &str,
                 driver: &str,
                 location: &str,
                 status: TruckStatus,
                 eta_hours: i64,
                 truck_type: TruckType,
                 max_weight: f64,
                 max_volume: f64,
                 available: bool| Truck {
        id: id.to_string(),
        driver_name: driver.to_string(),
        driver_contact: format!("+91-98200-{}", &id[id.len() - 3..]),
        current_location: location.to_string(),
        destination: None,
        status,
        estimated_arrival: now + Duration::hours(eta_hours),
        capacity: TruckCapacity {
            max_weight,
            max_volume,
            compatible_containers: None,
        },
        truck_type,
        last_updated: now,
        plate_number: format!("MH-04-{}", &id[id.len() - 3..]),
        available_for_booking: available,
    };

    vec![
        truck(
            "TRK-001",
            "Rajesh Kumar",
            "Mumbai",
            TruckStatus::Available,
            0,
            TruckType::ContainerTruck,
            30_000.0,
            80.0,
            true,
        ),
        truck(
            "TRK-002",
            "Amit Singh",
            "Pune",
            TruckStatus::EnRoute,
            4,
            TruckType::ContainerTruck,
            32_000.0,
            85.0,
            true,
        ),
        truck(
            "TRK-003",
            "Suresh Patel",
            "Nashik",
            TruckStatus::Available,
            3,
            TruckType::Flatbed,
            28_000.0,
            70.0,
            true,
        ),
        truck(
            "TRK-004",
            "Vikram Rao",
            "Mumbai",
            TruckStatus::Loading,
            1,
            TruckType::Refrigerated,
            24_000.0,
            60.0,
            true,
        ),
        truck(
            "TRK-005",
            "Manoj Verma",
            "Thane",
            TruckStatus::Available,
            1,
            TruckType::BoxTruck,
            8_000.0,
            35.0,
            true,
        ),
        truck(
            "TRK-006",
            "Deepak Joshi",
            "Surat",
            TruckStatus::Maintenance,
            12,
            TruckType::ContainerTruck,
            30_000.0,
            80.0,
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_four_unique_entries() {
        let catalog = containers();
        assert_eq!(catalog.len(), 4);
        for (i, a) in catalog.iter().enumerate() {
            assert!(a.dimensions.is_valid());
            for b in &catalog[i + 1..] {
                assert_ne!(a.key, b.key);
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn heaviest_entry_allows_28750_kg() {
        let max = containers()
            .iter()
            .map(|c| c.max_weight)
            .fold(0.0_f64, f64::max);
        assert_eq!(max, 28_750.0);
    }

    #[test]
    fn find_container_accepts_key_or_name() {
        assert_eq!(
            find_container("40ft-high-cube").map(|c| c.name.as_str()),
            Some("40ft High Cube Container")
        );
        assert_eq!(
            find_container("20ft standard container").map(|c| c.key.as_str()),
            Some("20ft-standard")
        );
        assert!(find_container("53ft-domestic").is_none());
    }

    #[test]
    fn lookup_product_is_case_insensitive() {
        let product = lookup_product(" glas-jar24 ").expect("catalog product missing");
        assert!(product.fragile);
        assert_eq!(product.dimensions, Dimensions::new(40.0, 30.0, 30.0));
        assert!(lookup_product("UNKNOWN").is_none());
    }

    #[test]
    fn standard_containers_never_list_box_trucks_or_tankers() {
        for name in ["20ft Standard Container", "40ft Standard Container"] {
            let tiers: Vec<_> = tier_one_truck_types(name)
                .iter()
                .chain(tier_two_truck_types(name))
                .collect();
            assert!(!tiers.contains(&&TruckType::BoxTruck));
            assert!(!tiers.contains(&&TruckType::Tanker));
        }
        assert_eq!(tier_one_truck_types(LCL_SHIPMENT), &[TruckType::BoxTruck]);
        assert!(tier_one_truck_types("Unknown").is_empty());
    }

    #[test]
    fn demo_fleet_is_relative_to_now() {
        let now = Utc::now();
        let fleet = demo_fleet(now);
        assert_eq!(fleet.len(), 6);
        assert_eq!(fleet[1].estimated_arrival, now + Duration::hours(4));
        assert_eq!(fleet[0].plate_number, "MH-04-001");
        assert!(fleet.iter().any(|t| !t.available_for_booking));
    }
}
