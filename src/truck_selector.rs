//! Truck selection for a planned container.
//!
//! Candidates are drawn from three pools in order of preference: truck types that
//! are a perfect match for the container, truck types that can carry it with
//! limitations, and any other bookable truck with enough capacity. Every candidate
//! is scored on compatibility, arrival time, capacity utilization and location.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::catalog;
use crate::container_selector::ContainerSelectionResult;
use crate::model::Truck;
use crate::types::{clamp_score, percent_of};

const MAX_ALTERNATIVES: usize = 3;
const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Location points lost per hour of travel to the origin.
const LOCATION_POINTS: f64 = 15.0;

/// Pickup time assumed when only a pickup date is given.
pub fn default_pickup_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// How well a truck type suits the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CompatibilityTier {
    PerfectMatch,
    Workable,
    CapacityOnly,
}

impl CompatibilityTier {
    pub fn points(self) -> f64 {
        match self {
            CompatibilityTier::PerfectMatch => 40.0,
            CompatibilityTier::Workable => 25.0,
            CompatibilityTier::CapacityOnly => 10.0,
        }
    }
}

/// Pickup parameters of a trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    /// City or facility where the container is picked up.
    pub origin: String,
    #[serde(default)]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default)]
    pub pickup_time: Option<NaiveTime>,
}

impl TripRequest {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            pickup_date: None,
            pickup_time: None,
        }
    }

    /// The requested pickup moment, if a date was given.
    pub fn pickup_at(&self) -> Option<DateTime<Utc>> {
        let date = self.pickup_date?;
        let time = self.pickup_time.unwrap_or_else(default_pickup_time);
        Some(date.and_time(time).and_utc())
    }
}

/// A scored truck candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruckOption {
    pub truck: Truck,
    /// 0 to 100.
    pub score: f64,
    pub reasoning: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub compatibility_issues: Vec<String>,
    pub tier: CompatibilityTier,
    /// Highest of weight and volume utilization of the truck, in percent.
    pub utilization: f64,
    /// Hours until the truck reaches the origin; 0 when it is already there.
    pub eta_hours: f64,
}

/// Outcome of truck selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TruckSelectionResult {
    /// `None` when no truck can take the cargo.
    pub recommended_truck: Option<TruckOption>,
    pub alternative_options: Vec<TruckOption>,
    pub total_trucks: usize,
    /// Trucks flagged bookable, whether or not they suit this cargo.
    pub available_trucks: usize,
}

/// Why a candidate dropped out during scoring.
#[derive(Debug)]
enum Disqualified {
    OverCapacity(f64),
}

/// Selects a truck for the recommended container of `containers`.
///
/// `now` is the reference time for arrival estimates.
pub fn select_truck(
    fleet: &[Truck],
    containers: &ContainerSelectionResult,
    trip: &TripRequest,
    now: DateTime<Utc>,
) -> TruckSelectionResult {
    let container_name = containers.recommended_option.container.name.as_str();
    let cargo = Cargo {
        weight: containers.total_weight,
        volume: containers.total_volume,
    };

    let mut options: Vec<TruckOption> = candidates(fleet, container_name, &cargo)
        .into_iter()
        .filter_map(|(truck, tier)| {
            match score_truck(truck, tier, container_name, &cargo, trip, now) {
                Ok(option) => Some(option),
                Err(Disqualified::OverCapacity(utilization)) => {
                    debug!(truck = %truck.id, utilization, "truck over capacity, skipped");
                    None
                }
            }
        })
        .collect();

    options.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranked = options.into_iter();
    let recommended_truck = ranked.next();
    let alternative_options: Vec<TruckOption> = ranked.take(MAX_ALTERNATIVES).collect();

    debug!(
        container = container_name,
        recommended = recommended_truck.as_ref().map(|o| o.truck.id.as_str()),
        alternatives = alternative_options.len(),
        "truck selection finished"
    );

    TruckSelectionResult {
        recommended_truck,
        alternative_options,
        total_trucks: fleet.len(),
        available_trucks: fleet.iter().filter(|t| t.available_for_booking).count(),
    }
}

struct Cargo {
    weight: f64,
    volume: f64,
}

/// Bookable trucks that can carry the cargo, each tagged with its best tier.
fn candidates<'a>(
    fleet: &'a [Truck],
    container_name: &str,
    cargo: &Cargo,
) -> Vec<(&'a Truck, CompatibilityTier)> {
    let eligible: Vec<&Truck> = fleet
        .iter()
        .filter(|t| t.available_for_booking && t.can_carry(cargo.weight, cargo.volume))
        .collect();

    let tier_one = catalog::tier_one_truck_types(container_name);
    let tier_two = catalog::tier_two_truck_types(container_name);
    let pools = [
        (CompatibilityTier::PerfectMatch, Some(tier_one)),
        (CompatibilityTier::Workable, Some(tier_two)),
        (CompatibilityTier::CapacityOnly, None),
    ];

    let mut seen = HashSet::new();
    let mut tagged = Vec::new();
    for (tier, types) in pools {
        for truck in &eligible {
            let in_pool = types.is_none_or(|types| types.contains(&truck.truck_type));
            if in_pool && seen.insert(truck.id.as_str()) {
                tagged.push((*truck, tier));
            }
        }
    }
    tagged
}

fn eta_hours(truck: &Truck, origin: &str, now: DateTime<Utc>) -> f64 {
    if truck.is_at(origin) {
        return 0.0;
    }
    let seconds = (truck.estimated_arrival - now).num_seconds();
    (seconds as f64 / SECONDS_PER_HOUR).max(0.0)
}

/// Availability factor.
///
/// The full 25 points go only to a truck already at the origin. A truck elsewhere
/// whose stored arrival is past has an ETA of 0 hours but still has to drive there,
/// so it scores in the 2-hour tier.
fn availability_points(at_origin: bool, eta: f64) -> f64 {
    if at_origin {
        25.0
    } else if eta <= 2.0 {
        20.0
    } else if eta <= 6.0 {
        15.0
    } else {
        5.0
    }
}

fn reasoning_label(score: f64) -> &'static str {
    if score >= 80.0 {
        "Excellent match"
    } else if score >= 60.0 {
        "Good option"
    } else if score >= 40.0 {
        "Acceptable with limitations"
    } else {
        "Poor match, consider alternatives"
    }
}

fn score_truck(
    truck: &Truck,
    tier: CompatibilityTier,
    container_name: &str,
    cargo: &Cargo,
    trip: &TripRequest,
    now: DateTime<Utc>,
) -> Result<TruckOption, Disqualified> {
    let mut pros = Vec::new();
    let mut cons = Vec::new();
    let mut compatibility_issues = Vec::new();

    let utilization = percent_of(cargo.weight, truck.capacity.max_weight)
        .max(percent_of(cargo.volume, truck.capacity.max_volume));
    if utilization > 100.0 {
        return Err(Disqualified::OverCapacity(utilization));
    }

    match tier {
        CompatibilityTier::PerfectMatch => {
            pros.push(format!("{} is built for a {}", truck.truck_type, container_name));
        }
        CompatibilityTier::Workable => {
            pros.push(format!(
                "{} can carry a {} with limitations",
                truck.truck_type, container_name
            ));
        }
        CompatibilityTier::CapacityOnly => {
            let caution = format!(
                "{} is not a standard carrier for a {}; manual approval needed",
                truck.truck_type, container_name
            );
            compatibility_issues.push(caution.clone());
            cons.push(caution);
        }
    }
    if truck.is_rated_for(container_name) {
        pros.push(format!("Operator-rated for {}", container_name));
    }

    let at_origin = truck.is_at(&trip.origin);
    let eta = eta_hours(truck, &trip.origin, now);
    let availability = availability_points(at_origin, eta);
    if at_origin {
        pros.push(format!("Already at {}", truck.current_location));
    } else if eta <= 2.0 {
        pros.push(format!("Arrives within {:.1} hours", eta));
    } else if eta > 6.0 {
        cons.push(format!("Long wait: arrives in {:.1} hours", eta));
    }

    let capacity = if (70.0..=90.0).contains(&utilization) {
        pros.push(format!("Optimal capacity utilization ({:.1}%)", utilization));
        20.0
    } else if utilization >= 50.0 {
        15.0
    } else {
        cons.push(format!(
            "Low capacity utilization ({:.1}%) may be costly",
            utilization
        ));
        10.0
    };

    let location = if at_origin {
        LOCATION_POINTS
    } else {
        cons.push(format!(
            "Currently in {}, {:.1} hours from {}",
            truck.current_location, eta, trip.origin
        ));
        (LOCATION_POINTS - eta).max(0.0)
    };

    if let Some(pickup) = trip.pickup_at() {
        let arrival = now + chrono::Duration::seconds((eta * SECONDS_PER_HOUR).round() as i64);
        if arrival > pickup {
            cons.push(format!(
                "Arrives after the requested pickup at {}",
                pickup.format("%Y-%m-%d %H:%M")
            ));
        }
    }

    let score = clamp_score(tier.points() + availability + capacity + location);
    let reasoning = format!(
        "{}: {} {} scores {:.0}/100 for a {}.",
        reasoning_label(score),
        truck.truck_type,
        truck.id,
        score,
        container_name
    );

    Ok(TruckOption {
        truck: truck.clone(),
        score,
        reasoning,
        pros,
        cons,
        compatibility_issues,
        tier,
        utilization,
        eta_hours: eta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container_selector::select_container;
    use crate::model::{Product, TruckCapacity, TruckStatus, TruckType};
    use crate::types::Dimensions;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    fn perfect_fit_selection() -> ContainerSelectionResult {
        let products = vec![Product {
            id: "p1".into(),
            product_code: "GLAS-JAR24".into(),
            cartons: 100,
            dimensions: Dimensions::new(40.0, 30.0, 30.0),
            weight_per_carton: 10.0,
            fragile: false,
        }];
        select_container(&products)
    }

    fn truck(id: &str, truck_type: TruckType, location: &str, eta_hours: i64) -> Truck {
        Truck {
            id: id.to_string(),
            driver_name: "Driver".into(),
            driver_contact: "+91-00000-00000".into(),
            current_location: location.to_string(),
            destination: None,
            status: TruckStatus::Available,
            estimated_arrival: now() + Duration::hours(eta_hours),
            capacity: TruckCapacity {
                max_weight: 30_000.0,
                max_volume: 80.0,
                compatible_containers: None,
            },
            truck_type,
            last_updated: now(),
            plate_number: format!("MH-01-{}", id),
            available_for_booking: true,
        }
    }

    #[test]
    fn falls_back_to_any_truck_with_capacity() {
        let selection = perfect_fit_selection();
        assert_eq!(
            selection.recommended_option.container.name,
            "20ft Standard Container"
        );
        let fleet = vec![
            truck("BOX-1", TruckType::BoxTruck, "Mumbai", 0),
            truck("TNK-1", TruckType::Tanker, "Pune", 3),
        ];
        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());

        let recommended = result.recommended_truck.expect("a truck should be proposed");
        assert_eq!(recommended.truck.truck_type, TruckType::BoxTruck);
        assert_eq!(recommended.tier, CompatibilityTier::CapacityOnly);
        // 10 compatibility + 25 availability + 10 utilization + 15 location
        assert!((recommended.score - 60.0).abs() < 1e-9);
        assert!(recommended.reasoning.starts_with("Good option"));
        assert!(
            recommended
                .compatibility_issues
                .iter()
                .any(|i| i.contains("manual approval"))
        );

        assert_eq!(result.alternative_options.len(), 1);
        let tanker = &result.alternative_options[0];
        assert_eq!(tanker.truck.id, "TNK-1");
        assert!((tanker.eta_hours - 3.0).abs() < 1e-9);
        // 10 + 15 + 10 + (15 - 3)
        assert!((tanker.score - 47.0).abs() < 1e-9);
    }

    #[test]
    fn no_viable_truck_yields_no_recommendation() {
        let selection = perfect_fit_selection();
        let mut small = truck("SMALL", TruckType::ContainerTruck, "Mumbai", 0);
        small.capacity.max_volume = 2.0;
        let mut booked = truck("BOOKED", TruckType::ContainerTruck, "Mumbai", 0);
        booked.available_for_booking = false;
        let fleet = vec![small, booked];

        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());
        assert!(result.recommended_truck.is_none());
        assert!(result.alternative_options.is_empty());
        assert_eq!(result.total_trucks, 2);
        assert_eq!(result.available_trucks, 1);
    }

    #[test]
    fn tiers_take_precedence_and_trucks_appear_once() {
        let selection = perfect_fit_selection();
        let fleet = vec![
            truck("FLAT-1", TruckType::Flatbed, "Mumbai", 0),
            truck("CT-1", TruckType::ContainerTruck, "Mumbai", 0),
            truck("BOX-1", TruckType::BoxTruck, "Mumbai", 0),
        ];
        let cargo = Cargo {
            weight: selection.total_weight,
            volume: selection.total_volume,
        };
        let tagged = candidates(&fleet, "20ft Standard Container", &cargo);
        let tiers: Vec<(&str, CompatibilityTier)> = tagged
            .iter()
            .map(|(t, tier)| (t.id.as_str(), *tier))
            .collect();
        assert_eq!(
            tiers,
            vec![
                ("CT-1", CompatibilityTier::PerfectMatch),
                ("FLAT-1", CompatibilityTier::Workable),
                ("BOX-1", CompatibilityTier::CapacityOnly),
            ]
        );

        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());
        assert_eq!(result.recommended_truck.unwrap().truck.id, "CT-1");
        let ids: Vec<&str> = result
            .alternative_options
            .iter()
            .map(|o| o.truck.id.as_str())
            .collect();
        assert_eq!(ids, vec!["FLAT-1", "BOX-1"]);
    }

    #[test]
    fn truck_at_origin_ignores_stored_arrival() {
        let selection = perfect_fit_selection();
        let fleet = vec![truck("CT-1", TruckType::ContainerTruck, " mumbai ", 8)];
        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());
        let option = result.recommended_truck.unwrap();
        assert_eq!(option.eta_hours, 0.0);
        // 40 + 25 + 10 + 15
        assert!((option.score - 90.0).abs() < 1e-9);
        assert!(option.reasoning.starts_with("Excellent match"));
    }

    #[test]
    fn past_arrival_counts_as_zero_hours() {
        let selection = perfect_fit_selection();
        let fleet = vec![truck("CT-1", TruckType::ContainerTruck, "Pune", -5)];
        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());
        let option = result.recommended_truck.unwrap();
        assert_eq!(option.eta_hours, 0.0);
        // 40 + 20 + 10 + 15, with a note about the current location
        assert!((option.score - 85.0).abs() < 1e-9);
        assert!(option.cons.iter().any(|c| c.contains("Pune")));
    }

    #[test]
    fn utilization_sweet_spot_scores_highest() {
        let selection = perfect_fit_selection();
        let mut snug = truck("SNUG", TruckType::ContainerTruck, "Mumbai", 0);
        // 3.6 m³ of 4.5 m³ is 80%
        snug.capacity.max_volume = 4.5;
        let mut half = truck("HALF", TruckType::ContainerTruck, "Mumbai", 0);
        // 1000 kg of 1600 kg is 62.5%
        half.capacity.max_weight = 1_600.0;
        let fleet = vec![half, snug];

        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());
        let best = result.recommended_truck.unwrap();
        assert_eq!(best.truck.id, "SNUG");
        assert!((best.utilization - 80.0).abs() < 1e-9);
        assert!((best.score - 100.0).abs() < 1e-9);
        assert!((result.alternative_options[0].score - 95.0).abs() < 1e-9);
    }

    #[test]
    fn late_arrival_gets_pickup_con() {
        let selection = perfect_fit_selection();
        let fleet = vec![truck("CT-1", TruckType::ContainerTruck, "Pune", 5)];
        let trip = TripRequest {
            origin: "Mumbai".into(),
            pickup_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            pickup_time: None,
        };
        // now is 06:00, the truck arrives at 11:00, pickup defaults to 09:00
        let result = select_truck(&fleet, &selection, &trip, now());
        let option = result.recommended_truck.unwrap();
        assert!(option.cons.iter().any(|c| c.contains("after the requested pickup")));

        let relaxed = TripRequest {
            pickup_time: NaiveTime::from_hms_opt(12, 0, 0),
            ..trip
        };
        let result = select_truck(&fleet, &selection, &relaxed, now());
        let option = result.recommended_truck.unwrap();
        assert!(!option.cons.iter().any(|c| c.contains("after the requested pickup")));
    }

    #[test]
    fn at_most_three_alternatives_and_scores_are_bounded() {
        let selection = perfect_fit_selection();
        let fleet: Vec<Truck> = (0..6)
            .map(|i| truck(&format!("CT-{}", i), TruckType::ContainerTruck, "Pune", i * 4))
            .collect();
        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());

        assert!(result.recommended_truck.is_some());
        assert_eq!(result.alternative_options.len(), 3);
        let scores: Vec<f64> = result
            .recommended_truck
            .iter()
            .chain(result.alternative_options.iter())
            .map(|o| o.score)
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert!(scores.iter().all(|s| (0.0..=100.0).contains(s)));
    }

    #[test]
    fn rated_container_is_listed_as_pro() {
        let selection = perfect_fit_selection();
        let mut rated = truck("CT-1", TruckType::ContainerTruck, "Mumbai", 0);
        rated.capacity.compatible_containers = Some(vec!["20ft Standard Container".into()]);
        let result = select_truck(&[rated], &selection, &TripRequest::new("Mumbai"), now());
        let option = result.recommended_truck.unwrap();
        assert!(option.pros.iter().any(|p| p.starts_with("Operator-rated")));
    }

    #[test]
    fn demo_fleet_prefers_container_truck_at_origin() {
        let selection = perfect_fit_selection();
        let fleet = catalog::demo_fleet(now());
        let result = select_truck(&fleet, &selection, &TripRequest::new("Mumbai"), now());
        assert_eq!(result.recommended_truck.unwrap().truck.id, "TRK-001");
        assert_eq!(result.total_trucks, 6);
        assert_eq!(result.available_trucks, 5);
    }
}
