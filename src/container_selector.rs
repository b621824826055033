//! Container type selection.
//!
//! Scores every catalog entry against the aggregate cargo volume and weight and
//! recommends the best feasible one. When nothing fits, the largest container is
//! still recommended so the later planning stages always have a target.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::catalog;
use crate::model::{ContainerSpec, Product, plannable};
use crate::types::{EPSILON_GENERAL, clamp_score, percent_of};

/// Weight of the utilization part of the overall score.
const UTILIZATION_WEIGHT: f64 = 0.7;
/// Weight of the cost part of the overall score.
const COST_WEIGHT: f64 = 0.3;
/// Points the most expensive entry loses on the cost score.
const COST_PENALTY_BAND: f64 = 30.0;

const EXCELLENT_UTILIZATION: f64 = 85.0;
const GOOD_UTILIZATION: f64 = 60.0;
const LOW_COST: f64 = 2_000.0;
const HIGH_COST: f64 = 3_000.0;

/// A scored catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOption {
    pub container: ContainerSpec,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    pub cost_per_cubic_meter: f64,
    pub cost_per_kg: f64,
    /// 0 to 100; always 0 when the cargo does not fit.
    pub overall_score: f64,
    pub reasoning: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub can_fit: bool,
}

/// Outcome of container selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSelectionResult {
    pub recommended_option: ContainerOption,
    /// Every catalog entry, best score first.
    pub all_options: Vec<ContainerOption>,
    /// m³
    pub total_volume: f64,
    /// kg
    pub total_weight: f64,
    pub cheapest_option: Option<ContainerOption>,
    pub most_spacious_option: Option<ContainerOption>,
    pub most_efficient_option: Option<ContainerOption>,
}

impl ContainerSelectionResult {
    /// Returns a copy whose recommendation is the option for `spec`.
    ///
    /// Used when the caller overrides the recommended container.
    pub fn with_recommendation(&self, spec: &ContainerSpec) -> Self {
        let mut result = self.clone();
        if let Some(option) = self.all_options.iter().find(|o| o.container.key == spec.key) {
            result.recommended_option = option.clone();
        }
        result
    }
}

/// Aggregate volume (m³) and weight (kg) of the plannable products.
pub fn cargo_totals(products: &[Product]) -> (f64, f64) {
    plannable(products).fold((0.0, 0.0), |(volume, weight), p| {
        (volume + p.total_volume_m3(), weight + p.total_weight())
    })
}

/// Selects a container from the built-in catalog.
///
/// # Examples
/// ```
/// use load_planner::container_selector::select_container;
/// use load_planner::model::Product;
/// use load_planner::types::Dimensions;
///
/// let products = vec![
///     Product::new("p1", "JARS", 100, Dimensions::new(40.0, 30.0, 30.0), 10.0, false).unwrap(),
/// ];
/// let result = select_container(&products);
/// assert!(result.recommended_option.can_fit);
/// assert_eq!(result.recommended_option.container.key, "20ft-standard");
/// ```
pub fn select_container(products: &[Product]) -> ContainerSelectionResult {
    select_container_from(products, catalog::containers())
        .expect("built-in container catalog is never empty")
}

/// Selects a container from `catalog`. Returns `None` only for an empty catalog.
pub fn select_container_from(
    products: &[Product],
    catalog: &[ContainerSpec],
) -> Option<ContainerSelectionResult> {
    let (total_volume, total_weight) = cargo_totals(products);
    let cost_range = CostRange::of(catalog)?;

    let options: Vec<ContainerOption> = catalog
        .iter()
        .map(|spec| assess(spec, total_volume, total_weight, &cost_range))
        .collect();

    let feasible: Vec<&ContainerOption> = options.iter().filter(|o| o.can_fit).collect();
    let cheapest_option = best_by(&feasible, |a, b| b.container.cost.partial_cmp(&a.container.cost));
    let most_spacious_option = best_by(&feasible, |a, b| {
        a.volume_utilization.partial_cmp(&b.volume_utilization)
    });
    let most_efficient_option =
        best_by(&feasible, |a, b| a.overall_score.partial_cmp(&b.overall_score));

    let mut all_options = options.clone();
    all_options.sort_by(|a, b| {
        b.overall_score
            .partial_cmp(&a.overall_score)
            .unwrap_or(Ordering::Equal)
    });

    let recommended_option = match all_options.iter().find(|o| o.can_fit) {
        Some(best) => best.clone(),
        None => oversized_fallback(&options, total_volume, total_weight)?,
    };

    debug!(
        container = %recommended_option.container.name,
        score = recommended_option.overall_score,
        feasible = feasible.len(),
        "container selected"
    );

    Some(ContainerSelectionResult {
        recommended_option,
        all_options,
        total_volume,
        total_weight,
        cheapest_option,
        most_spacious_option,
        most_efficient_option,
    })
}

/// Cheapest and most expensive entry of a catalog.
struct CostRange {
    min: f64,
    max: f64,
}

impl CostRange {
    fn of(catalog: &[ContainerSpec]) -> Option<Self> {
        let first = catalog.first()?;
        Some(catalog.iter().fold(
            Self {
                min: first.cost,
                max: first.cost,
            },
            |range, spec| Self {
                min: range.min.min(spec.cost),
                max: range.max.max(spec.cost),
            },
        ))
    }

    /// 100 for the cheapest entry down to 70 for the most expensive one.
    fn score(&self, cost: f64) -> f64 {
        let span = self.max - self.min;
        if span <= EPSILON_GENERAL {
            return 100.0;
        }
        100.0 - ((cost - self.min) / span) * COST_PENALTY_BAND
    }
}

/// First option that no later option beats under `better`.
fn best_by(
    options: &[&ContainerOption],
    better: impl Fn(&ContainerOption, &ContainerOption) -> Option<Ordering>,
) -> Option<ContainerOption> {
    let mut best: Option<&ContainerOption> = None;
    for &option in options {
        match best {
            None => best = Some(option),
            Some(current) => {
                if better(option, current) == Some(Ordering::Greater) {
                    best = Some(option);
                }
            }
        }
    }
    best.cloned()
}

fn assess(
    spec: &ContainerSpec,
    total_volume: f64,
    total_weight: f64,
    cost_range: &CostRange,
) -> ContainerOption {
    let volume_utilization = percent_of(total_volume, spec.max_volume);
    let weight_utilization = percent_of(total_weight, spec.max_weight);
    let volume_exceeded = total_volume > spec.max_volume + EPSILON_GENERAL;
    let weight_exceeded = total_weight > spec.max_weight + EPSILON_GENERAL;
    let can_fit = !volume_exceeded && !weight_exceeded;

    let mut pros = Vec::new();
    let mut cons = Vec::new();

    let (overall_score, reasoning) = if can_fit {
        let utilization = (volume_utilization.min(100.0) + weight_utilization.min(100.0)) / 2.0;
        let score = clamp_score(
            UTILIZATION_WEIGHT * utilization + COST_WEIGHT * cost_range.score(spec.cost),
        );

        if volume_utilization > EXCELLENT_UTILIZATION {
            pros.push(format!(
                "Excellent space utilization ({:.1}%)",
                volume_utilization
            ));
        } else if volume_utilization >= GOOD_UTILIZATION {
            pros.push(format!("Good space utilization ({:.1}%)", volume_utilization));
        } else {
            cons.push(format!(
                "Underutilized: only {:.1}% of the volume is used",
                volume_utilization
            ));
        }

        let reasoning = format!(
            "{} uses {:.1}% of its volume and {:.1}% of its weight capacity at a cost of {:.0}.",
            spec.name, volume_utilization, weight_utilization, spec.cost
        );
        (score, reasoning)
    } else {
        if volume_exceeded {
            cons.push(format!(
                "Cargo volume exceeds capacity by {:.2} m³",
                total_volume - spec.max_volume
            ));
        }
        if weight_exceeded {
            cons.push(format!(
                "Cargo weight exceeds capacity by {:.0} kg",
                total_weight - spec.max_weight
            ));
        }
        let limits = match (volume_exceeded, weight_exceeded) {
            (true, true) => "volume and weight limits",
            (true, false) => "volume limit",
            _ => "weight limit",
        };
        (
            0.0,
            format!("Cannot fit: cargo exceeds the {} of {}.", limits, spec.name),
        )
    };

    if spec.cost <= LOW_COST {
        pros.push("Cost-effective option".to_string());
    } else if spec.cost >= HIGH_COST {
        cons.push("Higher cost".to_string());
    }
    if spec.is_high_cube() {
        pros.push("Extra height for tall cargo".to_string());
    }
    if spec.is_forty_foot() {
        pros.push("More floor space for bulky loads".to_string());
    } else {
        pros.push("Easier handling and port access".to_string());
    }
    if spec.is_refrigerated() {
        pros.push("Temperature-controlled interior".to_string());
    }

    ContainerOption {
        container: spec.clone(),
        volume_utilization,
        weight_utilization,
        cost_per_cubic_meter: spec.cost / spec.max_volume,
        cost_per_kg: spec.cost / spec.max_weight,
        overall_score,
        reasoning,
        pros,
        cons,
        can_fit,
    }
}

/// The largest-capacity option, relabelled as a best-effort recommendation.
fn oversized_fallback(
    options: &[ContainerOption],
    total_volume: f64,
    total_weight: f64,
) -> Option<ContainerOption> {
    let largest = options.iter().fold(None::<&ContainerOption>, |best, option| match best {
        Some(current) if current.container.max_volume >= option.container.max_volume => {
            Some(current)
        }
        _ => Some(option),
    })?;

    let mut fallback = largest.clone();
    fallback.reasoning = format!(
        "Cargo ({:.2} m³, {:.0} kg) exceeds all standard containers. \
         Recommending the largest available, {}; split the shipment across several containers.",
        total_volume, total_weight, largest.container.name
    );
    Some(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::place;
    use crate::types::Dimensions;

    fn cartons(id: &str, count: u32, dims: (f64, f64, f64), weight: f64) -> Product {
        Product {
            id: id.to_string(),
            product_code: id.to_uppercase(),
            cartons: count,
            dimensions: Dimensions::new(dims.0, dims.1, dims.2),
            weight_per_carton: weight,
            fragile: false,
        }
    }

    fn option<'a>(result: &'a ContainerSelectionResult, key: &str) -> &'a ContainerOption {
        result
            .all_options
            .iter()
            .find(|o| o.container.key == key)
            .expect("catalog option missing")
    }

    #[test]
    fn perfect_fit_recommends_twenty_foot_standard() {
        let products = vec![cartons("p1", 100, (40.0, 30.0, 30.0), 10.0)];
        let result = select_container(&products);

        assert!((result.total_volume - 3.6).abs() < 1e-9);
        assert!((result.total_weight - 1000.0).abs() < 1e-9);

        let recommended = &result.recommended_option;
        assert_eq!(recommended.container.name, "20ft Standard Container");
        assert!(recommended.can_fit);
        assert!((recommended.weight_utilization - 3.54).abs() < 0.01);
        assert!((recommended.volume_utilization - 10.84).abs() < 0.01);

        // 0.7 * avg(10.84, 3.54) + 0.3 * 100
        let expected = 0.7 * ((3.6 / 33.2 * 100.0 + 1000.0 / 28_230.0 * 100.0) / 2.0) + 30.0;
        assert!((recommended.overall_score - expected).abs() < 1e-9);
        assert!(recommended.pros.iter().any(|p| p == "Cost-effective option"));
        assert!(recommended.cons.iter().any(|c| c.starts_with("Underutilized")));
    }

    #[test]
    fn ranked_list_is_sorted_and_complete() {
        let products = vec![cartons("p1", 100, (40.0, 30.0, 30.0), 10.0)];
        let result = select_container(&products);

        assert_eq!(result.all_options.len(), catalog::containers().len());
        for pair in result.all_options.windows(2) {
            assert!(pair[0].overall_score >= pair[1].overall_score);
        }
        assert_eq!(result.all_options[0], result.recommended_option);
    }

    #[test]
    fn cost_score_spans_thirty_points() {
        let products = vec![cartons("p1", 1, (10.0, 10.0, 10.0), 1.0)];
        let result = select_container(&products);

        // utilization is negligible, so the score is driven by cost
        let cheapest = option(&result, "20ft-standard");
        let priciest = option(&result, "20ft-refrigerated");
        assert!((cheapest.overall_score - 30.0).abs() < 0.01);
        assert!((priciest.overall_score - 21.0).abs() < 0.01);
    }

    #[test]
    fn oversized_cargo_falls_back_to_largest_container() {
        let products = vec![cartons("steel", 50, (50.0, 50.0, 50.0), 1_000.0)];
        let result = select_container(&products);

        assert!(result.all_options.iter().all(|o| !o.can_fit));
        assert!(result.all_options.iter().all(|o| o.overall_score == 0.0));
        let recommended = &result.recommended_option;
        assert_eq!(recommended.container.name, "40ft High Cube Container");
        assert!(!recommended.can_fit);
        assert!(recommended.reasoning.contains("exceeds all standard containers"));
        assert!(result.cheapest_option.is_none());
        assert!(result.most_spacious_option.is_none());
        assert!(result.most_efficient_option.is_none());
    }

    #[test]
    fn infeasible_reasoning_names_the_exceeded_limit() {
        // 40 m³ and 10 t: too big for the 20ft boxes, fine for the 40ft ones
        let products = vec![cartons("bulk", 40, (100.0, 100.0, 100.0), 250.0)];
        let result = select_container(&products);

        let twenty = option(&result, "20ft-standard");
        assert!(!twenty.can_fit);
        assert!(twenty.reasoning.contains("volume limit"));
        assert!(!twenty.reasoning.contains("weight"));
        assert!(twenty.cons.iter().any(|c| c.contains("volume exceeds")));

        assert!(result.recommended_option.can_fit);
        assert!(result.recommended_option.container.is_forty_foot());
    }

    #[test]
    fn can_fit_matches_both_limits() {
        let products = vec![cartons("dense", 30, (50.0, 50.0, 50.0), 900.0)];
        let result = select_container(&products);
        for option in &result.all_options {
            let fits = result.total_volume <= option.container.max_volume
                && result.total_weight <= option.container.max_weight;
            assert_eq!(option.can_fit, fits, "{}", option.container.name);
        }
        // 27 t fits the 20ft standard and the high cube but not the 40ft standard
        assert!(!option(&result, "40ft-standard").can_fit);
        assert!(option(&result, "40ft-high-cube").can_fit);
    }

    #[test]
    fn named_bests_consider_only_feasible_options() {
        let products = vec![cartons("p1", 100, (40.0, 30.0, 30.0), 10.0)];
        let result = select_container(&products);

        assert_eq!(
            result.cheapest_option.as_ref().map(|o| o.container.key.as_str()),
            Some("20ft-standard")
        );
        // the smallest box is the fullest
        assert_eq!(
            result
                .most_spacious_option
                .as_ref()
                .map(|o| o.container.key.as_str()),
            Some("20ft-refrigerated")
        );
        assert_eq!(
            result.most_efficient_option.as_ref(),
            Some(&result.recommended_option)
        );
    }

    #[test]
    fn ties_keep_catalog_order() {
        let twin = |key: &str| ContainerSpec {
            key: key.to_string(),
            name: key.to_string(),
            max_volume: 10.0,
            max_weight: 1_000.0,
            cost: 500.0,
            dimensions: Dimensions::new(2.0, 2.0, 2.5),
        };
        let catalog = vec![twin("a"), twin("b")];
        let products = vec![cartons("p1", 1, (10.0, 10.0, 10.0), 1.0)];
        let result = select_container_from(&products, &catalog).unwrap();

        assert_eq!(result.recommended_option.container.key, "a");
        assert_eq!(result.cheapest_option.unwrap().container.key, "a");
        assert_eq!(result.most_spacious_option.unwrap().container.key, "a");
        assert_eq!(result.most_efficient_option.unwrap().container.key, "a");
        assert!(select_container_from(&products, &[]).is_none());
    }

    #[test]
    fn selection_is_idempotent_and_scores_are_bounded() {
        let products = vec![
            cartons("a", 120, (60.0, 40.0, 40.0), 18.0),
            cartons("b", 300, (30.0, 20.0, 20.0), 3.5),
        ];
        let first = select_container(&products);
        let second = select_container(&products);
        assert_eq!(first, second);
        for option in &first.all_options {
            assert!((0.0..=100.0).contains(&option.overall_score));
        }
    }

    #[test]
    fn pros_describe_container_shape() {
        let products = vec![cartons("p1", 1, (10.0, 10.0, 10.0), 1.0)];
        let result = select_container(&products);

        let high_cube = option(&result, "40ft-high-cube");
        assert!(high_cube.pros.iter().any(|p| p.contains("Extra height")));
        assert!(high_cube.pros.iter().any(|p| p.contains("floor space")));
        let reefer = option(&result, "20ft-refrigerated");
        assert!(reefer.pros.iter().any(|p| p.contains("Easier handling")));
        assert!(reefer.cons.iter().any(|c| c == "Higher cost"));
    }

    #[test]
    fn override_replaces_the_recommendation() {
        let products = vec![cartons("p1", 100, (40.0, 30.0, 30.0), 10.0)];
        let result = select_container(&products);
        let high_cube = catalog::find_container("40ft-high-cube").unwrap();
        let overridden = result.with_recommendation(high_cube);
        assert_eq!(overridden.recommended_option.container.key, "40ft-high-cube");
        assert_eq!(overridden.all_options, result.all_options);
    }

    #[test]
    fn every_fitting_container_takes_the_whole_load() {
        // APPL-WM07 washing machines: 85 cm does not line up with the 10 cm grid
        let products = vec![cartons("APPL-WM07", 50, (60.0, 60.0, 85.0), 70.0)];
        let result = select_container(&products);

        let fitting: Vec<&ContainerOption> =
            result.all_options.iter().filter(|o| o.can_fit).collect();
        assert_eq!(fitting.len(), 4);
        for option in fitting {
            let placement = place(&option.container.placement_dims(), &products);
            assert!(
                placement.is_complete(),
                "{} left {} cartons",
                option.container.key,
                placement.unplaced_cartons
            );
        }
    }
}
