//! HTTP surface of the load planner.
//!
//! JSON endpoints for the three planning stages and the whole pipeline, a
//! Server-Sent Events stream for live placement, read-only catalog endpoints and the
//! OpenAPI document with a Swagger UI page.

use std::sync::OnceLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::catalog::{self, CatalogProduct};
use crate::config::{ApiConfig, PlannerConfig};
use crate::container_selector::{ContainerOption, ContainerSelectionResult, select_container};
use crate::model::{
    ContainerSpec, PlacedCarton, Product, Truck, TruckCapacity, TruckStatus, TruckType,
    ValidationError, validate_products,
};
use crate::placement::{
    PlacementConfig, PlacementResult, UnplacedCarton, place_with_config, place_with_progress,
    requested_carton_count,
};
use crate::planner::{self, PlanRequest, PlanResult, choose_container};
use crate::truck_selector::{
    CompatibilityTier, TripRequest, TruckOption, TruckSelectionResult, select_truck,
};
use crate::types::{Dimensions, Vec3};

#[derive(Clone)]
struct ApiState {
    planner_config: PlannerConfig,
}

impl ApiState {
    /// Placement settings with an optional per-request rotation switch.
    fn placement_config(&self, allow_rotation: Option<bool>) -> PlacementConfig {
        let mut config = self.planner_config.placement_config();
        if let Some(allow) = allow_rotation {
            config.allow_rotation = allow;
        }
        config
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// Subresource integrity hashes of swagger-ui-dist 5.17.14.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>Load Planner API</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis],
                });
            };
        </script>
    </body>
</html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// A product line as entered by the user.
///
/// Dimensions, weight and fragility may be omitted for codes from the product
/// catalog; they are then filled in from there.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({ "productCode": "GLAS-JAR24", "cartons": 100 }))]
pub struct ProductRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub cartons: u32,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub weight_per_carton: Option<f64>,
    #[serde(default)]
    pub fragile: Option<bool>,
}

impl ProductRequest {
    fn is_plannable(&self) -> bool {
        !self.product_code.trim().is_empty() && self.cartons > 0
    }

    fn into_product(self, index: usize) -> Result<Product, ValidationError> {
        let known = catalog::lookup_product(&self.product_code);
        let (dimensions, weight_per_carton) = match (self.dimensions, self.weight_per_carton, known)
        {
            (Some(dims), Some(weight), _) => (dims, weight),
            (dims, weight, Some(entry)) => (
                dims.unwrap_or(entry.dimensions),
                weight.unwrap_or(entry.weight_per_carton),
            ),
            (_, _, None) => return Err(ValidationError::UnknownProductCode(self.product_code)),
        };
        let fragile = self
            .fragile
            .or(known.map(|entry| entry.fragile))
            .unwrap_or(false);

        Ok(Product {
            id: self.id.unwrap_or_else(|| format!("p{}", index + 1)),
            product_code: self.product_code.trim().to_string(),
            cartons: self.cartons,
            dimensions,
            weight_per_carton,
            fragile,
        })
    }
}

/// Converts request lines into validated products; lines without a code or
/// without cartons are dropped.
fn into_products(requests: Vec<ProductRequest>) -> Result<Vec<Product>, ValidationError> {
    let products = requests
        .into_iter()
        .enumerate()
        .filter(|(_, request)| request.is_plannable())
        .map(|(index, request)| request.into_product(index))
        .collect::<Result<Vec<_>, _>>()?;
    validate_products(&products)?;
    Ok(products)
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSelectRequest {
    pub products: Vec<ProductRequest>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "products": [{ "productCode": "GLAS-JAR24", "cartons": 100 }],
    "containerKey": "20ft-standard",
    "allowRotation": true
}))]
pub struct PlacementRequest {
    pub products: Vec<ProductRequest>,
    /// Catalog key or name; the recommended container is used when omitted.
    #[serde(default)]
    #[schema(nullable = true)]
    pub container_key: Option<String>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
}

/// Body of `/trucks/select` and `/plan`.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "products": [{ "productCode": "GLAS-JAR24", "cartons": 100 }],
    "origin": "Mumbai",
    "pickupDate": "2026-03-02",
    "pickupTime": "09:00:00"
}))]
pub struct ShipmentRequest {
    pub products: Vec<ProductRequest>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub container_key: Option<String>,
    /// Fleet snapshot; the demo fleet is used when omitted.
    #[serde(default)]
    #[schema(nullable = true)]
    pub fleet: Option<Vec<Truck>>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    #[schema(nullable = true)]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub pickup_time: Option<NaiveTime>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
}

impl ShipmentRequest {
    fn into_plan_request(
        self,
        now: chrono::DateTime<Utc>,
    ) -> Result<(PlanRequest, Option<bool>), ValidationError> {
        let products = into_products(self.products)?;
        let origin = self.origin.trim();
        if origin.is_empty() {
            return Err(ValidationError::MissingOrigin);
        }
        let request = PlanRequest {
            products,
            container_key: self.container_key,
            fleet: self.fleet.unwrap_or_else(|| catalog::demo_fleet(now)),
            trip: TripRequest {
                origin: origin.to_string(),
                pickup_date: self.pickup_date,
                pickup_time: self.pickup_time,
            },
        };
        Ok((request, self.allow_rotation))
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    let body = ErrorResponse {
        error: error.into(),
        details: details.into(),
    };
    (status, Json(body)).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.body_text(),
    )
}

fn validation_error(err: ValidationError) -> Response {
    let error = match err {
        ValidationError::UnknownContainer(_) => "Invalid container selection",
        ValidationError::MissingOrigin => "Invalid trip data",
        _ => "Invalid product data",
    };
    warn!(error = %err, "request rejected");
    error_response(StatusCode::UNPROCESSABLE_ENTITY, error, err.to_string())
}

/// Runs a placement job on the blocking pool so the async workers stay responsive.
async fn run_blocking<T, F>(job: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|err| {
        error!(error = %err, "planning task failed");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Planning failed",
            err.to_string(),
        )
    })
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(body)| body)
        .map_err(json_deserialize_error)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_catalog_containers,
        handle_catalog_products,
        handle_catalog_fleet,
        handle_container_select,
        handle_placement,
        handle_placement_stream,
        handle_truck_select,
        handle_plan
    ),
    components(
        schemas(
            ProductRequest,
            ContainerSelectRequest,
            PlacementRequest,
            ShipmentRequest,
            ErrorResponse,
            CatalogProduct,
            ContainerSpec,
            ContainerOption,
            ContainerSelectionResult,
            PlacementResult,
            PlacedCarton,
            UnplacedCarton,
            Truck,
            TruckCapacity,
            TruckStatus,
            TruckType,
            TruckOption,
            TruckSelectionResult,
            CompatibilityTier,
            PlanResult,
            Dimensions,
            Vec3
        )
    ),
    tags(
        (name = "catalog", description = "Reference data"),
        (name = "planning", description = "Container, placement and truck planning")
    )
)]
struct ApiDoc;

/// Builds the application router.
fn router(planner_config: PlannerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/catalog/containers", get(handle_catalog_containers))
        .route("/catalog/products", get(handle_catalog_products))
        .route("/catalog/fleet", get(handle_catalog_fleet))
        .route("/containers/select", post(handle_container_select))
        .route("/placement", post(handle_placement))
        .route("/placement_stream", post(handle_placement_stream))
        .route("/trucks/select", post(handle_truck_select))
        .route("/plan", post(handle_plan))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { planner_config })
}

/// Binds the listener and serves requests until the server stops.
///
/// Returns an error when the listener cannot be bound.
pub async fn start_api_server(
    config: ApiConfig,
    planner_config: PlannerConfig,
) -> std::io::Result<()> {
    let app = router(planner_config);
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "load planner listening on http://{}:{}",
        config.display_host(),
        config.port()
    );
    info!(
        "API docs at http://{}:{}/docs",
        config.browse_host(),
        config.port()
    );

    axum::serve(listener, app).await
}

/// Container catalog in canonical order.
#[utoipa::path(
    get,
    path = "/catalog/containers",
    responses((status = 200, description = "Container catalog", body = Vec<ContainerSpec>)),
    tag = "catalog"
)]
async fn handle_catalog_containers() -> impl IntoResponse {
    Json(catalog::containers())
}

/// Products that can be referenced by code alone.
#[utoipa::path(
    get,
    path = "/catalog/products",
    responses((status = 200, description = "Product catalog", body = Vec<CatalogProduct>)),
    tag = "catalog"
)]
async fn handle_catalog_products() -> impl IntoResponse {
    Json(catalog::products())
}

/// Demo fleet snapshot with arrival times relative to now.
#[utoipa::path(
    get,
    path = "/catalog/fleet",
    responses((status = 200, description = "Demo fleet", body = Vec<Truck>)),
    tag = "catalog"
)]
async fn handle_catalog_fleet() -> impl IntoResponse {
    Json(catalog::demo_fleet(Utc::now()))
}

/// Scores every catalog container against the cargo.
#[utoipa::path(
    post,
    path = "/containers/select",
    request_body = ContainerSelectRequest,
    responses(
        (status = 200, description = "Ranked container options", body = ContainerSelectionResult),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid products", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_container_select(
    payload: Result<Json<ContainerSelectRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let products = match into_products(request.products) {
        Ok(products) => products,
        Err(err) => return validation_error(err),
    };

    let result = select_container(&products);
    info!(
        products = products.len(),
        container = %result.recommended_option.container.name,
        can_fit = result.recommended_option.can_fit,
        "container selection"
    );
    Json(result).into_response()
}

/// Shared preparation of the placement endpoints.
fn prepare_placement(
    state: &ApiState,
    request: PlacementRequest,
) -> Result<(ContainerSpec, Vec<Product>, PlacementConfig), ValidationError> {
    let products = into_products(request.products)?;
    let selection = choose_container(&products, request.container_key.as_deref())?;
    let config = state.placement_config(request.allow_rotation);
    Ok((selection.recommended_option.container, products, config))
}

/// Places the cartons into the recommended or requested container.
#[utoipa::path(
    post,
    path = "/placement",
    request_body = PlacementRequest,
    responses(
        (status = 200, description = "Carton placement", body = PlacementResult),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid products or container", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_placement(
    State(state): State<ApiState>,
    payload: Result<Json<PlacementRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let (container, products, config) = match prepare_placement(&state, request) {
        Ok(prepared) => prepared,
        Err(err) => return validation_error(err),
    };

    let requested = requested_carton_count(&products);
    let dims = container.placement_dims();
    let result = match run_blocking(move || place_with_config(&dims, &products, config)).await {
        Ok(result) => result,
        Err(response) => return response,
    };
    info!(
        container = %container.name,
        requested,
        placed = result.placed_cartons.len(),
        unplaced = result.unplaced_cartons,
        "placement"
    );
    Json(result).into_response()
}

/// Streams placement events as Server-Sent Events.
#[utoipa::path(
    post,
    path = "/placement_stream",
    request_body = PlacementRequest,
    responses(
        (
            status = 200,
            description = "One event per carton, then a final summary event",
            content_type = "text/event-stream",
            body = String
        ),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid products or container", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_placement_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PlacementRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let (container, products, config) = match prepare_placement(&state, request) {
        Ok(prepared) => prepared,
        Err(err) => return validation_error(err),
    };

    let (tx, rx) = mpsc::channel::<String>(64);
    tokio::task::spawn_blocking(move || {
        let dims = container.placement_dims();
        place_with_progress(&dims, &products, config, |event| {
            if let Ok(json) = serde_json::to_string(event) {
                // a closed receiver only means the client went away
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream =
        ReceiverStream::new(rx).map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Ranks bookable trucks for the recommended or requested container.
#[utoipa::path(
    post,
    path = "/trucks/select",
    request_body = ShipmentRequest,
    responses(
        (status = 200, description = "Recommended truck and alternatives", body = TruckSelectionResult),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_truck_select(payload: Result<Json<ShipmentRequest>, JsonRejection>) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let now = Utc::now();
    let (plan, _) = match request.into_plan_request(now) {
        Ok(prepared) => prepared,
        Err(err) => return validation_error(err),
    };
    let selection = match choose_container(&plan.products, plan.container_key.as_deref()) {
        Ok(selection) => selection,
        Err(err) => return validation_error(err),
    };

    let result = select_truck(&plan.fleet, &selection, &plan.trip, now);
    info!(
        fleet = result.total_trucks,
        recommended = result.recommended_truck.as_ref().map(|o| o.truck.id.as_str()),
        "truck selection"
    );
    Json(result).into_response()
}

/// Runs container selection, placement and truck selection in one call.
#[utoipa::path(
    post,
    path = "/plan",
    request_body = ShipmentRequest,
    responses(
        (status = 200, description = "Complete load plan", body = PlanResult),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<ShipmentRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let now = Utc::now();
    let (plan, allow_rotation) = match request.into_plan_request(now) {
        Ok(prepared) => prepared,
        Err(err) => return validation_error(err),
    };
    info!(
        products = plan.products.len(),
        origin = %plan.trip.origin,
        "plan request"
    );

    let config = state.placement_config(allow_rotation);
    match run_blocking(move || planner::plan(&plan, config, now)).await {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(err)) => validation_error(err),
        Err(response) => response,
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
