use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use materials_core::persist::{load_catalog, save_catalog, CatalogPaths};
use materials_core::recommend::DEFAULT_TOP_N;
use materials_core::lease::{billed_days, open_lease, set_status};
use materials_core::{
    next_id, Lease, LeaseError, LeaseId, LeaseStatus, MaterialId, MaterialPatch, MaterialRecord, NewLease,
    NewMaterial, PricingQuote, RecommenderConfig, SharedRecommender, UserId,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const DEFAULT_MAX_LEASE_DURATION_DAYS: u32 = 365;
const MAX_TOP_N: usize = 100;

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub admin_token: Option<String>,
    pub cors_allow_origin: Option<String>,
    pub max_lease_duration_days: u32,
    pub recommender: RecommenderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            admin_token: None,
            cors_allow_origin: None,
            max_lease_duration_days: DEFAULT_MAX_LEASE_DURATION_DAYS,
            recommender: RecommenderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `ADMIN_TOKEN`, `CORS_ALLOW_ORIGIN`, `MAX_LEASE_DURATION_DAYS`.
    pub fn from_env() -> Self {
        let max_lease_duration_days = std::env::var("MAX_LEASE_DURATION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_LEASE_DURATION_DAYS);
        Self {
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
            max_lease_duration_days,
            recommender: RecommenderConfig::default(),
        }
    }
}

/// Catalog owned by the server: the fitted recommender, the lease ledger and
/// where to persist writes.
pub struct CatalogStore {
    paths: Option<CatalogPaths>,
    recommender: SharedRecommender,
    leases: RwLock<Vec<Lease>>,
    // serializes read-modify-write of the catalog; readers never take it
    write_lock: Mutex<()>,
}

impl CatalogStore {
    pub fn in_memory(materials: Vec<MaterialRecord>, config: RecommenderConfig) -> Self {
        Self::new(None, materials, Vec::new(), config)
    }

    pub fn open(dir: PathBuf, config: RecommenderConfig) -> Result<Self> {
        let paths = CatalogPaths::new(dir);
        let snapshot = load_catalog(&paths)?;
        tracing::info!(
            num_materials = snapshot.materials.len(),
            num_leases = snapshot.leases.len(),
            created_at = ?snapshot.meta.map(|m| m.created_at),
            "loaded catalog"
        );
        Ok(Self::new(Some(paths), snapshot.materials, snapshot.leases, config))
    }

    fn new(paths: Option<CatalogPaths>, materials: Vec<MaterialRecord>, leases: Vec<Lease>, config: RecommenderConfig) -> Self {
        Self {
            paths,
            recommender: SharedRecommender::new(materials, config),
            leases: RwLock::new(leases),
            write_lock: Mutex::new(()),
        }
    }

    pub fn recommender(&self) -> &SharedRecommender { &self.recommender }

    pub fn lease(&self, id: LeaseId) -> Option<Lease> {
        self.leases.read().iter().find(|l| l.id == id).cloned()
    }

    pub fn leases_for_user(&self, user_id: UserId) -> Vec<Lease> {
        self.leases.read().iter().filter(|l| l.user_id == user_id).cloned().collect()
    }

    /// Apply `edit` to copies of the materials and the lease ledger, persist
    /// both, then publish the leases and re-fit. A failed edit changes nothing.
    fn write<T>(&self, edit: impl FnOnce(&mut Vec<MaterialRecord>, &mut Vec<Lease>) -> ApiResult<T>) -> ApiResult<T> {
        let _guard = self.write_lock.lock();
        let mut materials = self.recommender.snapshot().materials().to_vec();
        let mut leases = self.leases.read().clone();
        let out = edit(&mut materials, &mut leases)?;
        if let Some(paths) = &self.paths {
            save_catalog(paths, &materials, &leases).map_err(|e| {
                tracing::error!(error = %e, "failed to persist catalog");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to persist catalog".to_string())
            })?;
        }
        *self.leases.write() = leases;
        self.recommender.refit(materials);
        Ok(out)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
    pub admin_token: Option<String>,
    pub max_lease_duration_days: u32,
}

#[derive(Deserialize)]
pub struct MaterialFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct ProjectRequest {
    #[serde(default)]
    pub project_description: String,
    pub project_type: Option<String>,
    pub top_n: Option<usize>,
}

#[derive(Serialize)]
pub struct ProjectRecommendation {
    pub material: MaterialRecord,
    pub relevance_score: f64,
    pub recommendation_reason: &'static str,
}

#[derive(Deserialize)]
pub struct ComplementaryRequest {
    #[serde(default)]
    pub material_ids: Vec<MaterialId>,
    pub top_n: Option<usize>,
}

#[derive(Serialize)]
pub struct ComplementaryRecommendation {
    pub material: MaterialRecord,
    pub relevance_score: f64,
}

#[derive(Deserialize)]
pub struct PricingRequest {
    pub material_id: Option<MaterialId>,
    pub lease_duration_days: Option<u32>,
    pub quantity: Option<u32>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub fn build_app(catalog_dir: String, config: ServerConfig) -> Result<Router> {
    let store = CatalogStore::open(PathBuf::from(catalog_dir), config.recommender)?;
    Ok(build_app_with_store(store, config))
}

pub fn build_app_with_store(store: CatalogStore, config: ServerConfig) -> Router {
    let cors = match &config.cors_allow_origin {
        Some(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };
    let state = AppState {
        catalog: Arc::new(store),
        admin_token: config.admin_token,
        max_lease_duration_days: config.max_lease_duration_days,
    };

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({ "status": "healthy" })) }))
        .route("/materials", get(list_materials).post(create_material))
        .route("/materials/:id", get(get_material).put(update_material))
        .route("/categories", get(list_categories))
        .route("/recommendations/project", post(recommend_project))
        .route("/recommendations/complementary", post(recommend_complementary))
        .route("/pricing/optimize", post(optimize_pricing))
        .route("/leases", post(create_lease))
        .route("/leases/user/:user_id", get(list_user_leases))
        .route("/leases/:id", get(get_lease))
        .route("/leases/:id/status", put(update_lease_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn round3(score: f32) -> f64 { (score as f64 * 1000.0).round() / 1000.0 }

fn clamp_top_n(top_n: Option<usize>) -> usize { top_n.unwrap_or(DEFAULT_TOP_N).clamp(1, MAX_TOP_N) }

fn not_found(id: MaterialId) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("material {id} not found"))
}

fn lease_error(err: LeaseError) -> (StatusCode, String) {
    let status = match err {
        LeaseError::LeaseNotFound(_) | LeaseError::MaterialNotFound(_) => StatusCode::NOT_FOUND,
        LeaseError::Closed { .. } | LeaseError::IdsExhausted => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

pub async fn list_materials(State(state): State<AppState>, Query(filter): Query<MaterialFilter>) -> Json<Vec<MaterialRecord>> {
    let rec = state.catalog.recommender().snapshot();
    let needle = filter.search.as_deref().map(str::to_lowercase);
    let out = rec
        .materials()
        .iter()
        .filter(|m| filter.category.as_deref().map_or(true, |c| m.category == c))
        .filter(|m| {
            needle.as_deref().map_or(true, |n| {
                m.name.to_lowercase().contains(n) || m.description.to_lowercase().contains(n)
            })
        })
        .cloned()
        .collect();
    Json(out)
}

pub async fn get_material(State(state): State<AppState>, Path(id): Path<MaterialId>) -> ApiResult<Json<MaterialRecord>> {
    let rec = state.catalog.recommender().snapshot();
    rec.get(id).cloned().map(Json).ok_or_else(|| not_found(id))
}

pub async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    let rec = state.catalog.recommender().snapshot();
    let categories: BTreeSet<&str> = rec
        .materials()
        .iter()
        .map(|m| m.category.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    Json(categories.into_iter().map(str::to_string).collect())
}

async fn create_material(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<NewMaterial>,
) -> ApiResult<(StatusCode, Json<MaterialRecord>)> {
    authorize(&state, &headers)?;
    let created = state.catalog.write(|materials, _| {
        let id = match draft.id {
            Some(id) if materials.iter().any(|m| m.id == id) => {
                return Err((StatusCode::CONFLICT, format!("material {id} already exists")));
            }
            Some(id) => id,
            None => next_id(materials.iter().map(|m| m.id))
                .ok_or_else(|| (StatusCode::CONFLICT, "no material ids left".to_string()))?,
        };
        let record = draft.into_record(id).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        materials.push(record.clone());
        Ok(record)
    })?;
    tracing::info!(id = created.id, name = %created.name, "material created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_material(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<MaterialId>,
    Json(patch): Json<MaterialPatch>,
) -> ApiResult<Json<MaterialRecord>> {
    authorize(&state, &headers)?;
    let updated = state.catalog.write(|materials, _| {
        let slot = materials.iter_mut().find(|m| m.id == id).ok_or_else(|| not_found(id))?;
        *slot = patch.apply(slot).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        Ok(slot.clone())
    })?;
    tracing::info!(id, "material updated");
    Ok(Json(updated))
}

pub async fn recommend_project(
    State(state): State<AppState>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Json<Vec<ProjectRecommendation>>> {
    if req.project_description.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "project_description is required".into()));
    }
    let rec = state.catalog.recommender().snapshot();
    let project_type = req.project_type.as_deref().filter(|t| !t.is_empty());
    let hits = rec.recommend_by_project(&req.project_description, project_type, clamp_top_n(req.top_n));
    let out = hits
        .into_iter()
        .map(|c| {
            let reason = c.label().reason();
            ProjectRecommendation { relevance_score: round3(c.score), material: c.material, recommendation_reason: reason }
        })
        .collect();
    Ok(Json(out))
}

pub async fn recommend_complementary(
    State(state): State<AppState>,
    Json(req): Json<ComplementaryRequest>,
) -> ApiResult<Json<Vec<ComplementaryRecommendation>>> {
    if req.material_ids.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "material_ids is required".into()));
    }
    let rec = state.catalog.recommender().snapshot();
    let out = rec
        .recommend_complementary(&req.material_ids, clamp_top_n(req.top_n))
        .into_iter()
        .map(|c| ComplementaryRecommendation { relevance_score: round3(c.score), material: c.material })
        .collect();
    Ok(Json(out))
}

pub async fn optimize_pricing(
    State(state): State<AppState>,
    Json(req): Json<PricingRequest>,
) -> ApiResult<Json<PricingQuote>> {
    let (id, days, quantity) = match (req.material_id, req.lease_duration_days, req.quantity) {
        (Some(id), Some(days), Some(qty)) if id > 0 && days > 0 && qty > 0 => (id, days, qty),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "material_id, lease_duration_days, and quantity are required".into(),
            ))
        }
    };
    if days > state.max_lease_duration_days {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("lease_duration_days must not exceed {}", state.max_lease_duration_days),
        ));
    }
    let rec = state.catalog.recommender().snapshot();
    rec.optimize_pricing(id, days, quantity).map(Json).ok_or_else(|| not_found(id))
}

async fn create_lease(
    State(state): State<AppState>,
    Json(req): Json<NewLease>,
) -> ApiResult<(StatusCode, Json<Lease>)> {
    if req.end_date >= req.start_date
        && billed_days(req.start_date, req.end_date) > state.max_lease_duration_days as i64
    {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("lease must not exceed {} days", state.max_lease_duration_days),
        ));
    }
    let lease = state.catalog.write(|materials, leases| {
        let lease = open_lease(leases, req, materials).map_err(lease_error)?;
        leases.push(lease.clone());
        Ok(lease)
    })?;
    tracing::info!(id = lease.id, user_id = lease.user_id, items = lease.items.len(), total_cost = lease.total_cost, "lease created");
    Ok((StatusCode::CREATED, Json(lease)))
}

async fn get_lease(State(state): State<AppState>, Path(id): Path<LeaseId>) -> ApiResult<Json<Lease>> {
    state.catalog.lease(id).map(Json).ok_or_else(|| lease_error(LeaseError::LeaseNotFound(id)))
}

async fn list_user_leases(State(state): State<AppState>, Path(user_id): Path<UserId>) -> Json<Vec<Lease>> {
    Json(state.catalog.leases_for_user(user_id))
}

async fn update_lease_status(
    State(state): State<AppState>,
    Path(id): Path<LeaseId>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<Lease>> {
    let status: LeaseStatus = update.status.parse().map_err(lease_error)?;
    let lease = state.catalog.write(|materials, leases| {
        let lease = leases
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| lease_error(LeaseError::LeaseNotFound(id)))?;
        set_status(lease, status, materials).map_err(lease_error)?;
        Ok(lease.clone())
    })?;
    tracing::info!(id, status = %lease.status, "lease status updated");
    Ok(Json(lease))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
