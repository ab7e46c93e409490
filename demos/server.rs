//! Simple REST API server example for the bid engine.
//!
//! Run with: `cargo run --example server`
//!
//! Every request names its caller with two headers, standing in for a real
//! authentication layer: `x-actor-id` and `x-actor-role` (`requester` or
//! `provider`).
//!
//! ## Endpoints
//!
//! - `POST /items/{kind}` - Post a job or product request (requester)
//! - `GET /items` - List all items
//! - `GET /items/{kind}/{id}` - Get an item
//! - `GET /items/{kind}/{id}/offers` - List the offers on an item
//! - `POST /items/{kind}/{id}/complete` - Mark an item completed (owner)
//! - `POST /items/{kind}/{id}/cancel` - Cancel an item (owner)
//! - `POST /offers` - Submit an offer (provider)
//! - `GET /offers/{id}` - Get an offer
//! - `POST /offers/{id}/accept` - Accept a pending offer (owner)
//! - `POST /offers/{id}/reject` - Reject a pending offer (owner)
//! - `POST /offers/{id}/revive` - Reopen a rejected offer (provider)
//! - `GET /events` - Drain the event feed
//!
//! ## Example Usage
//!
//! ```bash
//! # Post a product request
//! curl -X POST http://localhost:3000/items/product \
//!   -H "x-actor-id: 1" -H "x-actor-role: requester" \
//!   -H "Content-Type: application/json" \
//!   -d '{"title": "Used bike"}'
//!
//! # Offer on it
//! curl -X POST http://localhost:3000/offers \
//!   -H "x-actor-id: 7" -H "x-actor-role: provider" \
//!   -H "Content-Type: application/json" \
//!   -d '{"kind": "product", "item_id": 1, "amount": 120}'
//!
//! # Accept the offer
//! curl -X POST http://localhost:3000/offers/1/accept \
//!   -H "x-actor-id: 1" -H "x-actor-role: requester"
//!
//! # Watch what happened
//! curl http://localhost:3000/events
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bid_engine_rs::{
    ActorId, Decision, Engine, Identity, Item, ItemId, ItemKind, ItemRef, NewItem, NewOffer,
    Offer, OfferError, OfferId, OfferRevision, Role, SequencedEvent,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

const ACTOR_ID: &str = "x-actor-id";
const ACTOR_ROLE: &str = "x-actor-role";

// === Request/Response DTOs ===

/// Request body for submitting an offer.
///
/// ```json
/// {"kind": "job", "item_id": 3, "amount": 250, "details": "two weeks"}
/// ```
#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub kind: ItemKind,
    pub item_id: u64,
    pub amount: u64,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub delivery_time: String,
    #[serde(default)]
    pub attachment: Option<String>,
}

impl OfferRequest {
    /// Converts the request DTO into the engine's offer input.
    fn into_new_offer(self) -> NewOffer {
        NewOffer {
            item: ItemRef {
                kind: self.kind,
                id: ItemId(self.item_id),
            },
            amount: self.amount,
            details: self.details,
            delivery_time: self.delivery_time,
            attachment: self.attachment,
        }
    }
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

// === Error Handling ===

/// Failures surfaced to HTTP callers.
pub enum AppError {
    /// Identity headers missing or malformed.
    Unauthenticated,
    Offer(OfferError),
}

impl From<OfferError> for AppError {
    fn from(err: OfferError) -> Self {
        AppError::Offer(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = match &self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "missing or invalid identity headers".to_string(),
            ),
            AppError::Offer(err) => {
                let (status, code) = match err {
                    OfferError::ItemNotFound => (StatusCode::NOT_FOUND, "ITEM_NOT_FOUND"),
                    OfferError::OfferNotFound => (StatusCode::NOT_FOUND, "OFFER_NOT_FOUND"),
                    OfferError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                    OfferError::InvalidTransition => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
                    OfferError::ItemClosed => (StatusCode::CONFLICT, "ITEM_CLOSED"),
                    OfferError::DuplicateActiveOffer => {
                        (StatusCode::CONFLICT, "DUPLICATE_ACTIVE_OFFER")
                    }
                    OfferError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
                    OfferError::InvalidItemTransition => {
                        (StatusCode::CONFLICT, "INVALID_ITEM_TRANSITION")
                    }
                };
                (status, code, err.to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Reads the caller's identity from the request headers.
fn identity(headers: &HeaderMap) -> Result<Identity, AppError> {
    let id = headers
        .get(ACTOR_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(AppError::Unauthenticated)?;
    let role = match headers.get(ACTOR_ROLE).and_then(|v| v.to_str().ok()) {
        Some("requester") => Role::Requester,
        Some("provider") => Role::Provider,
        _ => return Err(AppError::Unauthenticated),
    };
    Ok(Identity {
        id: ActorId(id),
        role,
    })
}

// === Handlers ===

/// POST /items/{kind} - Post a new item.
async fn create_item(
    State(state): State<AppState>,
    Path(kind): Path<ItemKind>,
    headers: HeaderMap,
    Json(request): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let actor = identity(&headers)?;
    if actor.role != Role::Requester {
        return Err(OfferError::Forbidden.into());
    }
    let item = match kind {
        ItemKind::Job => state.engine.create_job(actor.id, request),
        ItemKind::Product => state.engine.create_product(actor.id, request),
    };
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /items - List all items.
async fn list_items(State(state): State<AppState>) -> Json<Vec<Item>> {
    Json(state.engine.items())
}

/// GET /items/{kind}/{id} - Get an item.
async fn get_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(ItemKind, u64)>,
) -> Result<Json<Item>, AppError> {
    state
        .engine
        .get_item(&ItemRef { kind, id: ItemId(id) })
        .map(Json)
        .ok_or(AppError::Offer(OfferError::ItemNotFound))
}

/// GET /items/{kind}/{id}/offers - List offers on an item.
async fn list_item_offers(
    State(state): State<AppState>,
    Path((kind, id)): Path<(ItemKind, u64)>,
) -> Result<Json<Vec<Offer>>, AppError> {
    let item = ItemRef { kind, id: ItemId(id) };
    if state.engine.get_item(&item).is_none() {
        return Err(OfferError::ItemNotFound.into());
    }
    Ok(Json(state.engine.list_offers_for_item(&item)))
}

/// POST /items/{kind}/{id}/complete - Mark an item completed.
async fn complete_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(ItemKind, u64)>,
    headers: HeaderMap,
) -> Result<Json<Item>, AppError> {
    let actor = identity(&headers)?;
    let item = state
        .engine
        .complete_item(&actor, &ItemRef { kind, id: ItemId(id) })?;
    Ok(Json(item))
}

/// POST /items/{kind}/{id}/cancel - Cancel an item.
async fn cancel_item(
    State(state): State<AppState>,
    Path((kind, id)): Path<(ItemKind, u64)>,
    headers: HeaderMap,
) -> Result<Json<Item>, AppError> {
    let actor = identity(&headers)?;
    let item = state
        .engine
        .cancel_item(&actor, &ItemRef { kind, id: ItemId(id) })?;
    Ok(Json(item))
}

/// POST /offers - Submit an offer.
async fn submit_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OfferRequest>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    let actor = identity(&headers)?;
    let offer = state.engine.submit_offer(&actor, request.into_new_offer())?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// GET /offers/{id} - Get an offer.
async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Offer>, AppError> {
    state
        .engine
        .get_offer(OfferId(id))
        .map(Json)
        .ok_or(AppError::Offer(OfferError::OfferNotFound))
}

async fn resolve(
    state: &AppState,
    headers: &HeaderMap,
    id: u64,
    decision: Decision,
) -> Result<Json<Offer>, AppError> {
    let actor = identity(headers)?;
    let offer = state.engine.resolve_offer(&actor, OfferId(id), decision)?;
    Ok(Json(offer))
}

/// POST /offers/{id}/accept - Accept a pending offer.
async fn accept_offer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Offer>, AppError> {
    resolve(&state, &headers, id, Decision::Accepted).await
}

/// POST /offers/{id}/reject - Reject a pending offer.
async fn reject_offer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Offer>, AppError> {
    resolve(&state, &headers, id, Decision::Rejected).await
}

/// POST /offers/{id}/revive - Reopen a rejected offer with revised terms.
async fn revive_offer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(revision): Json<OfferRevision>,
) -> Result<Json<Offer>, AppError> {
    let actor = identity(&headers)?;
    let offer = state.engine.revive_offer(&actor, OfferId(id), revision)?;
    Ok(Json(offer))
}

/// GET /events - Drain the event feed.
async fn drain_events(State(state): State<AppState>) -> Json<Vec<SequencedEvent>> {
    Json(state.engine.drain_events())
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/{kind}", post(create_item))
        .route("/items/{kind}/{id}", get(get_item))
        .route("/items/{kind}/{id}/offers", get(list_item_offers))
        .route("/items/{kind}/{id}/complete", post(complete_item))
        .route("/items/{kind}/{id}/cancel", post(cancel_item))
        .route("/offers", post(submit_offer))
        .route("/offers/{id}", get(get_offer))
        .route("/offers/{id}/accept", post(accept_offer))
        .route("/offers/{id}/reject", post(reject_offer))
        .route("/offers/{id}/revive", post(revive_offer))
        .route("/events", get(drain_events))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let state = AppState {
        engine: Arc::new(Engine::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    info!("bid engine API listening on http://127.0.0.1:3000");
    println!("Bid engine API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /items/{{kind}}             - Post a job or product");
    println!("  GET  /items                    - List all items");
    println!("  GET  /items/{{kind}}/{{id}}/offers - List offers on an item");
    println!("  POST /offers                   - Submit an offer");
    println!("  POST /offers/{{id}}/accept       - Accept an offer");
    println!("  POST /offers/{{id}}/reject       - Reject an offer");
    println!("  POST /offers/{{id}}/revive       - Revive a rejected offer");
    println!("  GET  /events                   - Drain the event feed");

    axum::serve(listener, app).await.unwrap();
}
