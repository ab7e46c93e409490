// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Integration tests for the REST API server with concurrent requests.
//!
//! These tests verify that the item-scoped locking holds up when hundreds of
//! HTTP requests race on the same item.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bid_engine_rs::{
    ActorId, Decision, Engine, Identity, Item, ItemId, ItemKind, ItemRef, NewItem, NewOffer,
    Offer, OfferError, OfferId, OfferRevision, OfferStatus, Role,
};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

const ACTOR_ID: &str = "x-actor-id";
const ACTOR_ROLE: &str = "x-actor-role";

// === DTOs (duplicated from example for test isolation) ===

#[derive(Debug, Clone, Serialize, Deserialize)]
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
    fn new(item: ItemRef, amount: u64) -> Self {
        Self {
            kind: item.kind,
            item_id: item.id.0,
            amount,
            details: String::new(),
            delivery_time: String::new(),
            attachment: None,
        }
    }

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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Server Setup ===

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub enum AppError {
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

async fn submit_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OfferRequest>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    let actor = identity(&headers)?;
    let offer = state.engine.submit_offer(&actor, request.into_new_offer())?;
    Ok((StatusCode::CREATED, Json(offer)))
}

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

async fn accept_offer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Offer>, AppError> {
    resolve(&state, &headers, id, Decision::Accepted).await
}

async fn reject_offer(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Offer>, AppError> {
    resolve(&state, &headers, id, Decision::Rejected).await
}

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

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/items/{kind}", post(create_item))
        .route("/items/{kind}/{id}", get(get_item))
        .route("/items/{kind}/{id}/offers", get(list_item_offers))
        .route("/offers", post(submit_offer))
        .route("/offers/{id}", get(get_offer))
        .route("/offers/{id}/accept", post(accept_offer))
        .route("/offers/{id}/reject", post(reject_offer))
        .route("/offers/{id}/revive", post(revive_offer))
        .with_state(state)
}

/// Test server that binds to an ephemeral port.
struct TestServer {
    base_url: String,
    engine: Arc<Engine>,
}

impl TestServer {
    async fn new() -> Self {
        let engine = Arc::new(Engine::new());
        let state = AppState {
            engine: engine.clone(),
        };

        let app = create_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready by polling with retries
        let client = Client::new();
        let health_url = format!("{}/offers/0", base_url);
        for _ in 0..50 {
            match client.get(&health_url).send().await {
                Ok(_) => break,
                Err(_) => tokio::time::sleep(tokio::time::Duration::from_millis(50)).await,
            }
        }

        TestServer { base_url, engine }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Attaches identity headers to a request.
fn as_actor(request: RequestBuilder, id: u64, role: &str) -> RequestBuilder {
    request
        .header(ACTOR_ID, id.to_string())
        .header(ACTOR_ROLE, role)
}

async fn post_product(server: &TestServer, client: &Client, owner: u64) -> ItemRef {
    let response = as_actor(client.post(server.url("/items/product")), owner, "requester")
        .json(&NewItem::titled("bike"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json::<Item>().await.unwrap().item_ref()
}

// === Tests ===
// The concurrency tests are ignored in CI due to connection issues on some
// platforms. Run manually with: cargo test --test server_test -- --ignored

/// Two offers accepted in sequence leave one winner and a pointer to it.
#[tokio::test]
async fn accept_displaces_previous_winner() {
    let server = TestServer::new().await;
    let client = Client::new();
    let item = post_product(&server, &client, 1).await;

    let mut ids = Vec::new();
    for (provider, amount) in [(10, 100), (11, 90)] {
        let response = as_actor(client.post(server.url("/offers")), provider, "provider")
            .json(&OfferRequest::new(item, amount))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(response.json::<Offer>().await.unwrap().id);
    }

    for id in &ids {
        let response = as_actor(
            client.post(server.url(&format!("/offers/{}/accept", id))),
            1,
            "requester",
        )
        .send()
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let first: Offer = client
        .get(server.url(&format!("/offers/{}", ids[0])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first.status, OfferStatus::Rejected);
    assert_eq!(first.replaced_by, Some(ids[1]));

    let offers: Vec<Offer> = client
        .get(server.url(&format!("/items/product/{}/offers", item.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(
        offers
            .iter()
            .filter(|o| o.status == OfferStatus::Accepted)
            .count(),
        1
    );
}

/// Identity and ownership failures map to 401 and 403.
#[tokio::test]
async fn identity_errors_map_to_status_codes() {
    let server = TestServer::new().await;
    let client = Client::new();
    let item = post_product(&server, &client, 1).await;

    let anonymous = client
        .post(server.url("/offers"))
        .json(&OfferRequest::new(item, 10))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let offer: Offer = as_actor(client.post(server.url("/offers")), 10, "provider")
        .json(&OfferRequest::new(item, 10))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let stranger = as_actor(
        client.post(server.url(&format!("/offers/{}/accept", offer.id))),
        2,
        "requester",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);
    let body: ErrorResponse = stranger.json().await.unwrap();
    assert_eq!(body.code, "FORBIDDEN");

    assert_eq!(
        server.engine.get_offer(offer.id).unwrap().status,
        OfferStatus::Pending
    );
}

/// Rejected offers come back through the revive route.
#[tokio::test]
async fn revive_round_trip() {
    let server = TestServer::new().await;
    let client = Client::new();
    let item = post_product(&server, &client, 1).await;

    let offer: Offer = as_actor(client.post(server.url("/offers")), 10, "provider")
        .json(&OfferRequest::new(item, 500))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let rejected = as_actor(
        client.post(server.url(&format!("/offers/{}/reject", offer.id))),
        1,
        "requester",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(rejected.status(), StatusCode::OK);

    let revived: Offer = as_actor(
        client.post(server.url(&format!("/offers/{}/revive", offer.id))),
        10,
        "provider",
    )
    .json(&OfferRevision::amount(450))
    .send()
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(revived.status, OfferStatus::Pending);
    assert_eq!(revived.amount, 450);
    assert_eq!(revived.replaced_by, None);

    let again = as_actor(
        client.post(server.url(&format!("/offers/{}/revive", offer.id))),
        10,
        "provider",
    )
    .json(&OfferRevision::default())
    .send()
    .await
    .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

/// Concurrent accepts on one product leave exactly one winner.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_accepts_single_product() {
    let server = TestServer::new().await;
    let client = Client::new();
    let item = post_product(&server, &client, 1).await;

    const NUM_OFFERS: u64 = 200;

    let mut ids = Vec::with_capacity(NUM_OFFERS as usize);
    for provider in 0..NUM_OFFERS {
        let offer = server
            .engine
            .submit_offer(
                &Identity::provider(1_000 + provider),
                NewOffer::new(item, 1 + provider),
            )
            .unwrap();
        ids.push(offer.id);
    }

    let start = Instant::now();
    let mut handles = Vec::with_capacity(ids.len());
    for id in ids {
        let client = client.clone();
        let url = server.url(&format!("/offers/{}/accept", id));

        let handle = tokio::spawn(async move {
            let response = as_actor(client.post(&url), 1, "requester")
                .send()
                .await
                .unwrap();
            response.status()
        });

        handles.push(handle);
    }

    let results: Vec<_> = futures::future::join_all(handles).await;
    let elapsed = start.elapsed();

    let successful = results
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::OK)
        .count();

    println!(
        "Accepted {} offers in {:?} ({:.0} req/s)",
        NUM_OFFERS,
        elapsed,
        NUM_OFFERS as f64 / elapsed.as_secs_f64()
    );

    assert_eq!(successful, NUM_OFFERS as usize);

    let offers = server.engine.list_offers_for_item(&item);
    let winners: Vec<_> = offers
        .iter()
        .filter(|o| o.status == OfferStatus::Accepted)
        .collect();
    assert_eq!(winners.len(), 1, "Exactly one offer should stand");

    for offer in offers.iter().filter(|o| o.status == OfferStatus::Rejected) {
        let successor = offer.replaced_by.expect("Displaced offers carry a pointer");
        assert!(server.engine.get_offer(successor).is_some());
    }
}

/// One provider racing itself gets exactly one active offer.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_duplicate_offers_rejected() {
    let server = TestServer::new().await;
    let client = Client::new();
    let item = post_product(&server, &client, 1).await;

    const NUM_DUPLICATES: usize = 100;

    let mut handles = Vec::with_capacity(NUM_DUPLICATES);
    for i in 0..NUM_DUPLICATES {
        let client = client.clone();
        let url = server.url("/offers");

        let handle = tokio::spawn(async move {
            let response = as_actor(client.post(&url), 42, "provider")
                .json(&OfferRequest::new(item, 10 + i as u64))
                .send()
                .await
                .unwrap();
            response.status()
        });

        handles.push(handle);
    }

    let results: Vec<_> = futures::future::join_all(handles).await;

    let successful = results
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::CREATED)
        .count();
    let conflicts = results
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::CONFLICT)
        .count();

    // Exactly one should succeed, the rest should be conflicts
    assert_eq!(successful, 1, "Exactly one offer should be created");
    assert_eq!(conflicts, NUM_DUPLICATES - 1, "Others should be conflicts");
    assert_eq!(server.engine.list_offers_for_provider(ActorId(42)).len(), 1);
}

/// Concurrent accepts on a job record every provider once.
#[tokio::test]
#[ignore = "requires running server, may fail in CI"]
async fn concurrent_job_acceptances() {
    let server = TestServer::new().await;
    let client = Client::new();

    let response = as_actor(client.post(server.url("/items/job")), 1, "requester")
        .json(&NewItem::titled("paint the fence"))
        .send()
        .await
        .unwrap();
    let job = response.json::<Item>().await.unwrap().item_ref();

    const NUM_PROVIDERS: u64 = 100;

    let mut handles = Vec::with_capacity(NUM_PROVIDERS as usize);
    for provider in 0..NUM_PROVIDERS {
        let client = client.clone();
        let offers_url = server.url("/offers");
        let base_url = server.base_url.clone();

        let handle = tokio::spawn(async move {
            let offer: Offer = as_actor(client.post(&offers_url), 500 + provider, "provider")
                .json(&OfferRequest::new(job, 100))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();

            let url = format!("{}/offers/{}/accept", base_url, offer.id);
            as_actor(client.post(&url), 1, "requester")
                .send()
                .await
                .unwrap()
                .status()
        });

        handles.push(handle);
    }

    let results: Vec<_> = futures::future::join_all(handles).await;
    assert!(results.iter().all(|r| *r.as_ref().unwrap() == StatusCode::OK));

    let item: Item = client
        .get(server.url(&format!("/items/job/{}", job.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let expected: BTreeSet<ActorId> = (0..NUM_PROVIDERS).map(|p| ActorId(500 + p)).collect();
    assert_eq!(item.accepted_provider_ids(), Some(&expected));
    assert!(
        server
            .engine
            .list_offers_for_item(&job)
            .iter()
            .all(|o| o.status == OfferStatus::Accepted && o.replaced_by.is_none())
    );
}
