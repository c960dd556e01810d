//! Axum router and all HTTP handlers for suds-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use suds_db::{OrderFilter, StoreError};
use suds_schemas::{ChangeEvent, FeedTable, NewExpense, NewOrder, Principal};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use crate::{
    api_types::{
        CreateExpenseRequest, CreateOrderRequest, ErrorResponse, HealthResponse, OrdersQuery,
        StreamQuery,
    },
    auth::Auth,
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/orders", get(list_orders).post(create_order))
        .route("/v1/orders/:id/advance", post(advance_order))
        .route("/v1/expenses", get(list_expenses).post(create_expense))
        .route("/v1/ledger", get(ledger))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

/// Map a store error onto an HTTP response.
///
/// Validation → 422, authorization → 403, not found → 404, transport → 503.
/// Config/internal anomalies are logged and surface as 500.
fn store_error_response(err: StoreError) -> Response {
    let status = match &err {
        StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Authorization(_) => StatusCode::FORBIDDEN,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Config(_) | StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "store operation failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn list_orders(
    State(st): State<Arc<AppState>>,
    Auth(principal): Auth,
    Query(q): Query<OrdersQuery>,
) -> Response {
    let filter = OrderFilter {
        active_only: q.active,
    };
    match st.store.list_orders(&principal, filter).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    Auth(principal): Auth,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    let owner = req.user_id.unwrap_or(principal.user_id);
    let new = NewOrder {
        user_id: owner,
        client_name: req.client_name,
        load_count: req.load_count,
        instructions: req.instructions,
    };
    match st.store.create_order(&principal, new).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:id/advance
// ---------------------------------------------------------------------------

pub(crate) async fn advance_order(
    State(st): State<Arc<AppState>>,
    Auth(principal): Auth,
    Path(id): Path<Uuid>,
) -> Response {
    match st.store.advance_order(&principal, id).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/expenses  POST /v1/expenses
// ---------------------------------------------------------------------------

pub(crate) async fn list_expenses(
    State(st): State<Arc<AppState>>,
    Auth(principal): Auth,
) -> Response {
    match st.store.list_expenses(&principal).await {
        Ok(expenses) => (StatusCode::OK, Json(expenses)).into_response(),
        Err(e) => store_error_response(e),
    }
}

pub(crate) async fn create_expense(
    State(st): State<Arc<AppState>>,
    Auth(principal): Auth,
    Json(req): Json<CreateExpenseRequest>,
) -> Response {
    let new = NewExpense {
        date: req.date,
        description: req.description,
        amount: req.amount,
    };
    match st.store.insert_expense(&principal, new).await {
        Ok(expense) => (StatusCode::CREATED, Json(expense)).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/ledger
// ---------------------------------------------------------------------------

/// The three derived figures over the current snapshot. Recomputed per
/// request; expenses are admin-scoped, so this endpoint is effectively
/// admin-only.
pub(crate) async fn ledger(State(st): State<Arc<AppState>>, Auth(principal): Auth) -> Response {
    let expenses = match st.store.list_expenses(&principal).await {
        Ok(v) => v,
        Err(e) => return store_error_response(e),
    };
    let orders = match st.store.list_orders(&principal, OrderFilter::default()).await {
        Ok(v) => v,
        Err(e) => return store_error_response(e),
    };
    let totals = suds_ledger::aggregate(&orders, &expenses);
    (StatusCode::OK, Json(totals)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(
    State(st): State<Arc<AppState>>,
    Auth(principal): Auth,
    Query(q): Query<StreamQuery>,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.store.subscribe();
    let events = feed_to_sse(rx, principal, q.table);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

/// Visibility rule for the SSE feed. Customers only ever see events for
/// their own orders; admins see everything, optionally narrowed by table.
fn event_visible(principal: &Principal, table: Option<FeedTable>, ev: &ChangeEvent) -> bool {
    if let Some(t) = table {
        if ev.table != t {
            return false;
        }
    }
    if principal.is_admin() {
        return true;
    }
    ev.table == FeedTable::Orders && ev.owner_id == Some(principal.user_id)
}

fn feed_to_sse(
    rx: broadcast::Receiver<ChangeEvent>,
    principal: Principal,
    table: Option<FeedTable>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(move |msg| async move {
        match msg {
            Ok(ev) if event_visible(&principal, table, &ev) => {
                let data = serde_json::to_string(&ev).ok()?;
                Some(Ok(Event::default().event(ev.table.as_str()).data(data)))
            }
            // invisible, lagged, or closed
            _ => None,
        }
    })
}
