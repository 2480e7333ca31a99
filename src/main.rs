use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verba::application::services::consumption_processor::DailyConsumptionProcessor;
use verba::application::services::credit_service::CreditService;
use verba::config::AppConfig;
use verba::domain::entities::client::{self, Client, PaymentFrequency, PaymentMethod};
use verba::domain::errors::LedgerError;
use verba::persistence::models::{ClientRecord, CreateClient, UpdateClient};
use verba::persistence::repository::{
    ClientRepository, ConsumptionLogRepository, LedgerRepository, TransactionRepository,
};
use verba::persistence::{init_database, DbPool};
use verba::rate_limit;

struct AppState {
    pool: DbPool,
    clients: ClientRepository,
    transactions: TransactionRepository,
    consumption_logs: ConsumptionLogRepository,
    processor: DailyConsumptionProcessor,
    credits: CreditService,
    history_limit: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verba=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    info!("Verba — gestor de verba de anúncios iniciando...");
    info!("Métodos de pagamento suportados: PIX, Boleto");

    let pool = init_database(&config.database.url).await?;

    let ledger = Arc::new(LedgerRepository::new(pool.clone()));
    let state = Arc::new(AppState {
        pool: pool.clone(),
        clients: ClientRepository::new(pool.clone()),
        transactions: TransactionRepository::new(pool.clone()),
        consumption_logs: ConsumptionLogRepository::new(pool.clone()),
        processor: DailyConsumptionProcessor::new(ledger.clone()),
        credits: CreditService::new(ledger),
        history_limit: config.transaction_history_limit,
    });

    let limiter = rate_limit::create_rate_limiter(config.requests_per_minute);
    let process_limit = axum::middleware::from_fn(move |req, next| {
        let limiter = limiter.clone();
        async move { rate_limit::rate_limit_middleware(limiter, req, next).await }
    });

    let app = Router::new()
        .route("/", get(|| async { "Verba budget ledger is running!" }))
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
        .route("/clients/:id/transactions", get(get_client_transactions))
        .route("/clients/:id/consumption", get(get_client_consumption))
        .route("/clients/:id/credits", post(post_client_credit))
        .route(
            "/consumption/process",
            post(process_daily_consumption).layer(process_limit),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::limit::RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state);

    let addr = config.bind_addr;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    // Set up graceful shutdown
    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

fn default_payment_method() -> String {
    "pix".to_string()
}

fn default_payment_frequency() -> String {
    "monthly".to_string()
}

fn default_alert_threshold() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

/// Client create/update form payload
#[derive(serde::Deserialize)]
struct ClientPayload {
    manager_id: Option<String>,
    name: String,
    phone: Option<String>,
    #[serde(default = "default_payment_method")]
    payment_method: String,
    #[serde(default = "default_payment_frequency")]
    payment_frequency: String,
    #[serde(default)]
    daily_budget: f64,
    #[serde(default)]
    current_balance: f64,
    #[serde(default = "default_alert_threshold")]
    alert_threshold: f64,
    #[serde(default = "default_true")]
    is_active: bool,
}

/// Manual credit payload
#[derive(serde::Deserialize)]
struct CreditPayload {
    amount: f64,
    description: Option<String>,
    transaction_date: Option<NaiveDate>,
    created_by: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"success": false, "error": message})),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"success": false, "error": format!("Client not found: {}", id)})),
    )
}

fn internal_error(message: String) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"success": false, "error": message})),
    )
}

fn ledger_error_response(e: LedgerError) -> ApiError {
    let status = match &e {
        LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::ClientNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::WriteConflict(_) => StatusCode::CONFLICT,
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({"success": false, "error": e.to_string()})),
    )
}

/// Validate a form payload through the domain entity before it touches the
/// store. Returns 400 with the validation message on failure.
fn validate_client_payload(manager_id: &str, payload: &ClientPayload) -> Result<Client, ApiError> {
    let payment_method = PaymentMethod::parse(&payload.payment_method).map_err(bad_request)?;
    let payment_frequency =
        PaymentFrequency::parse(&payload.payment_frequency).map_err(bad_request)?;

    Client::new(
        String::new(),
        manager_id.to_string(),
        payload.name.clone(),
        payload.phone.clone(),
        payment_method,
        payment_frequency,
        payload.daily_budget,
        payload.current_balance,
        payload.alert_threshold,
        payload.is_active,
    )
    .map_err(bad_request)
}

/// Serialize a client row plus the derived dashboard fields.
fn client_json(c: &ClientRecord) -> serde_json::Value {
    serde_json::json!({
        "id": c.id,
        "manager_id": c.manager_id,
        "name": c.name,
        "phone": c.phone,
        "payment_method": c.payment_method,
        "payment_frequency": c.payment_frequency,
        "daily_budget": c.daily_budget,
        "current_balance": c.current_balance,
        "alert_threshold": c.alert_threshold,
        "is_active": c.is_active,
        "created_at": c.created_at,
        "updated_at": c.updated_at,
        "days_until_depleted": client::days_until_depleted(c.current_balance, c.daily_budget),
        "low_balance": c.current_balance < c.alert_threshold,
    })
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let database_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    Json(serde_json::json!({
        "status": "running",
        "database": if database_ok { "ok" } else { "unavailable" },
    }))
}

/// Dashboard aggregates
async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state
        .clients
        .stats()
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "total": stats.total,
        "active": stats.active,
        "low_balance": stats.low_balance,
        "total_balance": stats.total_balance,
    })))
}

/// List all clients, newest first
async fn list_clients(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let clients = state
        .clients
        .list()
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    let items: Vec<serde_json::Value> = clients.iter().map(client_json).collect();
    Ok(Json(serde_json::json!({
        "clients": items,
        "count": items.len(),
    })))
}

/// Create a client
async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ClientPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let manager_id = payload
        .manager_id
        .clone()
        .ok_or_else(|| bad_request("Missing manager_id field".to_string()))?;
    let validated = validate_client_payload(&manager_id, &payload)?;

    let record = state
        .clients
        .create(CreateClient {
            manager_id,
            name: validated.name,
            phone: validated.phone,
            payment_method: validated.payment_method.to_string(),
            payment_frequency: validated.payment_frequency.to_string(),
            daily_budget: validated.daily_budget.value(),
            current_balance: validated.current_balance.value(),
            alert_threshold: validated.alert_threshold.value(),
            is_active: validated.is_active,
        })
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "client": client_json(&record),
    })))
}

/// Get client detail
async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .clients
        .get(&id)
        .await
        .map_err(|e| internal_error(e.to_string()))?
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(client_json(&record)))
}

/// Update a client from a full form submit.
///
/// Writing `current_balance` here is the manual-override path: the balance
/// changes with no accompanying transaction row.
async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ClientPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existing = state
        .clients
        .get(&id)
        .await
        .map_err(|e| internal_error(e.to_string()))?
        .ok_or_else(|| not_found(&id))?;

    let validated = validate_client_payload(&existing.manager_id, &payload)?;

    let record = state
        .clients
        .update(
            &id,
            UpdateClient {
                name: validated.name,
                phone: validated.phone,
                payment_method: validated.payment_method.to_string(),
                payment_frequency: validated.payment_frequency.to_string(),
                daily_budget: validated.daily_budget.value(),
                current_balance: validated.current_balance.value(),
                alert_threshold: validated.alert_threshold.value(),
                is_active: validated.is_active,
            },
        )
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "client": client_json(&record),
    })))
}

/// Delete a client (history rows cascade)
async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .clients
        .get(&id)
        .await
        .map_err(|e| internal_error(e.to_string()))?
        .ok_or_else(|| not_found(&id))?;

    state
        .clients
        .delete(&id)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Client {} deleted", id),
    })))
}

/// Recent transactions for a client, display ordering
async fn get_client_transactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .clients
        .get(&id)
        .await
        .map_err(|e| internal_error(e.to_string()))?
        .ok_or_else(|| not_found(&id))?;

    let transactions = state
        .transactions
        .recent_for_client(&id, state.history_limit)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "client_id": id,
        "transactions": transactions,
        "count": transactions.len(),
    })))
}

/// Recent daily consumption log rows for a client
async fn get_client_consumption(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .clients
        .get(&id)
        .await
        .map_err(|e| internal_error(e.to_string()))?
        .ok_or_else(|| not_found(&id))?;

    let log = state
        .consumption_logs
        .recent_for_client(&id, state.history_limit)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "client_id": id,
        "consumption": log,
        "count": log.len(),
    })))
}

/// Post a manual credit to a client
async fn post_client_credit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<CreditPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let new_balance = state
        .credits
        .post_credit(
            &id,
            payload.amount,
            payload.description,
            payload.transaction_date,
            &payload.created_by,
        )
        .await
        .map_err(ledger_error_response)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "client_id": id,
        "new_balance": new_balance,
    })))
}

/// Run the daily consumption batch for today (UTC). Safe to call repeatedly:
/// clients already debited today are skipped.
async fn process_daily_consumption(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let today = Utc::now().date_naive();

    match state.processor.process(today).await {
        Ok(results) => Ok(Json(serde_json::json!({
            "success": true,
            "date": today,
            "results": results,
        }))),
        Err(e) => {
            error!("Daily consumption batch failed: {}", e);
            Err(internal_error(e.to_string()))
        }
    }
}
