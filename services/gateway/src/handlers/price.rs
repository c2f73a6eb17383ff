use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, State,
        rejection::{BytesRejection, PathRejection},
    },
    http::StatusCode,
};
use types::errors::EventError;
use types::event::StockEvent;

use crate::error::AppError;
use crate::models::PriceAccepted;
use crate::state::AppState;

/// `POST /v1/prices` with a decimal price body, tagged with the default symbol.
pub async fn ingest_default(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<PriceAccepted>), AppError> {
    let body = body?;
    let symbol = state.default_symbol.clone();
    enqueue(&state, symbol.as_str(), &body).await
}

/// `POST /v1/prices/{symbol}` with a decimal price body.
pub async fn ingest_for_symbol(
    State(state): State<AppState>,
    symbol: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<PriceAccepted>), AppError> {
    let Path(symbol) = symbol?;
    let body = body?;
    enqueue(&state, &symbol, &body).await
}

async fn enqueue(
    state: &AppState,
    symbol: &str,
    body: &[u8],
) -> Result<(StatusCode, Json<PriceAccepted>), AppError> {
    // Malformed input is rejected here and never reaches the engine
    let event = std::str::from_utf8(body)
        .map_err(|_| EventError::InvalidPrice(String::from_utf8_lossy(body).trim().to_string()))
        .and_then(|text| StockEvent::parse(symbol, text))
        .inspect_err(|e| {
            tracing::debug!(symbol, error = %e, "Rejected price update");
        })?;

    let accepted = PriceAccepted {
        event_id: event.event_id(),
        symbol: event.symbol().clone(),
        price: event.price(),
    };

    state.events.send(event).await?;

    tracing::debug!(
        event_id = %accepted.event_id,
        symbol = %accepted.symbol,
        price = accepted.price,
        "Price update accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}
