//! Statistics HTTP handler.

use axum::{Json, extract::State};

use crate::{error::AppError, models::statistics::StatisticsReport, state::AppState};

/// Usage statistics for the dashboard.
///
/// # Endpoint
///
/// `GET /api/v1/statistics`
///
/// Returns total/redeemed/active counts, the redemption percentage and the
/// most recent scans with holder and event name when the code resolves.
pub async fn get_statistics(
    State(state): State<AppState>,
) -> Result<Json<StatisticsReport>, AppError> {
    let report = state.statistics.report().await?;

    Ok(Json(report))
}
