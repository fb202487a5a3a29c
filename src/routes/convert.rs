use axum::{
    extract::{Multipart, State},
    response::Response,
};
use std::sync::Arc;
use tracing::info;

use crate::{app_error::AppError, handlers::convert_handler, state::app_state::AppState};

pub async fn handle_convert(
    state: State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    info!("Handling audio to video conversion request");
    convert_handler::handle_convert(state, multipart).await
}
