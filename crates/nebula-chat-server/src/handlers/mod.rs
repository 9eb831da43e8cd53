pub mod chat;
pub mod health;
pub mod sessions;

use axum::extract::FromRequest;

use crate::utils::error::ApiError;

/// `Json` extractor whose rejections use the API's error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);
