use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::db::categories as repository;
use crate::error::AppError;
use crate::models::{Category, NewCategoryRequest, UpdateCategoryRequest};
use crate::state::AppState;

pub(super) async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = repository::fetch_categories(&state.db).await?;
    Ok(Json(categories))
}

pub(super) async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Category>, AppError> {
    let category = repository::find_category_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(category))
}

pub(super) async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<NewCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let Json(req) = payload?;
    req.validate()?;
    let category = repository::insert_category(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub(super) async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCategoryRequest>, JsonRejection>,
) -> Result<Json<Category>, AppError> {
    let Json(req) = payload?;
    req.validate()?;
    let category = repository::update_category(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(category))
}

pub(super) async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if repository::delete_category(&state.db, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
