use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::http::{ok, AppState};
use crate::services::catalog::ProductQuery;
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ListParams {
    pub fn into_query(self, include_hidden: bool) -> ProductQuery {
        ProductQuery { page: self.page, per_page: self.per_page, category: self.category, search: self.search, include_hidden }
    }
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.list_products(&p.into_query(false)).await?))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    Ok(ok(s.services.product(id, false).await?))
}
