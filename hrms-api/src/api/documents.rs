//! Employee document records
//!
//! Only metadata and a file URL are stored; file hosting lives elsewhere.

use crate::api::{clamp_limit, clamp_offset, ApiJson, ApiQuery, CurrentUser, DEFAULT_LIMIT};
use crate::error::{created, success, success_with};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hrms_common::roles::Role;
use hrms_common::time::now_rfc3339;
use hrms_common::validation::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list_documents).post(create_document))
        .route("/api/documents/stats", get(document_stats))
        .route("/api/documents/user/:user_id", get(user_documents))
        .route(
            "/api/documents/:id",
            get(get_document).put(update_document).delete(delete_document),
        )
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_size: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_DOCUMENT: &str = r#"
    SELECT d.*, u.name AS user_name
    FROM documents d
    LEFT JOIN users u ON u.id = d.user_id
"#;

/// Documents a caller may list
enum Visibility {
    All,
    Department(Option<String>),
    Own(String),
}

impl Visibility {
    fn for_user(current: &CurrentUser) -> Self {
        match current.role {
            Role::Admin | Role::Hr => Visibility::All,
            Role::Manager => Visibility::Department(current.department.clone()),
            _ => Visibility::Own(current.id.clone()),
        }
    }

    fn push_filter(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Visibility::All => {}
            Visibility::Department(department) => {
                qb.push(" AND u.department IS ").push_bind(department.clone());
            }
            Visibility::Own(user_id) => {
                qb.push(" AND d.user_id = ").push_bind(user_id.clone());
            }
        }
    }
}

fn can_access(current: &CurrentUser, owner_id: &str) -> bool {
    current.is_admin_or_hr() || current.id == owner_id
}

async fn find_document(db: &SqlitePool, id: &str) -> ApiResult<Document> {
    sqlx::query_as::<_, Document>(&format!("{} WHERE d.id = ?", SELECT_DOCUMENT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DocumentRequest {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "fileUrl")]
    pub file_url: Option<String>,
    #[serde(alias = "fileSize")]
    pub file_size: Option<i64>,
}

impl DocumentRequest {
    fn apply(self, document: &mut Document) {
        if let Some(title) = self.title {
            document.title = title.trim().to_string();
        }
        if let Some(category) = self.category {
            document.category = category;
        }
        if let Some(file_url) = self.file_url {
            document.file_url = file_url;
        }
        if self.description.is_some() {
            document.description = self.description;
        }
        if self.file_size.is_some() {
            document.file_size = self.file_size;
        }
    }
}

fn validate_document(document: &Document) -> ApiResult<()> {
    let mut v = Validator::new();
    v.min_len("title", &document.title, 1)
        .min_len("category", &document.category, 1)
        .min_len("file_url", &document.file_url, 1);
    if let Some(size) = document.file_size {
        v.check(size >= 0, "file_size", "\"file_size\" must not be negative");
    }
    v.finish()?;
    Ok(())
}

/// POST /api/documents
///
/// Admin and hr may file a document for someone else.
pub async fn create_document(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(mut req): ApiJson<DocumentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user_id = match req.user_id.take() {
        Some(user_id) if current.is_admin_or_hr() => user_id,
        _ => current.id.clone(),
    };

    let mut document = Document {
        id: Uuid::new_v4().to_string(),
        user_id,
        category: "other".into(),
        ..Default::default()
    };
    req.apply(&mut document);
    validate_document(&document)?;

    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO documents (id, user_id, title, category, description, file_url, file_size, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&document.id)
    .bind(&document.user_id)
    .bind(&document.title)
    .bind(&document.category)
    .bind(&document.description)
    .bind(&document.file_url)
    .bind(document.file_size)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    Ok(created(
        "Document created successfully",
        find_document(&state.db, &document.id).await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DocumentListQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/documents
pub async fn list_documents(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<DocumentListQuery>,
) -> ApiResult<Json<Value>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_DOCUMENT);
    qb.push(" WHERE 1 = 1");
    Visibility::for_user(&current).push_filter(&mut qb);
    if let Some(category) = query.category {
        qb.push(" AND d.category = ").push_bind(category);
    }
    qb.push(" ORDER BY d.created_at DESC LIMIT ")
        .push_bind(clamp_limit(query.limit, DEFAULT_LIMIT))
        .push(" OFFSET ")
        .push_bind(clamp_offset(query.offset));

    let documents = qb.build_query_as::<Document>().fetch_all(&state.db).await?;
    Ok(success(documents))
}

/// GET /api/documents/user/:user_id
pub async fn user_documents(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !can_access(&current, &user_id) {
        return Err(ApiError::forbidden("Access denied"));
    }
    let documents = sqlx::query_as::<_, Document>(&format!(
        "{} WHERE d.user_id = ? ORDER BY d.created_at DESC",
        SELECT_DOCUMENT
    ))
    .bind(&user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(success(documents))
}

/// GET /api/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let document = find_document(&state.db, &id).await?;
    if !can_access(&current, &document.user_id) {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(success(document))
}

/// PUT /api/documents/:id
pub async fn update_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(mut req): ApiJson<DocumentRequest>,
) -> ApiResult<Json<Value>> {
    let mut document = find_document(&state.db, &id).await?;
    if !can_access(&current, &document.user_id) {
        return Err(ApiError::forbidden("Access denied"));
    }

    req.user_id = None;
    req.apply(&mut document);
    validate_document(&document)?;

    sqlx::query(
        "UPDATE documents SET title = ?, category = ?, description = ?, file_url = ?, file_size = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&document.title)
    .bind(&document.category)
    .bind(&document.description)
    .bind(&document.file_url)
    .bind(document.file_size)
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    Ok(success_with(
        "Document updated successfully",
        find_document(&state.db, &id).await?,
    ))
}

/// DELETE /api/documents/:id
pub async fn delete_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let document = find_document(&state.db, &id).await?;
    if !can_access(&current, &document.user_id) {
        return Err(ApiError::forbidden("Access denied"));
    }
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    Ok(success_with("Document deleted successfully", Value::Null))
}

/// GET /api/documents/stats
///
/// Counts over the documents the caller can list.
pub async fn document_stats(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT d.category, COUNT(*) FROM documents d LEFT JOIN users u ON u.id = d.user_id WHERE 1 = 1",
    );
    Visibility::for_user(&current).push_filter(&mut qb);
    qb.push(" GROUP BY d.category");

    let rows = qb.build_query_as::<(String, i64)>().fetch_all(&state.db).await?;
    let total: i64 = rows.iter().map(|(_, count)| count).sum();
    let by_category: BTreeMap<String, i64> = rows.into_iter().collect();

    Ok(success(json!({
        "total": total,
        "byCategory": by_category,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: "u1".into(),
            name: "U".into(),
            email: "u@example.com".into(),
            role,
            department: Some("Ops".into()),
        }
    }

    #[test]
    fn test_visibility_by_role() {
        assert!(matches!(Visibility::for_user(&user(Role::Hr)), Visibility::All));
        assert!(matches!(
            Visibility::for_user(&user(Role::Manager)),
            Visibility::Department(Some(ref d)) if d == "Ops"
        ));
        assert!(matches!(
            Visibility::for_user(&user(Role::Employee)),
            Visibility::Own(ref id) if id == "u1"
        ));
    }

    #[test]
    fn test_owner_or_admin_hr_access() {
        assert!(can_access(&user(Role::Employee), "u1"));
        assert!(!can_access(&user(Role::Employee), "u2"));
        assert!(!can_access(&user(Role::Manager), "u2"));
        assert!(can_access(&user(Role::Admin), "u2"));
    }

    #[test]
    fn test_document_requires_url() {
        let document = Document {
            title: "Contract".into(),
            category: "contract".into(),
            ..Default::default()
        };
        assert!(validate_document(&document).is_err());
    }
}
