use std::fmt::Display;

use serde_json::Value;
use shared::{
    domain::{ArticleId, UserId},
    error::{ApiError, ErrorCode, FieldErrors},
    protocol::{
        ArticleCreated, DashboardView, Pagination, ViewsUpdated, ARTICLE_CREATED_MESSAGE,
        DASHBOARD_ROUTE,
    },
    validation::{ArticleForm, ArticleInput, ArticleRules},
};
use storage::{now_micros, ArticleQuery, Storage, StoreError};
use tracing::{error, info, warn};

/// Articles shown per dashboard page.
pub const PAGE_SIZE: u32 = 10;

const MAX_USERNAME_CHARS: usize = 64;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub rules: ArticleRules,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            rules: ArticleRules::default(),
        }
    }
}

pub fn dashboard_route() -> &'static str {
    DASHBOARD_ROUTE
}

pub fn article_store_route() -> &'static str {
    "/posts/store"
}

pub fn published_articles_route() -> &'static str {
    "/articles/published"
}

pub fn draft_articles_route() -> &'static str {
    "/articles/drafts"
}

pub fn article_views_route() -> &'static str {
    "/articles/:article_id/views"
}

/// Newest articles of every status, with their authors, one page at a time.
///
/// Pages start at 1; page 0 is read as page 1 and pages past the end are empty.
pub async fn show_dashboard(ctx: &ApiContext, page: u32) -> Result<DashboardView, ApiError> {
    list_page(ctx.storage.articles(), page).await
}

pub async fn list_published(ctx: &ApiContext, page: u32) -> Result<DashboardView, ApiError> {
    list_page(ctx.storage.articles().published(), page).await
}

pub async fn list_drafts(ctx: &ApiContext, page: u32) -> Result<DashboardView, ApiError> {
    list_page(ctx.storage.articles().drafts(), page).await
}

async fn list_page(query: ArticleQuery<'_>, page: u32) -> Result<DashboardView, ApiError> {
    // total and rows must agree on what is published
    let query = query.as_of(now_micros());
    let total = query.count().await.map_err(store_error)?;
    let pagination = Pagination::new(page.max(1), PAGE_SIZE, total);
    let articles = query
        .fetch_page(PAGE_SIZE, pagination.offset())
        .await
        .map_err(store_error)?;

    Ok(DashboardView {
        articles: articles.iter().map(|article| article.summary()).collect(),
        pagination,
    })
}

/// Validates the submitted form and stores the article for `author`.
///
/// Validation finishes before anything is written; on failure every
/// offending field is reported.
pub async fn create_article(
    ctx: &ApiContext,
    author: UserId,
    form: &ArticleForm,
) -> Result<ArticleCreated, ApiError> {
    store_article(ctx, author, ctx.rules.validate(form)).await
}

/// [`create_article`] for a raw JSON body; fields of the wrong type are
/// reported alongside the other violations.
pub async fn create_article_from_json(
    ctx: &ApiContext,
    author: UserId,
    body: &Value,
) -> Result<ArticleCreated, ApiError> {
    store_article(ctx, author, ctx.rules.validate_json(body)).await
}

async fn store_article(
    ctx: &ApiContext,
    author: UserId,
    validated: Result<ArticleInput, FieldErrors>,
) -> Result<ArticleCreated, ApiError> {
    let input = validated.map_err(|fields| {
        warn!(user_id = %author, %fields, "article form rejected");
        ApiError::validation(fields)
    })?;

    let article = ctx
        .storage
        .create_article(author, &input)
        .await
        .map_err(store_error)?;
    info!(
        article_id = %article.id,
        user_id = %author,
        slug = %article.slug,
        status = %article.status,
        "article created"
    );

    Ok(ArticleCreated {
        article: article.summary(),
        message: ARTICLE_CREATED_MESSAGE.to_string(),
        redirect_to: dashboard_route().to_string(),
    })
}

pub async fn increment_views(ctx: &ApiContext, article_id: ArticleId) -> Result<ViewsUpdated, ApiError> {
    let views_count = ctx
        .storage
        .increment_views(article_id)
        .await
        .map_err(store_error)?;
    Ok(ViewsUpdated {
        article_id,
        views_count,
    })
}

/// Stand-in for the identity provider: returns the id for `username`,
/// creating the user on first sight.
pub async fn register_user(ctx: &ApiContext, username: &str) -> Result<UserId, ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "username cannot be empty"));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(ApiError::new(ErrorCode::Validation, "username is too long"));
    }
    ctx.storage.create_user(username).await.map_err(internal)
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Validation(fields) => ApiError::validation(fields),
        StoreError::NotFound(id) => {
            ApiError::new(ErrorCode::NotFound, format!("article {id} not found"))
        }
        StoreError::Database(e) => internal(e),
    }
}

fn internal(err: impl Display) -> ApiError {
    error!(error = %err, "storage failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
