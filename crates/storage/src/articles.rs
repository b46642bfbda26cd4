use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use thiserror::Error;

use shared::{
    article::{derive_slug, excerpt_of},
    domain::{ArticleId, ArticleStatus, AuthorSummary, UserId},
    error::FieldErrors,
    protocol::ArticleSummary,
    validation::{ArticleInput, ArticleRules},
};

use crate::{encode_timestamp, now_micros, Storage};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("article {0} not found")]
    NotFound(ArticleId),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A fully derived row, written as is.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub author: UserId,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ArticleRecord {
    /// Applies slug and publication rules to validated input at instant `now`.
    pub fn derive(author: UserId, input: &ArticleInput, now: DateTime<Utc>) -> Self {
        Self {
            title: input.title.clone(),
            slug: derive_slug(input.slug.as_deref(), &input.title),
            excerpt: input.excerpt.clone(),
            content: input.content.clone(),
            featured_image: input.featured_image.clone(),
            author,
            status: input.status,
            published_at: (input.status == ArticleStatus::Published).then_some(now),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub id: ArticleId,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub author: AuthorSummary,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredArticle {
    pub fn excerpt(&self) -> String {
        excerpt_of(self.excerpt.as_deref(), &self.content)
    }

    pub fn summary(&self) -> ArticleSummary {
        ArticleSummary {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            excerpt: self.excerpt(),
            featured_image: self.featured_image.clone(),
            status: self.status,
            published_at: self.published_at,
            views_count: self.views_count,
            created_at: self.created_at,
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleScope {
    All,
    Published,
    Draft,
}

const ARTICLE_SELECT: &str = "SELECT a.id, a.title, a.slug, a.excerpt, a.content, a.featured_image,
        a.user_id, u.username, a.status, a.published_at, a.views_count, a.created_at, a.updated_at
     FROM articles a
     INNER JOIN users u ON u.id = a.user_id
     WHERE 1 = 1";

const ARTICLE_COUNT: &str = "SELECT COUNT(*)
     FROM articles a
     INNER JOIN users u ON u.id = a.user_id
     WHERE 1 = 1";

/// Lazy description of a filtered article listing.
///
/// Nothing runs until one of the fetch methods is awaited, and each call
/// queries current data again.
#[derive(Clone, Copy)]
pub struct ArticleQuery<'a> {
    storage: &'a Storage,
    scope: ArticleScope,
    author: Option<UserId>,
    as_of: Option<DateTime<Utc>>,
}

impl ArticleQuery<'_> {
    pub fn published(mut self) -> Self {
        self.scope = ArticleScope::Published;
        self
    }

    pub fn drafts(mut self) -> Self {
        self.scope = ArticleScope::Draft;
        self
    }

    pub fn by_author(mut self, author: UserId) -> Self {
        self.author = Some(author);
        self
    }

    /// Pins the instant the published scope is evaluated at. Defaults to
    /// the moment each query runs.
    pub fn as_of(mut self, instant: DateTime<Utc>) -> Self {
        self.as_of = Some(instant);
        self
    }

    pub fn scope(&self) -> ArticleScope {
        self.scope
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self.scope {
            ArticleScope::All => {}
            ArticleScope::Published => {
                let now = encode_timestamp(self.as_of.unwrap_or_else(now_micros));
                qb.push(" AND a.status = 'published' AND a.published_at IS NOT NULL AND a.published_at <= ")
                    .push_bind(now);
            }
            ArticleScope::Draft => {
                qb.push(" AND a.status = 'draft'");
            }
        }
        if let Some(author) = self.author {
            qb.push(" AND a.user_id = ").push_bind(author.0);
        }
    }

    pub async fn fetch_all(&self) -> Result<Vec<StoredArticle>, StoreError> {
        self.fetch(None).await
    }

    pub async fn fetch_page(&self, limit: u32, offset: u64) -> Result<Vec<StoredArticle>, StoreError> {
        self.fetch(Some((limit, offset))).await
    }

    async fn fetch(&self, window: Option<(u32, u64)>) -> Result<Vec<StoredArticle>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(ARTICLE_SELECT);
        self.push_filters(&mut qb);
        qb.push(" ORDER BY a.created_at DESC, a.id DESC");
        if let Some((limit, offset)) = window {
            qb.push(" LIMIT ")
                .push_bind(i64::from(limit))
                .push(" OFFSET ")
                .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = qb.build().fetch_all(self.storage.pool()).await?;
        rows.iter()
            .map(article_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(ARTICLE_COUNT);
        self.push_filters(&mut qb);
        let total: i64 = qb.build_query_scalar().fetch_one(self.storage.pool()).await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}

fn article_from_row(r: &SqliteRow) -> Result<StoredArticle, sqlx::Error> {
    let status: String = r.try_get("status")?;
    let status = status
        .parse::<ArticleStatus>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(StoredArticle {
        id: ArticleId(r.try_get("id")?),
        title: r.try_get("title")?,
        slug: r.try_get("slug")?,
        excerpt: r.try_get("excerpt")?,
        content: r.try_get("content")?,
        featured_image: r.try_get("featured_image")?,
        author: AuthorSummary {
            id: UserId(r.try_get("user_id")?),
            name: r.try_get("username")?,
        },
        status,
        published_at: r.try_get("published_at")?,
        views_count: r.try_get("views_count")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

impl Storage {
    pub fn articles(&self) -> ArticleQuery<'_> {
        ArticleQuery {
            storage: self,
            scope: ArticleScope::All,
            author: None,
            as_of: None,
        }
    }

    /// Validates, derives slug and publication time, then persists.
    pub async fn create_article(
        &self,
        author: UserId,
        input: &ArticleInput,
    ) -> Result<StoredArticle, StoreError> {
        ArticleRules::default()
            .check(input)
            .map_err(StoreError::Validation)?;

        let record = ArticleRecord::derive(author, input, now_micros());
        let id = self.insert_article_record(&record).await?;
        self.load_article(id).await?.ok_or(StoreError::NotFound(id))
    }

    pub async fn insert_article_record(&self, record: &ArticleRecord) -> Result<ArticleId, StoreError> {
        let created_at = encode_timestamp(record.created_at);
        let rec = sqlx::query(
            "INSERT INTO articles (title, slug, excerpt, content, featured_image, user_id, status, published_at, views_count, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
             RETURNING id",
        )
        .bind(&record.title)
        .bind(&record.slug)
        .bind(record.excerpt.as_deref())
        .bind(&record.content)
        .bind(record.featured_image.as_deref())
        .bind(record.author.0)
        .bind(record.status.as_str())
        .bind(record.published_at.map(encode_timestamp))
        .bind(&created_at)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(ArticleId(rec.get::<i64, _>(0)))
    }

    pub async fn load_article(&self, id: ArticleId) -> Result<Option<StoredArticle>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(ARTICLE_SELECT);
        qb.push(" AND a.id = ").push_bind(id.0);
        let row = qb.build().fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(article_from_row).transpose()?)
    }

    /// Adds one view in a single statement and returns the new count.
    pub async fn increment_views(&self, id: ArticleId) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "UPDATE articles SET views_count = views_count + 1, updated_at = ?
             WHERE id = ?
             RETURNING views_count",
        )
        .bind(encode_timestamp(now_micros()))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.get::<i64, _>(0))
            .ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
#[path = "tests/articles_tests.rs"]
mod tests;
