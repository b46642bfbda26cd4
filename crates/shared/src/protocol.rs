use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ArticleId, ArticleStatus, AuthorSummary};

pub const DASHBOARD_ROUTE: &str = "/dashboard";
pub const ARTICLE_CREATED_MESSAGE: &str = "Article created successfully!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub last_page: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let page_size = page_size.max(1);
        let pages = total.div_ceil(u64::from(page_size)).max(1);
        Self {
            page,
            page_size,
            total,
            last_page: u32::try_from(pages).unwrap_or(u32::MAX),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of articles as rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardView {
    pub articles: Vec<ArticleSummary>,
    pub pagination: Pagination,
}

/// Success signal for the creation form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCreated {
    pub article: ArticleSummary,
    pub message: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewsUpdated {
    pub article_id: ArticleId,
    pub views_count: i64,
}
