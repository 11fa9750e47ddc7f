use std::sync::Arc;

use log::{debug, o, Logger};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::docstore::Fields;
use crate::errors::{require_non_blank, BackendError};
use crate::query::{Criteria, Filter, Listing, Order, Page, Search, SortKind, SortOrder, StatusFilter};
use crate::records::{to_fields, Entity, Records};
use crate::selector::Selector;

const SEARCH_FIELDS: &[&str] = &["title", "description", "content", "author"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ArticleStatus::Draft),
            "published" => Some(ArticleStatus::Published),
            _ => None,
        }
    }
}

impl Default for ArticleStatus {
    fn default() -> Self {
        ArticleStatus::Draft
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: Option<ArticleStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub created_by: String,
    pub updated_by: String,
}

impl Entity for Article {
    const KIND: &'static str = "Article";
    const COLLECTION: &'static str = "articles";
    const NAME_FIELD: &'static str = "title";

    fn on_create(fields: &mut Fields, now: &Value) {
        let published = is_published(fields.get("status"));
        fields.insert("publishedAt".to_owned(), if published { now.clone() } else { Value::Null });
    }

    // `publishedAt` only moves when an article goes from unpublished to
    // published, so unpublishing keeps the last publication time
    fn on_update(existing: &Fields, patch: &mut Fields, now: &Value) {
        patch.remove("publishedAt");

        if is_published(patch.get("status")) && !is_published(existing.get("status")) {
            patch.insert("publishedAt".to_owned(), now.clone());
        }
    }
}

fn is_published(status: Option<&Value>) -> bool {
    status.and_then(Value::as_str) == Some(ArticleStatus::Published.as_str())
}

/// The body of a request to create an article.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewArticle {
    pub fn validate(&self) -> Result<(), BackendError> {
        require_non_blank("title", &self.title)?;
        require_non_blank("author", &self.author)?;
        require_non_blank("description", &self.description)
    }
}

/// The fields an update may change. Absent fields are left alone.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ArticleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ArticlePatch {
    /// Fields that are present have to meet the same rules as on
    /// creation.
    pub fn validate(&self) -> Result<(), BackendError> {
        let required = [("title", &self.title), ("author", &self.author), ("description", &self.description)];

        for (field, value) in required.iter() {
            if let Some(value) = value {
                require_non_blank(*field, value)?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArticleSort {
    CreatedAt,
    UpdatedAt,
    PublishedAt,
    Title,
}

impl ArticleSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(ArticleSort::CreatedAt),
            "updatedAt" => Some(ArticleSort::UpdatedAt),
            "publishedAt" => Some(ArticleSort::PublishedAt),
            "title" => Some(ArticleSort::Title),
            _ => None,
        }
    }

    fn order(self, direction: SortOrder) -> Order {
        let (field, kind) = match self {
            ArticleSort::CreatedAt => ("createdAt", SortKind::Timestamp),
            ArticleSort::UpdatedAt => ("updatedAt", SortKind::Timestamp),
            ArticleSort::PublishedAt => ("publishedAt", SortKind::Timestamp),
            ArticleSort::Title => ("title", SortKind::Text),
        };

        Order { field, kind, direction }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArticleFilter {
    pub status: StatusFilter<ArticleStatus>,
    pub author: Option<String>,
    pub search: Option<String>,
    /// Matches articles with at least one of these tags.
    pub tags: Vec<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<ArticleSort>,
    pub sort_order: Option<SortOrder>,
}

impl ArticleFilter {
    fn criteria(&self, default_sort: ArticleSort) -> Criteria {
        let mut filters = Vec::new();
        filters.extend(self.status.to_filter("status", ArticleStatus::as_str));

        if let Some(author) = self.author.as_deref().filter(|a| !a.is_empty()) {
            filters.push(Filter::equals("author", author));
        }

        if !self.tags.is_empty() {
            filters.push(Filter::ContainsAny {
                field: "tags",
                values: self.tags.clone(),
            });
        }

        Criteria {
            filters,
            search: self.search.as_deref().and_then(|s| Search::new(s, SEARCH_FIELDS)),
            order: self.sort_by.unwrap_or(default_sort).order(self.sort_order.unwrap_or_default()),
            page: Page::new(self.page, self.limit),
        }
    }
}

#[derive(Clone)]
pub struct ArticleService {
    logger: Arc<Logger>,
    selector: Arc<Selector>,
}

impl ArticleService {
    pub fn new(logger: Arc<Logger>, selector: Arc<Selector>) -> Self {
        ArticleService {
            logger: Arc::new(logger.new(o!("service" => "articles"))),
            selector,
        }
    }

    async fn records(&self) -> Records<Article> {
        Records::new(self.selector.resolve().await)
    }

    /// Lists articles for the admin view, newest first by default.
    pub async fn list(&self, filter: &ArticleFilter) -> Result<Listing<Article>, BackendError> {
        let records = self.records().await;
        debug!(self.logger, "Listing articles"; "backend" => records.backend().name());

        records.list(&filter.criteria(ArticleSort::CreatedAt)).await
    }

    /// Lists published articles only, most recently published first by
    /// default. Any status in `filter` is ignored.
    pub async fn list_published(&self, filter: &ArticleFilter) -> Result<Listing<Article>, BackendError> {
        let filter = ArticleFilter {
            status: StatusFilter::Only(ArticleStatus::Published),
            ..filter.clone()
        };
        let records = self.records().await;
        debug!(self.logger, "Listing published articles"; "backend" => records.backend().name());

        records.list(&filter.criteria(ArticleSort::PublishedAt)).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Article>, BackendError> {
        self.records().await.get_by_id(id).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>, BackendError> {
        self.records().await.get_by_slug(slug).await
    }

    pub async fn create(&self, article: NewArticle, actor: &str) -> Result<Article, BackendError> {
        article.validate()?;

        let records = self.records().await;
        let created = records.create(to_fields(&article)?, actor).await?;
        debug!(self.logger, "Created article"; "id" => &created.id, "backend" => records.backend().name());

        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: ArticlePatch, actor: &str) -> Result<Option<Article>, BackendError> {
        patch.validate()?;

        let records = self.records().await;
        let updated = records.update(id, to_fields(&patch)?, actor).await?;
        debug!(self.logger, "Updated article"; "id" => id, "found" => updated.is_some());

        Ok(updated)
    }

    /// Publishes or unpublishes an article.
    pub async fn update_status(&self, id: &str, status: ArticleStatus, actor: &str) -> Result<Option<Article>, BackendError> {
        let patch = ArticlePatch {
            status: Some(status),
            ..ArticlePatch::default()
        };

        self.update(id, patch, actor).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, BackendError> {
        let deleted = self.records().await.delete(id).await?;
        debug!(self.logger, "Deleted article"; "id" => id, "found" => deleted);

        Ok(deleted)
    }

    /// Every tag used by any article, in the order first seen.
    pub async fn tags(&self) -> Result<Vec<String>, BackendError> {
        let mut tags: Vec<String> = Vec::new();

        for article in self.records().await.scan().await? {
            for tag in article.tags {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }

        Ok(tags)
    }
}
