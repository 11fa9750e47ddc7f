use serde::{Deserialize, Serialize};
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_status, Reply},
};

use crate::article::{Article, ArticlePatch, ArticleStatus, NewArticle};
use crate::environment::{Environment, DEFAULT_ACTOR};
use crate::errors::BackendError;
use crate::organizer::{NewOrganizer, Organizer, OrganizerPatch, OrganizerStatus};
use crate::records::Entity;
use crate::routes::{
    query::{ArticleListQuery, OrganizerListQuery},
    rejection::{Context, Rejection},
    response::SuccessResponse,
};

type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

/// A write request body, with the ID of whoever is making it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authored<T> {
    #[serde(flatten)]
    pub body: T,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl<T> Authored<T> {
    pub fn actor(&self) -> String {
        self.user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_owned())
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationChange {
    pub verified: bool,
    #[serde(default)]
    pub verification_notes: Option<String>,
}

fn respond<T: Serialize>(status: StatusCode, data: T, message: impl Into<String>) -> Box<dyn Reply> {
    Box::new(with_status(json(&SuccessResponse::data(data, message)), status))
}

fn not_found<E: Entity>() -> BackendError {
    BackendError::NotFound { kind: E::KIND }
}

pub async fn list_articles(environment: Environment, query: ArticleListQuery) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::ListArticles, e);

    let filter = query.into_filter().map_err(error_handler)?;
    let listing = environment.articles.list(&filter).await.map_err(error_handler)?;

    Ok(respond(StatusCode::OK, listing, "Articles fetched successfully"))
}

pub async fn list_published_articles(environment: Environment, query: ArticleListQuery) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::ListPublishedArticles, e);

    let filter = query.into_filter().map_err(error_handler)?;
    let listing = environment.articles.list_published(&filter).await.map_err(error_handler)?;

    Ok(respond(StatusCode::OK, listing, "Published articles fetched successfully"))
}

pub async fn article_tags(environment: Environment) -> RouteResult {
    let tags = environment
        .articles
        .tags()
        .await
        .map_err(|e| Rejection::new(Context::ArticleTags, e))?;

    Ok(respond(StatusCode::OK, tags, "Tags fetched successfully"))
}

pub async fn retrieve_article(environment: Environment, id: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::RetrieveArticle { id: id.clone() }, e);

    let article = environment
        .articles
        .get_by_id(&id)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Article>()))?;

    Ok(respond(StatusCode::OK, article, "Article fetched successfully"))
}

/// Only published articles are visible by slug.
pub async fn article_by_slug(environment: Environment, slug: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::RetrieveArticleBySlug { slug: slug.clone() }, e);

    let article = environment
        .articles
        .get_by_slug(&slug)
        .await
        .map_err(error_handler)?
        .filter(|a| a.status == Some(ArticleStatus::Published))
        .ok_or_else(|| error_handler(not_found::<Article>()))?;

    Ok(respond(StatusCode::OK, article, "Article fetched successfully"))
}

pub async fn create_article(environment: Environment, request: Authored<NewArticle>) -> RouteResult {
    let actor = request.actor();
    let article = environment
        .articles
        .create(request.body, &actor)
        .await
        .map_err(|e| Rejection::new(Context::CreateArticle, e))?;

    Ok(respond(StatusCode::CREATED, article, "Article created successfully"))
}

pub async fn update_article(environment: Environment, id: String, request: Authored<ArticlePatch>) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::UpdateArticle { id: id.clone() }, e);

    let actor = request.actor();
    let article = environment
        .articles
        .update(&id, request.body, &actor)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Article>()))?;

    Ok(respond(StatusCode::OK, article, "Article updated successfully"))
}

pub async fn update_article_status(environment: Environment, id: String, request: Authored<StatusChange>) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::UpdateArticle { id: id.clone() }, e);

    let status = ArticleStatus::parse(&request.body.status)
        .ok_or_else(|| error_handler(BackendError::validation("status", "must be draft or published")))?;
    let actor = request.actor();

    let article = environment
        .articles
        .update_status(&id, status, &actor)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Article>()))?;

    let message = match status {
        ArticleStatus::Published => "Article published successfully",
        ArticleStatus::Draft => "Article unpublished successfully",
    };

    Ok(respond(StatusCode::OK, article, message))
}

pub async fn delete_article(environment: Environment, id: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::DeleteArticle { id: id.clone() }, e);

    if !environment.articles.delete(&id).await.map_err(error_handler)? {
        return Err(error_handler(not_found::<Article>()).into());
    }

    Ok(Box::new(json(&SuccessResponse::message("Article deleted successfully"))) as Box<dyn Reply>)
}

pub async fn list_organizers(environment: Environment, query: OrganizerListQuery) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::ListOrganizers, e);

    let filter = query.into_filter().map_err(error_handler)?;
    let listing = environment.organizers.list(&filter).await.map_err(error_handler)?;

    Ok(respond(StatusCode::OK, listing, "Organizers fetched successfully"))
}

pub async fn list_verified_organizers(environment: Environment, query: OrganizerListQuery) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::ListVerifiedOrganizers, e);

    let filter = query.into_filter().map_err(error_handler)?;
    let listing = environment.organizers.list_verified(&filter).await.map_err(error_handler)?;

    Ok(respond(StatusCode::OK, listing, "Verified organizers fetched successfully"))
}

pub async fn organizer_categories(environment: Environment) -> RouteResult {
    Ok(respond(
        StatusCode::OK,
        environment.organizers.categories(),
        "Categories fetched successfully",
    ))
}

pub async fn retrieve_organizer(environment: Environment, id: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::RetrieveOrganizer { id: id.clone() }, e);

    let organizer = environment
        .organizers
        .get_by_id(&id)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Organizer>()))?;

    Ok(respond(StatusCode::OK, organizer, "Organizer fetched successfully"))
}

pub async fn organizer_by_slug(environment: Environment, slug: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::RetrieveOrganizerBySlug { slug: slug.clone() }, e);

    let organizer = environment
        .organizers
        .get_by_slug(&slug)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Organizer>()))?;

    Ok(respond(StatusCode::OK, organizer, "Organizer fetched successfully"))
}

pub async fn organizer_shows(environment: Environment, id: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::OrganizerShows { id: id.clone() }, e);

    let shows = environment
        .organizers
        .shows(&id)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Organizer>()))?;

    Ok(respond(StatusCode::OK, shows, "Organizer shows fetched successfully"))
}

pub async fn organizer_stats(environment: Environment, id: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::OrganizerStats { id: id.clone() }, e);

    let stats = environment
        .organizers
        .stats(&id)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Organizer>()))?;

    Ok(respond(StatusCode::OK, stats, "Organizer stats fetched successfully"))
}

pub async fn create_organizer(environment: Environment, request: Authored<NewOrganizer>) -> RouteResult {
    let actor = request.actor();
    let organizer = environment
        .organizers
        .create(request.body, &actor)
        .await
        .map_err(|e| Rejection::new(Context::CreateOrganizer, e))?;

    Ok(respond(StatusCode::CREATED, organizer, "Organizer created successfully"))
}

pub async fn update_organizer(environment: Environment, id: String, request: Authored<OrganizerPatch>) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::UpdateOrganizer { id: id.clone() }, e);

    let actor = request.actor();
    let organizer = environment
        .organizers
        .update(&id, request.body, &actor)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Organizer>()))?;

    Ok(respond(StatusCode::OK, organizer, "Organizer updated successfully"))
}

pub async fn update_organizer_status(environment: Environment, id: String, request: Authored<StatusChange>) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::UpdateOrganizer { id: id.clone() }, e);

    let status = OrganizerStatus::parse(&request.body.status).ok_or_else(|| {
        error_handler(BackendError::validation(
            "status",
            "must be pending, active, suspended or inactive",
        ))
    })?;
    let actor = request.actor();

    let organizer = environment
        .organizers
        .update_status(&id, status, &actor)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Organizer>()))?;

    Ok(respond(StatusCode::OK, organizer, "Organizer status updated successfully"))
}

pub async fn update_organizer_verification(
    environment: Environment,
    id: String,
    request: Authored<VerificationChange>,
) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::UpdateOrganizer { id: id.clone() }, e);

    let actor = request.actor();
    let VerificationChange {
        verified,
        verification_notes,
    } = request.body;

    let organizer = environment
        .organizers
        .update_verification(&id, verified, verification_notes, &actor)
        .await
        .map_err(error_handler)?
        .ok_or_else(|| error_handler(not_found::<Organizer>()))?;

    let message = if verified {
        "Organizer verified successfully"
    } else {
        "Organizer unverified successfully"
    };

    Ok(respond(StatusCode::OK, organizer, message))
}

pub async fn delete_organizer(environment: Environment, id: String) -> RouteResult {
    let error_handler = |e: BackendError| Rejection::new(Context::DeleteOrganizer { id: id.clone() }, e);

    if !environment.organizers.delete(&id).await.map_err(error_handler)? {
        return Err(error_handler(not_found::<Organizer>()).into());
    }

    Ok(Box::new(json(&SuccessResponse::message("Organizer deleted successfully"))) as Box<dyn Reply>)
}
