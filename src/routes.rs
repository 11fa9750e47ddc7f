use std::sync::Arc;

use log::{debug, error, warn, Logger};
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::BackendError;
use rejection::FlattenedRejection;

pub mod admin;
mod handlers;
pub mod query;
mod rejection;
mod response;

pub use internal::*;

/// The largest JSON body to accept.
const MAX_CONTENT_LENGTH: u64 = 1024 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else if status == StatusCode::NOT_FOUND {
            debug!(logger, "Not found"; "context" => ?r.context, "message" => %r.error);
        } else {
            warn!(logger, "Rejected request"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        return Ok(with_status(json(&r.flatten()), status));
    }

    if let Some(e) = rej.find::<BodyDeserializeError>() {
        warn!(logger, "Malformed request body"; "message" => %e);
        return Ok(malformed(e.to_string()));
    }

    if let Some(e) = rej.find::<reject::InvalidQuery>() {
        warn!(logger, "Malformed query string"; "message" => %e);
        return Ok(malformed(e.to_string()));
    }

    Err(rej)
}

fn malformed(message: String) -> WithStatus<Json> {
    with_status(
        json(&FlattenedRejection::malformed(message)),
        StatusCode::BAD_REQUEST,
    )
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        BadRequest | Validation { .. } => StatusCode::BAD_REQUEST,
        NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use warp::body::{content_length_limit, json};
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, patch, path as p, path::param as par, post, put, query};

    use super::handlers::{self, Authored, StatusChange, VerificationChange};
    use super::{query as q, MAX_CONTENT_LENGTH};
    use crate::article::{ArticlePatch, NewArticle};
    use crate::environment::Environment;
    use crate::organizer::{NewOrganizer, OrganizerPatch};

    pub type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
        ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
        ($route_variable:ident; $first:expr, $($rest:expr),+) => (
            let $route_variable = $route_variable.and($first);
            route_filter!($route_variable; $($rest),+);
        )
    }

    macro_rules! route {
        ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
            pub fn $name(environment: Environment) -> Route {
                let $route_variable = warp::any()
                    .map(move || environment.clone());

                route_filter!($route_variable; $($filters),+);

                $route_variable.and_then(handlers::$handler)
                    .boxed()
            }
        );
    }

    route!(make_list_articles_route => list_articles, rt; p("articles"), end(), g(), query::<q::ArticleListQuery>());
    route!(make_published_articles_route => list_published_articles, rt; p("articles"), p("published"), p("list"), end(), g(), query::<q::ArticleListQuery>());
    route!(make_article_tags_route => article_tags, rt; p("articles"), p("tags"), end(), g());
    route!(make_article_by_slug_route => article_by_slug, rt; p("articles"), p("slug"), par::<String>(), end(), g());
    route!(make_retrieve_article_route => retrieve_article, rt; p("articles"), par::<String>(), end(), g());
    route!(make_create_article_route => create_article, rt; p("articles"), end(), post(), content_length_limit(MAX_CONTENT_LENGTH), json::<Authored<NewArticle>>());
    route!(make_update_article_route => update_article, rt; p("articles"), par::<String>(), end(), put(), content_length_limit(MAX_CONTENT_LENGTH), json::<Authored<ArticlePatch>>());
    route!(make_article_status_route => update_article_status, rt; p("articles"), par::<String>(), p("status"), end(), patch(), content_length_limit(MAX_CONTENT_LENGTH), json::<Authored<StatusChange>>());
    route!(make_delete_article_route => delete_article, rt; p("articles"), par::<String>(), end(), delete());

    route!(make_list_organizers_route => list_organizers, rt; p("organizers"), end(), g(), query::<q::OrganizerListQuery>());
    route!(make_verified_organizers_route => list_verified_organizers, rt; p("organizers"), p("public"), p("verified"), end(), g(), query::<q::OrganizerListQuery>());
    route!(make_organizer_categories_route => organizer_categories, rt; p("organizers"), p("categories"), end(), g());
    route!(make_organizer_by_slug_route => organizer_by_slug, rt; p("organizers"), p("slug"), par::<String>(), end(), g());
    route!(make_retrieve_organizer_route => retrieve_organizer, rt; p("organizers"), par::<String>(), end(), g());
    route!(make_organizer_shows_route => organizer_shows, rt; p("organizers"), par::<String>(), p("shows"), end(), g());
    route!(make_organizer_stats_route => organizer_stats, rt; p("organizers"), par::<String>(), p("stats"), end(), g());
    route!(make_create_organizer_route => create_organizer, rt; p("organizers"), end(), post(), content_length_limit(MAX_CONTENT_LENGTH), json::<Authored<NewOrganizer>>());
    route!(make_update_organizer_route => update_organizer, rt; p("organizers"), par::<String>(), end(), put(), content_length_limit(MAX_CONTENT_LENGTH), json::<Authored<OrganizerPatch>>());
    route!(make_organizer_status_route => update_organizer_status, rt; p("organizers"), par::<String>(), p("status"), end(), patch(), content_length_limit(MAX_CONTENT_LENGTH), json::<Authored<StatusChange>>());
    route!(make_organizer_verification_route => update_organizer_verification, rt; p("organizers"), par::<String>(), p("verification"), end(), patch(), content_length_limit(MAX_CONTENT_LENGTH), json::<Authored<VerificationChange>>());
    route!(make_delete_organizer_route => delete_organizer, rt; p("organizers"), par::<String>(), end(), delete());

    /// Every public route, most specific paths first.
    pub fn make_routes(environment: Environment) -> Route {
        let e = || environment.clone();

        make_published_articles_route(e())
            .or(make_article_tags_route(e()))
            .unify()
            .or(make_article_by_slug_route(e()))
            .unify()
            .or(make_list_articles_route(e()))
            .unify()
            .or(make_create_article_route(e()))
            .unify()
            .or(make_article_status_route(e()))
            .unify()
            .or(make_retrieve_article_route(e()))
            .unify()
            .or(make_update_article_route(e()))
            .unify()
            .or(make_delete_article_route(e()))
            .unify()
            .or(make_verified_organizers_route(e()))
            .unify()
            .or(make_organizer_categories_route(e()))
            .unify()
            .or(make_organizer_by_slug_route(e()))
            .unify()
            .or(make_list_organizers_route(e()))
            .unify()
            .or(make_create_organizer_route(e()))
            .unify()
            .or(make_organizer_shows_route(e()))
            .unify()
            .or(make_organizer_stats_route(e()))
            .unify()
            .or(make_organizer_status_route(e()))
            .unify()
            .or(make_organizer_verification_route(e()))
            .unify()
            .or(make_retrieve_organizer_route(e()))
            .unify()
            .or(make_update_organizer_route(e()))
            .unify()
            .or(make_delete_organizer_route(e()))
            .unify()
            .boxed()
    }
}
