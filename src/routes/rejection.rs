use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: Some(self.context.clone()),
            success: false,
            error: kind_of(&self.error),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Option<Context>,
    pub(crate) success: bool,
    pub(crate) error: &'static str,
    pub(crate) message: String,
}

impl FlattenedRejection {
    /// A rejection for a body or query string that couldn't be parsed.
    pub fn malformed(message: String) -> Self {
        FlattenedRejection {
            context: None,
            success: false,
            error: "bad_request",
            message,
        }
    }
}

fn kind_of(e: &BackendError) -> &'static str {
    use BackendError::*;

    match e {
        BadRequest | Validation { .. } => "bad_request",
        NotFound { .. } => "not_found",
        _ => "operation_failed",
    }
}

/// What the request was trying to do when it failed.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Context {
    ListArticles,
    ListPublishedArticles,
    ArticleTags,
    RetrieveArticle { id: String },
    RetrieveArticleBySlug { slug: String },
    CreateArticle,
    UpdateArticle { id: String },
    DeleteArticle { id: String },
    ListOrganizers,
    ListVerifiedOrganizers,
    RetrieveOrganizer { id: String },
    RetrieveOrganizerBySlug { slug: String },
    OrganizerShows { id: String },
    OrganizerStats { id: String },
    CreateOrganizer,
    UpdateOrganizer { id: String },
    DeleteOrganizer { id: String },
}
