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

const SEARCH_FIELDS: &[&str] = &["name", "description", "email"];

/// The categories an organizer can pick from.
pub const CATEGORIES: [&str; 10] = [
    "music",
    "theater",
    "comedy",
    "dance",
    "art",
    "sports",
    "conference",
    "workshop",
    "festival",
    "other",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizerStatus {
    Pending,
    Active,
    Suspended,
    Inactive,
}

impl OrganizerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizerStatus::Pending => "pending",
            OrganizerStatus::Active => "active",
            OrganizerStatus::Suspended => "suspended",
            OrganizerStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrganizerStatus::Pending),
            "active" => Some(OrganizerStatus::Active),
            "suspended" => Some(OrganizerStatus::Suspended),
            "inactive" => Some(OrganizerStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SocialMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
}

/// Contact and presentation details shared by stored organizers and
/// creation requests.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_media: Option<SocialMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_registration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialties: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organizer {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub email: String,
    pub category: String,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default)]
    pub status: Option<OrganizerStatus>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_notes: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub verified_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub created_by: String,
    pub updated_by: String,
}

impl Entity for Organizer {
    const KIND: &'static str = "Organizer";
    const COLLECTION: &'static str = "organizers";
    const NAME_FIELD: &'static str = "name";

    // new organizers always start unverified and awaiting review
    fn on_create(fields: &mut Fields, _now: &Value) {
        fields.insert("status".to_owned(), Value::from(OrganizerStatus::Pending.as_str()));
        fields.insert("verified".to_owned(), Value::Bool(false));
        fields.insert("followersCount".to_owned(), Value::from(0));
    }

    fn on_update(_existing: &Fields, patch: &mut Fields, _now: &Value) {
        patch.remove("followersCount");
    }
}

/// The body of a request to create an organizer.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrganizer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub category: String,
    #[serde(flatten)]
    pub profile: Profile,
}

impl NewOrganizer {
    pub fn validate(&self) -> Result<(), BackendError> {
        require_non_blank("name", &self.name)?;
        require_non_blank("email", &self.email)?;
        require_non_blank("category", &self.category)?;

        if !self.email.contains('@') {
            return Err(BackendError::validation("email", "must be an email address"));
        }

        Ok(())
    }
}

/// The fields an update may change. Absent fields are left alone;
/// nested objects like `address` are replaced whole.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrganizerStatus>,
    #[serde(flatten)]
    pub profile: Profile,
}

impl OrganizerPatch {
    /// Fields that are present have to meet the same rules as on
    /// creation.
    pub fn validate(&self) -> Result<(), BackendError> {
        let required = [("name", &self.name), ("email", &self.email), ("category", &self.category)];

        for (field, value) in required.iter() {
            if let Some(value) = value {
                require_non_blank(*field, value)?;
            }
        }

        match &self.email {
            Some(email) if !email.contains('@') => Err(BackendError::validation("email", "must be an email address")),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrganizerSort {
    CreatedAt,
    UpdatedAt,
    Name,
    Rating,
    FollowersCount,
}

impl OrganizerSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(OrganizerSort::CreatedAt),
            "updatedAt" => Some(OrganizerSort::UpdatedAt),
            "name" => Some(OrganizerSort::Name),
            "rating" => Some(OrganizerSort::Rating),
            "followersCount" => Some(OrganizerSort::FollowersCount),
            _ => None,
        }
    }

    fn order(self, direction: SortOrder) -> Order {
        let (field, kind) = match self {
            OrganizerSort::CreatedAt => ("createdAt", SortKind::Timestamp),
            OrganizerSort::UpdatedAt => ("updatedAt", SortKind::Timestamp),
            OrganizerSort::Name => ("name", SortKind::Text),
            OrganizerSort::Rating => ("rating", SortKind::Number),
            OrganizerSort::FollowersCount => ("followersCount", SortKind::Number),
        };

        Order { field, kind, direction }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrganizerFilter {
    pub status: StatusFilter<OrganizerStatus>,
    pub category: Option<String>,
    pub verified: Option<bool>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Matches organizers with at least one of these tags.
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<OrganizerSort>,
    pub sort_order: Option<SortOrder>,
}

impl OrganizerFilter {
    fn criteria(&self) -> Criteria {
        let mut filters = Vec::new();
        filters.extend(self.status.to_filter("status", OrganizerStatus::as_str));

        let text_filters = [
            ("category", &self.category),
            ("address.city", &self.city),
            ("address.state", &self.state),
            ("address.country", &self.country),
        ];

        for (field, value) in text_filters.iter() {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                filters.push(Filter::equals(*field, value));
            }
        }

        if let Some(verified) = self.verified {
            filters.push(Filter::equals("verified", verified));
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
            order: self
                .sort_by
                .unwrap_or(OrganizerSort::CreatedAt)
                .order(self.sort_order.unwrap_or_default()),
            page: Page::new(self.page, self.limit),
        }
    }
}

/// Placeholder figures until shows and bookings exist; only the
/// follower count is real.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerStats {
    pub total_shows: u64,
    pub active_shows: u64,
    pub total_bookings: u64,
    pub total_revenue: f64,
    pub average_rating: f64,
    pub total_reviews: u64,
    pub followers_count: u64,
}

#[derive(Clone)]
pub struct OrganizerService {
    logger: Arc<Logger>,
    selector: Arc<Selector>,
}

impl OrganizerService {
    pub fn new(logger: Arc<Logger>, selector: Arc<Selector>) -> Self {
        OrganizerService {
            logger: Arc::new(logger.new(o!("service" => "organizers"))),
            selector,
        }
    }

    async fn records(&self) -> Records<Organizer> {
        Records::new(self.selector.resolve().await)
    }

    pub async fn list(&self, filter: &OrganizerFilter) -> Result<Listing<Organizer>, BackendError> {
        let records = self.records().await;
        debug!(self.logger, "Listing organizers"; "backend" => records.backend().name());

        records.list(&filter.criteria()).await
    }

    /// Lists active, verified organizers. Any status or verification
    /// condition in `filter` is ignored.
    pub async fn list_verified(&self, filter: &OrganizerFilter) -> Result<Listing<Organizer>, BackendError> {
        let filter = OrganizerFilter {
            status: StatusFilter::Only(OrganizerStatus::Active),
            verified: Some(true),
            ..filter.clone()
        };

        self.list(&filter).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Organizer>, BackendError> {
        self.records().await.get_by_id(id).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Organizer>, BackendError> {
        self.records().await.get_by_slug(slug).await
    }

    /// Registers a new organizer as pending and unverified. Email
    /// addresses aren't checked for uniqueness.
    pub async fn create(&self, organizer: NewOrganizer, actor: &str) -> Result<Organizer, BackendError> {
        organizer.validate()?;

        let records = self.records().await;
        let created = records.create(to_fields(&organizer)?, actor).await?;
        debug!(self.logger, "Created organizer"; "id" => &created.id, "backend" => records.backend().name());

        Ok(created)
    }

    pub async fn update(&self, id: &str, patch: OrganizerPatch, actor: &str) -> Result<Option<Organizer>, BackendError> {
        patch.validate()?;

        let updated = self.records().await.update(id, to_fields(&patch)?, actor).await?;
        debug!(self.logger, "Updated organizer"; "id" => id, "found" => updated.is_some());

        Ok(updated)
    }

    pub async fn update_status(&self, id: &str, status: OrganizerStatus, actor: &str) -> Result<Option<Organizer>, BackendError> {
        let patch = OrganizerPatch {
            status: Some(status),
            ..OrganizerPatch::default()
        };

        self.update(id, patch, actor).await
    }

    /// Marks an organizer verified or unverified. Verifying records who
    /// did it and when; unverifying clears both.
    pub async fn update_verification(
        &self,
        id: &str,
        verified: bool,
        notes: Option<String>,
        actor: &str,
    ) -> Result<Option<Organizer>, BackendError> {
        let mut patch = Fields::new();
        patch.insert("verified".to_owned(), Value::Bool(verified));
        patch.insert("verificationNotes".to_owned(), notes.map_or(Value::Null, Value::from));

        if verified {
            patch.insert("verifiedAt".to_owned(), crate::records::now()?);
            patch.insert("verifiedBy".to_owned(), Value::from(actor));
        } else {
            patch.insert("verifiedAt".to_owned(), Value::Null);
            patch.insert("verifiedBy".to_owned(), Value::Null);
        }

        let updated = self.records().await.update(id, patch, actor).await?;
        debug!(self.logger, "Updated organizer verification"; "id" => id, "verified" => verified, "found" => updated.is_some());

        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, BackendError> {
        let deleted = self.records().await.delete(id).await?;
        debug!(self.logger, "Deleted organizer"; "id" => id, "found" => deleted);

        Ok(deleted)
    }

    pub fn categories(&self) -> Vec<&'static str> {
        CATEGORIES.to_vec()
    }

    /// The organizer's shows. Shows aren't stored yet, so this is always
    /// empty for a known organizer and `None` for an unknown one.
    pub async fn shows(&self, id: &str) -> Result<Option<Vec<Value>>, BackendError> {
        Ok(self.get_by_id(id).await?.map(|_| Vec::new()))
    }

    /// `None` if there's no such organizer.
    pub async fn stats(&self, id: &str) -> Result<Option<OrganizerStats>, BackendError> {
        let organizer = self.get_by_id(id).await?;

        Ok(organizer.map(|o| OrganizerStats {
            total_shows: 0,
            active_shows: 0,
            total_bookings: 0,
            total_revenue: 0.0,
            average_rating: 0.0,
            total_reviews: 0,
            followers_count: o.followers_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::mock::{MockConnector, MockDocumentStore};
    use crate::records::MemoryStore;

    fn service(available: bool) -> OrganizerService {
        let connector = Arc::new(MockConnector::new(Arc::new(MockDocumentStore::new()), available));
        let logger = Arc::new(log::discard());
        let selector = Selector::new(logger.clone(), connector, Arc::new(MemoryStore::new()));

        OrganizerService::new(logger, Arc::new(selector))
    }

    fn services() -> Vec<OrganizerService> {
        vec![service(true), service(false)]
    }

    fn new_organizer(name: &str, category: &str, city: &str) -> NewOrganizer {
        NewOrganizer {
            name: name.to_owned(),
            email: format!("{}@example.com", crate::slug::slugify(name)),
            category: category.to_owned(),
            profile: Profile {
                description: Some(format!("{} puts on shows", name)),
                address: Some(Address {
                    city: Some(city.to_owned()),
                    country: Some("India".to_owned()),
                    ..Address::default()
                }),
                ..Profile::default()
            },
        }
    }

    #[tokio::test]
    async fn second_page_of_fifteen() {
        let mut results = Vec::new();

        for organizers in services() {
            for n in 0..15 {
                organizers
                    .create(new_organizer(&format!("Organizer {}", n), "music", "Pune"), "admin-1")
                    .await
                    .expect("create organizer");
            }

            let page = organizers
                .list(&OrganizerFilter {
                    page: Some(2),
                    limit: Some(10),
                    sort_by: Some(OrganizerSort::Name),
                    sort_order: Some(SortOrder::Asc),
                    ..OrganizerFilter::default()
                })
                .await
                .expect("list organizers");

            assert_eq!(page.items.len(), 5);
            assert_eq!(page.pagination.current_page, 2);
            assert_eq!(page.pagination.total_pages, 2);
            assert_eq!(page.pagination.total_items, 15);
            assert!(!page.pagination.has_next);
            assert!(page.pagination.has_prev);

            results.push(page.items.into_iter().map(|o| o.name).collect::<Vec<_>>());
        }

        assert_eq!(results[0], results[1]);
    }

    #[tokio::test]
    async fn creation_sets_review_state() {
        for organizers in services() {
            let organizer = organizers
                .create(new_organizer("Laugh Factory!", "comedy", "Mumbai"), "admin-1")
                .await
                .expect("create organizer");

            assert_eq!(organizer.slug, "laugh-factory");
            assert_eq!(organizer.status, Some(OrganizerStatus::Pending));
            assert!(!organizer.verified);
            assert_eq!(organizer.followers_count, 0);
            assert_eq!(
                organizer.profile.address.as_ref().and_then(|a| a.city.as_deref()),
                Some("Mumbai")
            );
        }
    }

    #[tokio::test]
    async fn invalid_organizers_are_rejected() {
        let organizers = service(false);

        let mut no_at = new_organizer("Valid Name", "music", "Pune");
        no_at.email = "not-an-email".to_owned();
        assert!(matches!(
            organizers.create(no_at, "admin-1").await,
            Err(BackendError::Validation { field: "email", .. })
        ));

        let mut blank = new_organizer("Valid Name", "music", "Pune");
        blank.category = String::new();
        assert!(matches!(
            organizers.create(blank, "admin-1").await,
            Err(BackendError::Validation { field: "category", .. })
        ));
    }

    #[tokio::test]
    async fn verification_and_status() {
        for organizers in services() {
            let organizer = organizers
                .create(new_organizer("Big Top", "festival", "Goa"), "admin-1")
                .await
                .expect("create organizer");

            let verified = organizers
                .update_verification(&organizer.id, true, Some("Documents checked".to_owned()), "admin-2")
                .await
                .expect("verify")
                .expect("organizer exists");
            assert!(verified.verified);
            assert_eq!(verified.verified_by.as_deref(), Some("admin-2"));
            assert!(verified.verified_at.is_some());
            assert_eq!(verified.verification_notes.as_deref(), Some("Documents checked"));

            let listed = organizers
                .list_verified(&OrganizerFilter::default())
                .await
                .expect("list verified");
            assert_eq!(listed.pagination.total_items, 0, "pending organizers aren't listed");

            organizers
                .update_status(&organizer.id, OrganizerStatus::Active, "admin-2")
                .await
                .expect("activate")
                .expect("organizer exists");
            let listed = organizers
                .list_verified(&OrganizerFilter::default())
                .await
                .expect("list verified");
            assert_eq!(listed.pagination.total_items, 1);

            let unverified = organizers
                .update_verification(&organizer.id, false, None, "admin-3")
                .await
                .expect("unverify")
                .expect("organizer exists");
            assert!(!unverified.verified);
            assert_eq!(unverified.verified_at, None);
            assert_eq!(unverified.verified_by, None);
            assert_eq!(unverified.status, Some(OrganizerStatus::Active));
        }
    }

    #[tokio::test]
    async fn nested_filters_and_search() {
        for organizers in services() {
            organizers
                .create(new_organizer("Pune Players", "theater", "Pune"), "admin-1")
                .await
                .expect("create organizer");
            organizers
                .create(new_organizer("Mumbai Beats", "music", "Mumbai"), "admin-1")
                .await
                .expect("create organizer");
            organizers
                .create(new_organizer("Pune Beats", "music", "Pune"), "admin-1")
                .await
                .expect("create organizer");

            let in_pune = organizers
                .list(&OrganizerFilter {
                    city: Some("Pune".to_owned()),
                    category: Some("music".to_owned()),
                    ..OrganizerFilter::default()
                })
                .await
                .expect("filter organizers");
            assert_eq!(in_pune.items.len(), 1);
            assert_eq!(in_pune.items[0].name, "Pune Beats");

            let beats = organizers
                .list(&OrganizerFilter {
                    search: Some("beats@".to_owned()),
                    limit: Some(1),
                    ..OrganizerFilter::default()
                })
                .await
                .expect("search organizers");
            assert_eq!(beats.pagination.total_items, 2);
            assert_eq!(beats.pagination.total_pages, 2);
            assert_eq!(beats.items.len(), 1);
        }
    }

    #[tokio::test]
    async fn rename_stats_and_delete() {
        for organizers in services() {
            let organizer = organizers
                .create(new_organizer("Old Name", "art", "Delhi"), "admin-1")
                .await
                .expect("create organizer");

            let renamed = organizers
                .update(
                    &organizer.id,
                    OrganizerPatch {
                        name: Some("New Name".to_owned()),
                        ..OrganizerPatch::default()
                    },
                    "admin-2",
                )
                .await
                .expect("rename")
                .expect("organizer exists");
            assert_eq!(renamed.slug, "new-name");
            assert_eq!(renamed.email, organizer.email);
            assert_eq!(
                organizers.get_by_slug("new-name").await.expect("get by slug").map(|o| o.id),
                Some(organizer.id.clone())
            );

            let stats = organizers.stats(&organizer.id).await.expect("stats").expect("organizer exists");
            assert_eq!(stats.followers_count, 0);
            assert_eq!(stats.total_shows, 0);
            assert_eq!(organizers.stats("missing").await.expect("stats"), None);

            assert!(organizers.delete(&organizer.id).await.expect("delete"));
            assert!(!organizers.delete(&organizer.id).await.expect("delete again"));
            assert_eq!(organizers.get_by_id(&organizer.id).await.expect("get"), None);
        }
    }

    #[test]
    fn categories_are_fixed() {
        let organizers = service(false);

        assert_eq!(organizers.categories().len(), 10);
        assert_eq!(organizers.categories()[0], "music");
    }
}
