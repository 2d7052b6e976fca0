//! Field extraction from listing page snapshots.
//!
//! Every extractor works on a parsed HTML snapshot and degrades to the
//! `N/A` sentinel instead of failing. The snapshot is parsed and dropped
//! inside [`extract_listing`], so nothing here is held across an await.

pub mod checkpoint;
pub mod description;
pub mod odometer;
pub mod posted;
pub mod price;
pub mod seller;
pub mod strategy;
pub mod text;
pub mod title;

use chrono::{DateTime, Local};
use scraper::Html;

pub use checkpoint::is_checkpoint;
pub use description::Description;
pub use posted::PostedTime;

use crate::models::ListingRecord;

/// Fields extracted from a listing page that is not a challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFields {
    pub title: String,
    pub title_looks_bad: bool,
    pub price: String,
    pub odometer: String,
    pub seller: String,
    pub description: String,
    pub posted: Option<PostedTime<Local>>,
}

impl ListingFields {
    /// Copy the fields onto `record`, deriving its age relative to `now`.
    pub fn apply_to(self, record: &mut ListingRecord, now: DateTime<Local>) {
        record.title = self.title;
        record.title_looks_bad = self.title_looks_bad;
        record.price = self.price;
        record.odometer = self.odometer;
        record.seller = self.seller;
        record.description = self.description;
        if let Some(posted) = self.posted {
            record.set_creation_time(posted.at, now);
            record.raw_time_text = Some(posted.raw_text);
        }
    }
}

/// Outcome of running the extraction pipeline on one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Fields(ListingFields),
    /// A challenge was embedded in the page content.
    Blocked,
}

/// Run every extractor over `html`.
///
/// Odometer and seller extraction are skipped when the description step
/// reports a security challenge.
pub fn extract_listing(html: &str, now: DateTime<Local>) -> Extraction {
    let document = Html::parse_document(html);

    let posted = posted::find_posted_time(&document, now);
    let title = title::extract_title(&document);
    let title_looks_bad = title::is_bad_title(&title);
    let price = price::extract_price(&document);

    let description = match description::extract_description(&document) {
        Description::SecurityCheckRequired => return Extraction::Blocked,
        other => other.into_field(),
    };

    Extraction::Fields(ListingFields {
        title,
        title_looks_bad,
        price,
        odometer: odometer::extract_odometer(&document),
        seller: seller::extract_seller(&document),
        description,
        posted,
    })
}
