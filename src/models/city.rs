//! Configured marketplace feeds.

use serde::{Deserialize, Serialize};

const FEED_QUERY: &str = "sortBy=creation_time_descend&topLevelVehicleType=car_truck&exact=false";

/// A city feed to crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityTarget {
    pub name: String,
    pub url: String,
}

impl CityTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Vehicle feed for a marketplace location slug, newest listings first.
    pub fn vehicles(name: &str, slug: &str) -> Self {
        Self::new(
            name,
            format!("https://www.facebook.com/marketplace/{slug}/vehicles/?{FEED_QUERY}"),
        )
    }

    /// Cities crawled when the config file does not list any.
    pub fn defaults() -> Vec<Self> {
        [
            ("montreal", "montreal"),
            ("quebec", "quebec"),
            ("london", "london_ontario"),
            ("toronto", "toronto"),
            ("barrie", "barrie"),
            ("sudbury", "sudbury"),
            ("sault ste. marie", "106087732763236"),
            ("timmins", "114723638540069"),
            ("north bay", "105535069479513"),
            ("windsor", "windsor"),
            ("sarnia", "106099112755478"),
            ("thunder bay", "111551465530472"),
            ("peterborough", "107401009289940"),
            ("ottawa", "106021666096708"),
            ("kitchener", "104045032964460"),
        ]
        .into_iter()
        .map(|(name, slug)| Self::vehicles(name, slug))
        .collect()
    }
}
