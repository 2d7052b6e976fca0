//! DOM vocabulary of the marketplace pages.

pub const MARKETPLACE_ORIGIN: &str = "https://www.facebook.com";

/// Anchors of feed items.
pub const FEED_ITEM_LINKS: &str = "a[href*='/marketplace/item/']";

pub const LISTING_HEADING: &str = "h1";

pub const BODY: &str = "body";

/// Controls that expand a truncated description.
pub const SEE_MORE_CONTROLS: &str = "div[role='button'], button";
pub const SEE_MORE_TEXT: &str = "See more";
pub const SEE_MORE_MAX_CLICKS: usize = 4;

/// Minimum-price filter inputs, most specific first.
pub const MIN_PRICE_INPUTS: &[&str] = &[
    "input[aria-label='Minimum range']",
    "input[aria-label*='Minimum']",
    "input[placeholder='Min.']",
    "input[placeholder*='Min']",
];
