//! Data models for marketlead.

mod city;
mod listing;

pub use city::CityTarget;
pub use listing::{
    link_key, AdStatus, CreationTimeSource, ListingRecord, CREATION_TIME_FORMAT, UNKNOWN,
};
