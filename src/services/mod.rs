pub mod access;
pub mod catalog;
pub mod continue_watching;
pub mod home_feed;
pub mod identifiers;
pub mod normalize;
pub mod schema;
pub mod series_aggregator;
pub mod text;

pub use catalog::CatalogService;
