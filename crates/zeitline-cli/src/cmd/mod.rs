pub mod merge;
pub mod scrape;
