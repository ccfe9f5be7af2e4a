pub mod scrape;
pub mod ui;
