mod server_catalog;
mod stats_reporter;

pub use server_catalog::ServerCatalog;
pub use stats_reporter::StatsReporter;
