pub mod handlers;
pub mod server;

// Re-export commonly used handler functions for convenience
pub use handlers::{load_urls_from_file, load_urls_from_source, parse_url_line, write_output};

pub use cmscout_core::report::{extract_url_path, generate_crawl_report, generate_detection_report};
