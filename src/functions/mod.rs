pub mod get_url;
pub mod markdown;
