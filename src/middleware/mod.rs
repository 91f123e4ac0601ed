pub mod auth;
pub mod error_page;
pub mod flash;
pub mod path;
