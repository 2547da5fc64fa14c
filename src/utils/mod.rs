#[cfg(feature = "google_oauth2")]
pub mod oauth2;
pub(crate) mod parser;
pub mod credential;
pub(crate) mod reqwest;
