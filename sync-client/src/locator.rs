//! Table locators from browser links.
//!
//! A shared table link looks like
//! `https://host/base/<app_token>?table=<table_id>&view=<view_id>`.

use reqwest::Url;
use tablesync_types::TableLocator;
use thiserror::Error;

/// Errors from parsing a table link.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// The link is not a valid URL.
    #[error("invalid table url: {0}")]
    InvalidUrl(String),

    /// The link has no app token path segment.
    #[error("table url has no app token: {0}")]
    MissingAppToken(String),

    /// The link has no `table` query parameter.
    #[error("table url has no table id: {0}")]
    MissingTableId(String),
}

/// Parse a table link into a [`TableLocator`].
///
/// The view is kept whenever the link names one; the HTTP remote decides
/// whether to pass it on.
pub fn parse_table_url(link: &str) -> Result<TableLocator, LocatorError> {
    let url = Url::parse(link.trim()).map_err(|e| LocatorError::InvalidUrl(e.to_string()))?;

    let app_token = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| LocatorError::MissingAppToken(link.to_string()))?;

    let query_value = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };

    let table_id =
        query_value("table").ok_or_else(|| LocatorError::MissingTableId(link.to_string()))?;

    let locator = TableLocator::new(&app_token, &table_id)
        .map_err(|e| LocatorError::InvalidUrl(e.to_string()))?;

    Ok(match query_value("view") {
        Some(view) => locator.with_view(&view),
        None => locator,
    })
}
