//! Askama filters used by the layout.

use std::fmt::Display;

/// Content hash of `static/css/main.css`, computed by `build.rs`.
const CSS_HASH: &str = env!("CSS_HASH");

/// Public URL of a static asset, cache-busted with the stylesheet hash.
///
/// `{{ "css/main.css"|asset_url }}` renders `/static/css/main.css?v=<hash>`.
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn asset_url(path: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format!("/static/{path}?v={CSS_HASH}"))
}

/// The current year, for the footer.
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}
