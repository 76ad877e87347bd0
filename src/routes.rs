use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::aggregator::Aggregator;
use crate::db::{Comic, Database, Image, User};

/// Releases shown on the "latest" view of a subscription.
const LATEST_PER_PAGE: i64 = 100;
/// Entries in a generated feed.
const FEED_ITEMS: i64 = 20;

pub struct AppState {
    pub db: Arc<Database>,
    pub aggregator: Arc<Aggregator>,
    pub site_url: String,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub comics: Vec<ComicListing>,
    pub key: Option<String>,
}

pub struct ComicListing {
    pub comic: Comic,
    pub release_count: i64,
    pub latest_date: Option<String>,
    pub latest_url: Option<String>,
    pub subscribed: bool,
}

#[derive(Template)]
#[template(path = "releases.html")]
pub struct ReleasesTemplate {
    pub title: String,
    pub subtitle: String,
    pub releases: Vec<ReleaseView>,
    pub nav: Nav,
    pub feed_url: Option<String>,
    pub website_url: Option<String>,
}

pub struct ReleaseView {
    pub comic_name: String,
    pub pub_date: String,
    pub day_url: String,
    pub images: Vec<Image>,
}

#[derive(Default)]
pub struct Nav {
    pub first: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

#[derive(Template)]
#[template(path = "crawl_status.html")]
pub struct CrawlStatusTemplate {
    pub crawling: bool,
}

#[derive(Template)]
#[template(path = "feed.xml")]
pub struct FeedTemplate {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub pub_date: String,
    pub description: String,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub enum AppError {
    NotFound,
    Forbidden,
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Forbidden => {
                (StatusCode::FORBIDDEN, "A valid secret key is required").into_response()
            }
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error: {}", err),
            )
                .into_response(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError::Internal(err.into())
    }
}

#[derive(Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

async fn require_user(state: &AppState, key: Option<&str>) -> Result<User, AppError> {
    let key = key.ok_or(AppError::Forbidden)?;
    state
        .db
        .get_user_by_key(key)
        .await?
        .ok_or(AppError::Forbidden)
}

fn day_path(prefix: &str, date: &str) -> String {
    format!("{}/{}", prefix, date.replace('-', "/"))
}

fn with_key(url: String, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("{url}?key={key}"),
        None => url,
    }
}

/// First/prev/next/last links relative to `current`, over an ascending list
/// of ISO dates (or month prefixes; they compare the same way).
fn date_nav<F>(dates: &[String], current: &str, to_url: F) -> Nav
where
    F: Fn(&str) -> String,
{
    Nav {
        first: dates
            .first()
            .filter(|d| d.as_str() < current)
            .map(|d| to_url(d)),
        prev: dates
            .iter()
            .rev()
            .find(|d| d.as_str() < current)
            .map(|d| to_url(d)),
        next: dates
            .iter()
            .find(|d| d.as_str() > current)
            .map(|d| to_url(d)),
        last: dates
            .last()
            .filter(|d| d.as_str() > current)
            .map(|d| to_url(d)),
    }
}

fn month_prefixes(dates: &[String]) -> Vec<String> {
    let mut months: Vec<String> = dates
        .iter()
        .filter_map(|d| d.get(..7).map(str::to_string))
        .collect();
    months.dedup();
    months
}

async fn release_views(
    state: &AppState,
    releases: Vec<crate::db::Release>,
    url_prefix_for: impl Fn(&crate::db::Release) -> String,
) -> Result<Vec<ReleaseView>, AppError> {
    let mut views = Vec::with_capacity(releases.len());
    for release in releases {
        let images = state.db.get_images_for_release(release.id).await?;
        let day_url = day_path(&url_prefix_for(&release), &release.pub_date);
        views.push(ReleaseView {
            comic_name: release.comic_name,
            pub_date: release.pub_date,
            day_url,
            images,
        });
    }
    Ok(views)
}

fn subtitle_for_day(date: NaiveDate) -> String {
    date.format("%A %d %B %Y").to_string()
}

fn rfc2822_midnight(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%a, %d %b %Y 00:00:00 +0000").to_string(),
        Err(_) => date.to_string(),
    }
}

fn feed_item_description(images: &[Image]) -> String {
    let mut description = String::new();
    for image in images {
        if let Some(title) = &image.title {
            description.push_str(&format!("<h1>{title}</h1>"));
        }
        description.push_str(&format!("<img src=\"{}\" />", image.url));
        if let Some(text) = &image.text {
            description.push_str(&format!("<p>{text}</p>"));
        }
    }
    description
}

fn feed_response(template: FeedTemplate) -> Result<Response, AppError> {
    let xml = template.render().map_err(anyhow::Error::from)?;
    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

async fn feed_items_for(
    state: &AppState,
    releases: Vec<crate::db::Release>,
) -> Result<Vec<FeedItem>, AppError> {
    let mut items = Vec::with_capacity(releases.len());
    for release in releases {
        let images = state.db.get_images_for_release(release.id).await?;
        let link = format!(
            "{}{}",
            state.site_url,
            day_path(&format!("/{}", release.comic_slug), &release.pub_date)
        );
        items.push(FeedItem {
            title: format!("{} for {}", release.comic_name, release.pub_date),
            guid: format!("{}#release-{}", link, release.id),
            link,
            pub_date: rfc2822_midnight(&release.pub_date),
            description: feed_item_description(&images),
        });
    }
    Ok(items)
}

// Route handlers

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<impl IntoResponse, AppError> {
    // A wrong key on the catalog page just means browsing anonymously.
    let user = match &query.key {
        Some(key) => state.db.get_user_by_key(key).await?,
        None => None,
    };
    let subscribed_ids: Vec<i64> = match &user {
        Some(user) => state
            .db
            .get_subscribed_comics(user.id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect(),
        None => Vec::new(),
    };

    let comics = state.db.get_all_comics().await?;
    let mut listings = Vec::with_capacity(comics.len());
    for comic in comics {
        let release_count = state.db.get_release_count_for_comic(comic.id).await?;
        let latest = state.db.get_latest_release_for_comic(comic.id).await?;
        let latest_date = latest.as_ref().map(|r| r.pub_date.clone());
        let latest_url = latest
            .as_ref()
            .map(|r| day_path(&format!("/{}", comic.slug), &r.pub_date));
        let subscribed = subscribed_ids.contains(&comic.id);
        listings.push(ComicListing {
            comic,
            release_count,
            latest_date,
            latest_url,
            subscribed,
        });
    }

    Ok(HtmlTemplate(IndexTemplate {
        comics: listings,
        key: user.map(|u| u.secret_key),
    }))
}

pub async fn comic_latest(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let comic = state
        .db
        .get_comic_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let latest = state.db.get_latest_release_for_comic(comic.id).await?;
    let dates = state.db.get_release_dates_for_comic(comic.id).await?;

    let prefix = format!("/{}", comic.slug);
    let nav = match &latest {
        Some(release) => date_nav(&dates, &release.pub_date, |d| day_path(&prefix, d)),
        None => Nav::default(),
    };
    let releases = release_views(&state, latest.into_iter().collect(), |_| prefix.clone()).await?;

    Ok(HtmlTemplate(ReleasesTemplate {
        title: comic.name.clone(),
        subtitle: "Latest".to_string(),
        releases,
        nav,
        feed_url: Some(format!("/{}/feed.xml", comic.slug)),
        website_url: Some(format!("/{}/website", comic.slug)),
    }))
}

pub async fn comic_day(
    State(state): State<Arc<AppState>>,
    Path((slug, year, month, day)): Path<(String, i32, u32, u32)>,
) -> Result<impl IntoResponse, AppError> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(AppError::NotFound)?;
    let comic = state
        .db
        .get_comic_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let releases = state.db.get_releases_for_comic_on(comic.id, date).await?;
    let dates = state.db.get_release_dates_for_comic(comic.id).await?;

    let prefix = format!("/{}", comic.slug);
    let nav = date_nav(&dates, &date.format("%Y-%m-%d").to_string(), |d| {
        day_path(&prefix, d)
    });
    let releases = release_views(&state, releases, |_| prefix.clone()).await?;

    Ok(HtmlTemplate(ReleasesTemplate {
        title: comic.name.clone(),
        subtitle: subtitle_for_day(date),
        releases,
        nav,
        feed_url: Some(format!("/{}/feed.xml", comic.slug)),
        website_url: Some(format!("/{}/website", comic.slug)),
    }))
}

pub async fn comic_month(
    State(state): State<Arc<AppState>>,
    Path((slug, year, month)): Path<(String, i32, u32)>,
) -> Result<impl IntoResponse, AppError> {
    let first_of_month = NaiveDate::from_ymd_opt(year, month, 1).ok_or(AppError::NotFound)?;
    let comic = state
        .db
        .get_comic_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let releases = state
        .db
        .get_releases_for_comic_in_month(comic.id, year, month)
        .await?;
    let dates = state.db.get_release_dates_for_comic(comic.id).await?;
    let months = month_prefixes(&dates);

    let prefix = format!("/{}", comic.slug);
    let nav = date_nav(&months, &format!("{year:04}-{month:02}"), |m| {
        day_path(&prefix, m)
    });
    let releases = release_views(&state, releases, |_| prefix.clone()).await?;

    Ok(HtmlTemplate(ReleasesTemplate {
        title: comic.name.clone(),
        subtitle: first_of_month.format("%B %Y").to_string(),
        releases,
        nav,
        feed_url: Some(format!("/{}/feed.xml", comic.slug)),
        website_url: Some(format!("/{}/website", comic.slug)),
    }))
}

pub async fn comic_website(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let comic = state
        .db
        .get_comic_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Redirect::temporary(&comic.url))
}

pub async fn comic_feed(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let comic = state
        .db
        .get_comic_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound)?;

    let releases = state
        .db
        .get_recent_releases_for_comic(comic.id, FEED_ITEMS)
        .await?;
    let items = feed_items_for(&state, releases).await?;

    feed_response(FeedTemplate {
        title: comic.name.clone(),
        link: format!("{}/{}", state.site_url, comic.slug),
        description: format!("Latest releases of {}", comic.name),
        items,
    })
}

pub async fn my_latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&state, query.key.as_deref()).await?;

    let releases = state
        .db
        .get_latest_releases_for_user(user.id, LATEST_PER_PAGE)
        .await?;
    let dates = state.db.get_release_dates_for_user(user.id).await?;

    let key = query.key.as_deref();
    // Day browsing starts from the newest day with releases.
    let nav = Nav {
        prev: dates.last().map(|d| with_key(day_path("/my", d), key)),
        ..Nav::default()
    };

    let releases = release_views(&state, releases, |r| format!("/{}", r.comic_slug)).await?;

    Ok(HtmlTemplate(ReleasesTemplate {
        title: "My comics".to_string(),
        subtitle: "Latest".to_string(),
        releases,
        nav,
        feed_url: Some(with_key("/my/feed.xml".to_string(), key)),
        website_url: None,
    }))
}

pub async fn my_day(
    State(state): State<Arc<AppState>>,
    Path((year, month, day)): Path<(i32, u32, u32)>,
    Query(query): Query<KeyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(AppError::NotFound)?;
    let user = require_user(&state, query.key.as_deref()).await?;

    let releases = state.db.get_releases_for_user_on(user.id, date).await?;
    let dates = state.db.get_release_dates_for_user(user.id).await?;

    let key = query.key.as_deref();
    let nav = date_nav(&dates, &date.format("%Y-%m-%d").to_string(), |d| {
        with_key(day_path("/my", d), key)
    });
    let releases = release_views(&state, releases, |r| format!("/{}", r.comic_slug)).await?;

    Ok(HtmlTemplate(ReleasesTemplate {
        title: "My comics".to_string(),
        subtitle: subtitle_for_day(date),
        releases,
        nav,
        feed_url: Some(with_key("/my/feed.xml".to_string(), key)),
        website_url: None,
    }))
}

pub async fn my_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Response, AppError> {
    let user = require_user(&state, query.key.as_deref()).await?;

    let releases = state
        .db
        .get_latest_releases_for_user(user.id, FEED_ITEMS)
        .await?;
    let items = feed_items_for(&state, releases).await?;

    feed_response(FeedTemplate {
        title: format!("My comics for {}", user.handle),
        link: state.site_url.clone(),
        description: "Latest releases from subscribed comics".to_string(),
        items,
    })
}

#[derive(Deserialize)]
pub struct ToggleForm {
    pub key: String,
    pub slug: String,
}

pub async fn toggle_subscription(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ToggleForm>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&state, Some(&form.key)).await?;
    let comic = state
        .db
        .get_comic_by_slug(&form.slug)
        .await?
        .ok_or(AppError::NotFound)?;

    state.db.toggle_subscription(user.id, comic.id).await?;
    Ok(Redirect::to(&format!("/?key={}", form.key)))
}

pub async fn trigger_crawl(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    // Spawn the crawl task
    let aggregator = state.aggregator.clone();
    tokio::spawn(async move {
        let _ = aggregator.crawl_all(None, None).await;
    });

    // Report the crawling state immediately
    Ok(HtmlTemplate(CrawlStatusTemplate { crawling: true }))
}

pub async fn crawl_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let crawling = state.aggregator.is_crawling().await;
    Ok(HtmlTemplate(CrawlStatusTemplate { crawling }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
