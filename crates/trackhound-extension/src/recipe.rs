//! Declarative extensions.
//!
//! A recipe is a TOML unit describing a listing page with CSS selectors:
//!
//! ```toml
//! [trackhound]
//! name = "Example Records"
//! genres = ["house", "techno"]
//!
//! [scrape]
//! url = "https://example.com/{genre}/new?from={since}"
//! item = "li.release"
//! name = ".title"
//! artist = ".artist"
//! media_url = "audio@src"
//! date = "time@datetime"
//! next_page = "a.next@href"
//! ```
//!
//! A selector is either `css` (the element text) or `css@attr` (an
//! attribute). An empty `css` part refers to the item element itself.

use crate::context::{DiscoveryContext, ScrapeContext};
use crate::module::{EntryPoint, ExtensionModule, ScanHook, ENTRY_POINT, METADATA_MARKER, SCAN_HOOK};
use crate::record::ExtensionRecord;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use scraper::{ElementRef, Selector};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};
use trackhound_core::{cutoff, ExtensionId, ResultItem};
use trackhound_gateway::{FetchedPage, Method, RequestOptions};
use url::Url;

/// Default page limit per listing.
pub const DEFAULT_MAX_PAGES: u32 = 20;

/// Default format of extracted dates.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors raised while running a recipe.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// A selector does not parse
    #[error("invalid selector '{selector}': {reason}")]
    Selector {
        /// The selector as written
        selector: String,
        /// Parser message
        reason: String,
    },

    /// The HTTP method is not recognized
    #[error("invalid HTTP method '{0}'")]
    Method(String),
}

/// The `[scrape]` table of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrapeRecipe {
    /// Listing URL template
    pub url: String,
    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,
    /// Start every listing with a fresh session
    #[serde(default)]
    pub reset_session: bool,
    /// Page limit per listing
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// One match per release
    pub item: String,
    /// Track name
    #[serde(default)]
    pub name: Option<String>,
    /// Artist
    #[serde(default)]
    pub artist: Option<String>,
    /// Album
    #[serde(default)]
    pub album: Option<String>,
    /// Genre
    #[serde(default)]
    pub genre: Option<String>,
    /// Playable URL
    pub media_url: String,
    /// Cover image URL
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Release date
    #[serde(default)]
    pub date: Option<String>,
    /// `chrono` format of the release date
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Link to the next listing page
    #[serde(default)]
    pub next_page: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

/// The `[scan]` table of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRecipe {
    /// Sub-option list, relative to the extensions directory
    pub list_file: PathBuf,
}

/// A loaded recipe unit.
#[derive(Debug, Clone)]
pub struct RecipeModule {
    id: ExtensionId,
    metadata: Option<toml::Table>,
    scrape: Option<ScrapeRecipe>,
    scan: Option<ScanRecipe>,
}

impl RecipeModule {
    /// Build from a parsed unit. Malformed sections are logged and treated
    /// as absent.
    #[must_use]
    pub fn from_table(id: ExtensionId, mut table: toml::Table) -> Self {
        let metadata = match table.remove(METADATA_MARKER) {
            Some(toml::Value::Table(metadata)) => Some(metadata),
            Some(_) => {
                warn!(extension = %id, "metadata is not a table");
                None
            }
            None => None,
        };

        let scrape = section::<ScrapeRecipe>(&id, &mut table, ENTRY_POINT);
        let scan = section::<ScanRecipe>(&id, &mut table, SCAN_HOOK);

        Self {
            id,
            metadata,
            scrape,
            scan,
        }
    }

    /// Identity of the unit.
    #[must_use]
    pub fn id(&self) -> &ExtensionId {
        &self.id
    }

    /// The scrape section, if valid.
    #[must_use]
    pub fn scrape_recipe(&self) -> Option<&ScrapeRecipe> {
        self.scrape.as_ref()
    }

    /// The scan section, if valid.
    #[must_use]
    pub fn scan_recipe(&self) -> Option<&ScanRecipe> {
        self.scan.as_ref()
    }
}

fn section<T: serde::de::DeserializeOwned>(
    id: &ExtensionId,
    table: &mut toml::Table,
    key: &str,
) -> Option<T> {
    let value = table.remove(key)?;
    match value.try_into::<T>() {
        Ok(section) => Some(section),
        Err(e) => {
            warn!(extension = %id, section = key, error = %e, "ignoring malformed recipe section");
            None
        }
    }
}

impl ExtensionModule for RecipeModule {
    fn metadata(&self) -> Option<&toml::Table> {
        self.metadata.as_ref()
    }

    fn entry_point(&self) -> Option<&dyn EntryPoint> {
        self.scrape.as_ref().map(|recipe| recipe as &dyn EntryPoint)
    }

    fn scan_hook(&self) -> Option<&dyn ScanHook> {
        self.scan.as_ref().map(|recipe| recipe as &dyn ScanHook)
    }
}

impl ScanHook for ScanRecipe {
    fn scan(&self, ctx: &DiscoveryContext<'_>, record: &mut ExtensionRecord) -> bool {
        let path = ctx.extensions_dir().join(&self.list_file);

        let Ok(contents) = std::fs::read_to_string(&path) else {
            ctx.log(format!("List file {} not found!", path.display()));
            return false;
        };

        for line in contents.lines() {
            record.insert_genre(line);
        }

        if record.genres().is_empty() {
            ctx.log(format!("List file {} is empty!", path.display()));
            return false;
        }

        true
    }
}

/// A selector and the attribute to read, if any.
#[derive(Debug)]
struct FieldSelector {
    selector: Option<Selector>,
    attr: Option<String>,
}

impl FieldSelector {
    fn parse(raw: &str) -> Result<Self, RecipeError> {
        let (css, attr) = match raw.rsplit_once('@') {
            Some((css, attr)) if !attr.trim().is_empty() => (css.trim(), Some(attr.trim().to_string())),
            _ => (raw.trim(), None),
        };

        let selector = if css.is_empty() {
            None
        } else {
            Some(parse_selector(css)?)
        };

        Ok(Self { selector, attr })
    }

    fn extract(&self, element: ElementRef<'_>) -> Option<String> {
        let target = match &self.selector {
            Some(selector) => element.select(selector).next()?,
            None => element,
        };

        let value = match &self.attr {
            Some(attr) => target.value().attr(attr)?.trim().to_string(),
            None => target.text().collect::<Vec<_>>().join(" "),
        };

        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        (!value.is_empty()).then_some(value)
    }
}

fn parse_selector(css: &str) -> Result<Selector, RecipeError> {
    Selector::parse(css).map_err(|e| RecipeError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn optional(raw: Option<&str>) -> Result<Option<FieldSelector>, RecipeError> {
    raw.map(FieldSelector::parse).transpose()
}

/// Selectors of a recipe, parsed once per scrape.
#[derive(Debug)]
struct CompiledRecipe {
    item: Selector,
    name: Option<FieldSelector>,
    artist: Option<FieldSelector>,
    album: Option<FieldSelector>,
    genre: Option<FieldSelector>,
    media_url: FieldSelector,
    cover_url: Option<FieldSelector>,
    date: Option<FieldSelector>,
    next_page: Option<FieldSelector>,
}

impl CompiledRecipe {
    fn compile(recipe: &ScrapeRecipe) -> Result<Self, RecipeError> {
        Ok(Self {
            item: parse_selector(&recipe.item)?,
            name: optional(recipe.name.as_deref())?,
            artist: optional(recipe.artist.as_deref())?,
            album: optional(recipe.album.as_deref())?,
            genre: optional(recipe.genre.as_deref())?,
            media_url: FieldSelector::parse(&recipe.media_url)?,
            cover_url: optional(recipe.cover_url.as_deref())?,
            date: optional(recipe.date.as_deref())?,
            next_page: optional(recipe.next_page.as_deref())?,
        })
    }
}

/// Raw fields of one listing item.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Listing {
    name: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    media_url: Option<String>,
    cover_url: Option<String>,
    date: Option<String>,
}

/// Items and next link of one page.
#[derive(Debug, Default)]
struct ExtractedPage {
    listings: Vec<Listing>,
    next_page: Option<String>,
}

fn resolve(base: Option<&Url>, href: String) -> String {
    match base.and_then(|base| base.join(&href).ok()) {
        Some(url) => url.to_string(),
        None => href,
    }
}

fn extract_page(compiled: &CompiledRecipe, document: &scraper::Html, page_url: &str) -> ExtractedPage {
    let base = Url::parse(page_url).ok();
    let field = |selector: &Option<FieldSelector>, element: ElementRef<'_>| {
        selector.as_ref().and_then(|s| s.extract(element))
    };

    let listings = document
        .select(&compiled.item)
        .map(|element| Listing {
            name: field(&compiled.name, element),
            artist: field(&compiled.artist, element),
            album: field(&compiled.album, element),
            genre: field(&compiled.genre, element),
            media_url: compiled
                .media_url
                .extract(element)
                .map(|href| resolve(base.as_ref(), href)),
            cover_url: field(&compiled.cover_url, element).map(|href| resolve(base.as_ref(), href)),
            date: field(&compiled.date, element),
        })
        .collect();

    let next_page = compiled.next_page.as_ref().and_then(|selector| {
        selector
            .extract(document.root_element())
            .map(|href| resolve(base.as_ref(), href))
    });

    ExtractedPage { listings, next_page }
}

fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, format)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

fn expand_url(template: &str, genre: Option<&str>, since: &str, until: &str) -> String {
    let mut url = template.replace("{since}", since).replace("{until}", until);
    if let Some(genre) = genre {
        let encoded: String = url::form_urlencoded::byte_serialize(genre.as_bytes()).collect();
        url = url.replace("{genre}", &encoded);
    }
    url
}

impl ScrapeRecipe {
    fn http_method(&self) -> Result<Method, RecipeError> {
        Method::from_bytes(self.method.trim().to_uppercase().as_bytes())
            .map_err(|_| RecipeError::Method(self.method.clone()))
    }

    /// Parse a fetched page. The document does not outlive this call.
    fn extract(
        ctx: &ScrapeContext,
        compiled: &CompiledRecipe,
        page: &FetchedPage,
    ) -> Option<ExtractedPage> {
        let document = ctx.html(Some(page))?;
        Some(extract_page(compiled, &document, &page.url))
    }

    /// Emit the listings of one page. Returns `true` once a listing older
    /// than the cutoff is reached.
    fn emit_listings(
        &self,
        ctx: &ScrapeContext,
        record: &ExtensionRecord,
        genre: Option<&str>,
        listings: Vec<Listing>,
    ) -> bool {
        for listing in listings {
            let Some(media_url) = listing.media_url else {
                debug!(extension = %record.id, "skipping item without media URL");
                continue;
            };

            if let Some(date) = listing.date.as_deref() {
                match parse_date(date, &self.date_format) {
                    Some(date) if ctx.cutoff().excludes(date) => return true,
                    Some(_) => {}
                    None => debug!(extension = %record.id, date = %date, "unparseable release date"),
                }
            }

            // Without a genre in the URL, only a configured genre selector
            // can filter. Items whose genre is not extracted are kept.
            if genre.is_none() && self.genre.is_some() && !record.genres().is_empty() {
                if let Some(item_genre) = listing.genre.as_deref() {
                    if !record.is_genre_enabled(item_genre) {
                        debug!(extension = %record.id, genre = item_genre, "skipping disabled genre");
                        continue;
                    }
                }
            }
            let item_genre = listing.genre.or_else(|| genre.map(str::to_string));

            let excluded = [listing.artist.as_deref(), listing.name.as_deref()]
                .into_iter()
                .flatten()
                .any(|text| ctx.is_excluded(text));
            if excluded {
                continue;
            }

            let mut builder = ResultItem::builder(media_url);
            if let Some(name) = listing.name {
                builder = builder.name(name);
            }
            if let Some(artist) = listing.artist {
                builder = builder.artist(artist);
            }
            if let Some(album) = listing.album {
                builder = builder.album(album);
            }
            if let Some(genre) = item_genre {
                builder = builder.genre(genre);
            }
            if let Some(cover_url) = listing.cover_url {
                builder = builder.cover_url(cover_url);
            }
            ctx.emit(builder.build());
        }

        false
    }

    async fn scrape_listing(
        &self,
        ctx: &ScrapeContext,
        record: &ExtensionRecord,
        compiled: &CompiledRecipe,
        method: &Method,
        genre: Option<&str>,
    ) {
        let since = ctx.cutoff().to_string();
        let until = cutoff::today().format("%Y-%m-%d").to_string();
        let mut url = expand_url(&self.url, genre, &since, &until);
        let mut reset_session = self.reset_session;

        for page_number in 1..=self.max_pages {
            let options = RequestOptions {
                reset_session,
                ..RequestOptions::default()
            };
            reset_session = false;

            let Some(page) = ctx.fetch(method.clone(), &url, options).await else {
                break;
            };
            let Some(extracted) = Self::extract(ctx, compiled, &page) else {
                break;
            };

            debug!(
                extension = %record.id,
                page = page_number,
                items = extracted.listings.len(),
                "scraped listing page"
            );

            if self.emit_listings(ctx, record, genre, extracted.listings) {
                ctx.log("Reached cutoff date. Moving on...");
                break;
            }

            match extracted.next_page {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }
    }
}

#[async_trait]
impl EntryPoint for ScrapeRecipe {
    async fn scrape(&self, ctx: &ScrapeContext, record: &ExtensionRecord) -> anyhow::Result<()> {
        let compiled = CompiledRecipe::compile(self)?;
        let method = self.http_method()?;

        if !self.url.contains("{genre}") {
            self.scrape_listing(ctx, record, &compiled, &method, None).await;
            return Ok(());
        }

        let genres: Vec<String> = record.enabled_genres().map(str::to_string).collect();
        if genres.is_empty() {
            ctx.log(format!("No genres enabled for {}", record.name));
            return Ok(());
        }

        for genre in &genres {
            ctx.log(format!("Scraping {genre}..."));
            self.scrape_listing(ctx, record, &compiled, &method, Some(genre))
                .await;
        }

        Ok(())
    }
}
