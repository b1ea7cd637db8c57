//! Relevance-scored catalog search.
//!
//! [`run`] is a pure pipeline over a slice of [`CatalogItem`]s:
//!
//! 1. **Filter** by category set, price range, minimum rating and stock.
//! 2. **Score** each survivor against the query (see [`score`]); with a
//!    non-empty query, items whose name and category both miss are dropped.
//! 3. **Sort** by relevance when there is a query (the selected sort key
//!    breaks ties), otherwise by the selected key. Product ID is the final
//!    tie-break, so identical input always yields identical output.
//! 4. **Paginate**.
//!
//! The current time is passed in rather than read from the clock, which
//! keeps the "new" boost and the `newest` sort deterministic.

pub mod score;

use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{CategoryId, Money, ProductId};

pub use score::{MatchTier, Relevance, is_new, normalize};

/// Default page size.
pub const DEFAULT_PER_PAGE: u32 = 24;

/// Largest page size a caller may request.
pub const MAX_PER_PAGE: u32 = 100;

/// A product as seen by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    /// Display name of the category, used for scoring.
    pub category: String,
    /// URL slug of the category, used for filtering.
    pub category_slug: String,
    pub price: Money,
    /// Average review rating (0 when unreviewed).
    pub rating: Decimal,
    pub review_count: i32,
    pub stock: i32,
    pub trending: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Whether at least one unit can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Relevance,
    PriceLow,
    PriceHigh,
    Rating,
    Trending,
    Newest,
}

impl SortKey {
    /// Parse a sort key from a query parameter.
    ///
    /// Unknown values fall back to relevance.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "price-low" | "price_asc" => Self::PriceLow,
            "price-high" | "price_desc" => Self::PriceHigh,
            "rating" => Self::Rating,
            "trending" | "popular" => Self::Trending,
            "newest" => Self::Newest,
            _ => Self::Relevance,
        }
    }

    /// Query-parameter form of this key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::PriceLow => "price-low",
            Self::PriceHigh => "price-high",
            Self::Rating => "rating",
            Self::Trending => "trending",
            Self::Newest => "newest",
        }
    }

    /// Order two items by this key alone.
    ///
    /// `Trending` puts trending items first, then the most reviewed and best
    /// rated; `Relevance` expresses no preference here.
    fn compare(self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        match self {
            Self::Relevance => Ordering::Equal,
            Self::PriceLow => a.price.cmp(&b.price),
            Self::PriceHigh => b.price.cmp(&a.price),
            Self::Rating => b
                .rating
                .cmp(&a.rating)
                .then(b.review_count.cmp(&a.review_count)),
            Self::Trending => b
                .trending
                .cmp(&a.trending)
                .then(b.review_count.cmp(&a.review_count))
                .then(b.rating.cmp(&a.rating)),
            Self::Newest => b.created_at.cmp(&a.created_at),
        }
    }
}

/// Search parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Free text; blank means browse.
    pub text: String,
    /// Category slugs to include; empty means all.
    pub categories: Vec<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    /// Rating bucket: keep items rated at least this.
    pub min_rating: Option<Decimal>,
    /// Drop items with no stock.
    pub in_stock: bool,
    pub sort: SortKey,
    /// 1-based page number (0 is treated as 1).
    pub page: u32,
    /// Page size (0 means [`DEFAULT_PER_PAGE`], clamped to [`MAX_PER_PAGE`]).
    pub per_page: u32,
}

impl SearchQuery {
    fn matches_filters(&self, item: &CatalogItem) -> bool {
        if !self.categories.is_empty()
            && !self
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&item.category_slug))
        {
            return false;
        }
        if self.min_price.is_some_and(|min| item.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| item.price > max) {
            return false;
        }
        if self.min_rating.is_some_and(|min| item.rating < min) {
            return false;
        }
        !(self.in_stock && !item.in_stock())
    }

    const fn page_size(&self) -> u32 {
        match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n if n > MAX_PER_PAGE => MAX_PER_PAGE,
            n => n,
        }
    }
}

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit<'a> {
    #[serde(flatten)]
    pub item: &'a CatalogItem,
    pub relevance: Relevance,
    pub is_new: bool,
}

/// A page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage<'a> {
    /// Normalized query text.
    pub query: String,
    pub sort: SortKey,
    pub hits: Vec<SearchHit<'a>>,
    /// Matches across all pages.
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

/// Filter, score, sort and paginate `items`.
#[must_use]
pub fn run<'a>(items: &'a [CatalogItem], query: &SearchQuery, now: DateTime<Utc>) -> SearchPage<'a> {
    let text = normalize(&query.text);

    let mut hits: Vec<SearchHit<'a>> = items
        .iter()
        .filter(|item| query.matches_filters(item))
        .filter_map(|item| {
            score::score(item, &text, now).map(|relevance| SearchHit {
                item,
                relevance,
                is_new: is_new(item, now),
            })
        })
        .collect();

    let sort = query.sort;
    if text.is_empty() {
        hits.sort_by(|a, b| {
            let by_key = if sort == SortKey::Relevance {
                b.relevance.cmp(&a.relevance)
            } else {
                sort.compare(a.item, b.item)
            };
            by_key.then(a.item.id.cmp(&b.item.id))
        });
    } else {
        hits.sort_by(|a, b| {
            b.relevance
                .cmp(&a.relevance)
                .then_with(|| sort.compare(a.item, b.item))
                .then(a.item.id.cmp(&b.item.id))
        });
    }

    let total = hits.len();
    let per_page = query.page_size();
    let page = query.page.max(1);
    let total_pages = u32::try_from(total.div_ceil(per_page as usize)).unwrap_or(u32::MAX);
    let skip = (page as usize - 1).saturating_mul(per_page as usize);

    let hits = hits
        .into_iter()
        .skip(skip)
        .take(per_page as usize)
        .collect();

    SearchPage {
        query: text,
        sort,
        hits,
        total,
        page,
        per_page,
        total_pages,
    }
}
