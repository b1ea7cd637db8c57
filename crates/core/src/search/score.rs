//! Heuristic relevance scoring.
//!
//! Name matches are tiered: only the best tier a product reaches counts.
//! Category matches and catalog boosts are added on top.

use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::CatalogItem;

/// Points for each name tier and bonus.
pub mod points {
    pub const EXACT_NAME: i32 = 100;
    pub const NAME_PREFIX: i32 = 80;
    pub const NAME_SUBSTRING: i32 = 60;
    pub const WORD_PREFIX: i32 = 40;
    pub const CATEGORY: i32 = 20;
    pub const TRENDING: i32 = 15;
    pub const NEW: i32 = 10;
    pub const TOP_RATED: i32 = 8;
    pub const OUT_OF_STOCK: i32 = -20;
}

/// Products created within this many days count as new.
pub const NEW_PRODUCT_DAYS: i64 = 30;

/// Rating at or above which a product gets the top-rated boost.
pub const TOP_RATED_THRESHOLD: Decimal = Decimal::from_parts(45, 0, 0, false, 1);

/// How well a product's name (or category) matched the query.
///
/// Variants are declared weakest first so the derived `Ord` ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// No query, or the query did not touch name or category.
    None,
    /// Only the category name contains the query.
    Category,
    /// Some word of the name starts with the whole query.
    WordPrefix,
    /// The name contains the query.
    Substring,
    /// The name starts with the query.
    Prefix,
    /// The name equals the query.
    Exact,
}

/// Most points a substring-tier match can collect: the name tier, the
/// category bonus and every positive boost.
pub const MAX_SUBSTRING_POINTS: i32 = points::NAME_SUBSTRING
    + points::CATEGORY
    + points::TRENDING
    + points::NEW
    + points::TOP_RATED;

/// A product's relevance against one query.
///
/// Ordered by points, with the tier breaking ties. An exact name match ranks
/// as if it had at least [`MAX_SUBSTRING_POINTS`], so it never falls below a
/// substring match however many boosts that match collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Relevance {
    pub tier: MatchTier,
    pub points: i32,
}

impl Relevance {
    /// Points used for ranking. Equal to `points` except for exact matches.
    #[must_use]
    pub fn rank_points(&self) -> i32 {
        if self.tier == MatchTier::Exact {
            self.points.max(MAX_SUBSTRING_POINTS)
        } else {
            self.points
        }
    }
}

impl Ord for Relevance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank_points()
            .cmp(&other.rank_points())
            .then(self.tier.cmp(&other.tier))
            .then(self.points.cmp(&other.points))
    }
}

impl PartialOrd for Relevance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lower-case and collapse whitespace so `"  Red   SHOES "` becomes `"red shoes"`.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `item` counts as new at `now`.
#[must_use]
pub fn is_new(item: &CatalogItem, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(item.created_at);
    age.num_days() < NEW_PRODUCT_DAYS && age.num_seconds() >= 0
}

fn name_tier(name: &str, query: &str) -> MatchTier {
    if name == query {
        MatchTier::Exact
    } else if name.starts_with(query) {
        MatchTier::Prefix
    } else if name.contains(query) {
        MatchTier::Substring
    } else if name.split(' ').any(|word| word.starts_with(query)) {
        MatchTier::WordPrefix
    } else {
        MatchTier::None
    }
}

const fn tier_points(tier: MatchTier) -> i32 {
    match tier {
        MatchTier::Exact => points::EXACT_NAME,
        MatchTier::Prefix => points::NAME_PREFIX,
        MatchTier::Substring => points::NAME_SUBSTRING,
        MatchTier::WordPrefix => points::WORD_PREFIX,
        MatchTier::Category | MatchTier::None => 0,
    }
}

/// Catalog boosts that apply regardless of the query.
#[must_use]
pub fn boost_points(item: &CatalogItem, now: DateTime<Utc>) -> i32 {
    let mut total = 0;
    if item.trending {
        total += points::TRENDING;
    }
    if is_new(item, now) {
        total += points::NEW;
    }
    if item.rating >= TOP_RATED_THRESHOLD {
        total += points::TOP_RATED;
    }
    if item.stock <= 0 {
        total += points::OUT_OF_STOCK;
    }
    total
}

/// Score `item` against an already [`normalize`]d query.
///
/// An empty query scores every item on boosts alone with tier
/// [`MatchTier::None`]. A non-empty query returns `None` for items whose
/// name and category both miss.
#[must_use]
pub fn score(item: &CatalogItem, query: &str, now: DateTime<Utc>) -> Option<Relevance> {
    let boosts = boost_points(item, now);
    if query.is_empty() {
        return Some(Relevance {
            tier: MatchTier::None,
            points: boosts,
        });
    }

    let name = normalize(&item.name);
    let category_hit = normalize(&item.category).contains(query);
    let mut tier = name_tier(&name, query);

    if tier == MatchTier::None {
        if !category_hit {
            return None;
        }
        tier = MatchTier::Category;
    }

    let category = if category_hit { points::CATEGORY } else { 0 };
    Some(Relevance {
        tier,
        points: tier_points(tier) + category + boosts,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::search::tests::item;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Red   SHOES \t"), "red shoes");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_name_tiers() {
        assert_eq!(name_tier("red shoes", "red shoes"), MatchTier::Exact);
        assert_eq!(name_tier("red shoes", "red"), MatchTier::Prefix);
        assert_eq!(name_tier("red shoes", "shoe"), MatchTier::Substring);
        assert_eq!(name_tier("red running shoes", "runn"), MatchTier::WordPrefix);
        assert_eq!(name_tier("red running shoes", "running red"), MatchTier::None);
        assert_eq!(name_tier("red shoes", "blue"), MatchTier::None);
    }

    #[test]
    fn test_partial_multi_word_query_misses() {
        let shoe = item(1, "Red Shoes", "Footwear");
        assert_eq!(name_tier("red shoes", "red xyz"), MatchTier::None);
        assert!(score(&shoe, "red xyz", now()).is_none());
    }

    #[test]
    fn test_points_decide_order_across_tiers() {
        let mut mug = item(1, "Clay Mug", "Kitchen");
        mug.trending = true;
        mug.created_at = now();
        mug.rating = Decimal::from(5);

        let mut spoon = item(2, "Wooden Spoon", "Utensils");
        spoon.stock = 0;

        let category_only = score(&mug, "kitch", now()).unwrap();
        let substring = score(&spoon, "oden", now()).unwrap();
        assert_eq!(category_only.tier, MatchTier::Category);
        assert_eq!(category_only.points, 53);
        assert_eq!(substring.tier, MatchTier::Substring);
        assert_eq!(substring.points, 40);
        assert!(category_only > substring);
    }

    #[test]
    fn test_ordering_is_transitive_around_exact_lift() {
        let exact = Relevance { tier: MatchTier::Exact, points: 85 };
        let prefix = Relevance { tier: MatchTier::Prefix, points: 90 };
        let substring = Relevance { tier: MatchTier::Substring, points: 95 };
        assert!(exact > substring);
        assert!(exact > prefix);
        assert!(prefix < substring);
    }

    #[test]
    fn test_exact_match_points() {
        let shoe = item(1, "Red Shoes", "Footwear");
        let relevance = score(&shoe, "red shoes", now()).unwrap();
        assert_eq!(relevance.tier, MatchTier::Exact);
        assert_eq!(relevance.points, points::EXACT_NAME);
    }

    #[test]
    fn test_category_adds_to_name_match() {
        let tea = item(1, "Ilam Tea", "Tea & Coffee");
        let relevance = score(&tea, "tea", now()).unwrap();
        assert_eq!(relevance.tier, MatchTier::Substring);
        assert_eq!(relevance.points, points::NAME_SUBSTRING + points::CATEGORY);
    }

    #[test]
    fn test_category_only_match() {
        let mug = item(1, "Clay Mug", "Kitchen");
        let relevance = score(&mug, "kitch", now()).unwrap();
        assert_eq!(relevance.tier, MatchTier::Category);
        assert_eq!(relevance.points, points::CATEGORY);
    }

    #[test]
    fn test_no_match_is_excluded() {
        let mug = item(1, "Clay Mug", "Kitchen");
        assert!(score(&mug, "laptop", now()).is_none());
    }

    #[test]
    fn test_boosts() {
        let mut hot = item(1, "Pashmina Shawl", "Clothing");
        hot.trending = true;
        hot.created_at = now() - Duration::days(3);
        hot.rating = Decimal::new(48, 1);
        assert_eq!(
            boost_points(&hot, now()),
            points::TRENDING + points::NEW + points::TOP_RATED
        );

        let mut sold_out = item(2, "Pashmina Shawl", "Clothing");
        sold_out.stock = 0;
        assert_eq!(boost_points(&sold_out, now()), points::OUT_OF_STOCK);
    }

    #[test]
    fn test_rating_threshold_is_inclusive() {
        let mut rated = item(1, "Singing Bowl", "Decor");
        rated.rating = Decimal::new(45, 1);
        assert_eq!(boost_points(&rated, now()), points::TOP_RATED);
        rated.rating = Decimal::new(449, 2);
        assert_eq!(boost_points(&rated, now()), 0);
    }

    #[test]
    fn test_is_new_window() {
        let mut fresh = item(1, "Dhaka Topi", "Clothing");
        fresh.created_at = now() - Duration::days(29);
        assert!(is_new(&fresh, now()));
        fresh.created_at = now() - Duration::days(30);
        assert!(!is_new(&fresh, now()));
        fresh.created_at = now() + Duration::days(1);
        assert!(!is_new(&fresh, now()));
    }

    #[test]
    fn test_exact_outranks_boosted_substring() {
        let mut exact = item(1, "Shoe", "Footwear");
        exact.stock = 0;

        let mut boosted = item(2, "Running Shoe Pro", "Shoe Store");
        boosted.trending = true;
        boosted.created_at = now();
        boosted.rating = Decimal::from(5);

        let exact_score = score(&exact, "shoe", now()).unwrap();
        let boosted_score = score(&boosted, "shoe", now()).unwrap();
        assert!(boosted_score.points > exact_score.points);
        assert!(exact_score > boosted_score);
    }

    #[test]
    fn test_empty_query_scores_boosts_only() {
        let mut trending = item(1, "Khukuri", "Tools");
        trending.trending = true;
        let relevance = score(&trending, "", now()).unwrap();
        assert_eq!(relevance.tier, MatchTier::None);
        assert_eq!(relevance.points, points::TRENDING);
    }
}
