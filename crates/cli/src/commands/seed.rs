//! Seed the catalog from a YAML file.
//!
//! Categories are matched by slug and products by name within their
//! category, so running the same file twice updates rows instead of
//! duplicating them.
//!
//! ```yaml
//! categories:
//!   - name: Handicrafts
//!     description: Made in the Kathmandu valley
//!     products:
//!       - name: Singing bowl
//!         price: "2499.00"
//!         stock: 12
//!         is_trending: true
//! ```

use std::path::Path;

use pasal_api::db::{CategoryRepository, ProductRepository};
use pasal_api::models::{CategoryInput, ProductInput};
use pasal_core::Money;
use serde::Deserialize;
use tracing::{error, info};

use super::connect;

/// Top-level seed document.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub stock: i32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_trending: bool,
}

impl CategorySeed {
    fn input(&self) -> CategoryInput {
        CategoryInput {
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
        }
    }
}

impl ProductSeed {
    fn input(&self, category_id: Option<pasal_core::CategoryId>) -> ProductInput {
        ProductInput {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            price: self.price,
            category_id,
            stock: self.stock,
            image_url: self.image_url.clone(),
            is_trending: self.is_trending,
        }
    }
}

/// Every problem in the document, so one run reports them all.
#[must_use]
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    for category in &seed.categories {
        if let Err(e) = category.input().normalized() {
            errors.push(format!("category {:?}: {e}", category.name));
        }
        for product in &category.products {
            if let Err(e) = product.input(None).validate() {
                errors.push(format!(
                    "product {:?} in {:?}: {e}",
                    product.name, category.name
                ));
            }
        }
    }
    errors
}

/// Upsert every category and product in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database write fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;
    let categories = CategoryRepository::new(&pool);
    let products = ProductRepository::new(&pool);

    let mut product_count = 0_usize;
    for category_seed in &seed.categories {
        let (name, slug) = category_seed.input().normalized()?;
        let category = categories
            .upsert(&name, &slug, &category_seed.description)
            .await?;

        for product_seed in &category_seed.products {
            products
                .upsert_by_name(&product_seed.input(Some(category.id)))
                .await?;
            product_count += 1;
        }
        info!(category = %category.slug, products = category_seed.products.len(), "Category seeded");
    }

    info!("Seeding complete!");
    info!("  Categories: {}", seed.categories.len());
    info!("  Products: {product_count}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Handicrafts
    products:
      - name: Singing bowl
        price: "2499.00"
        stock: 12
        is_trending: true
      - name: Prayer flags
        price: "350"
  - name: Tea
    slug: himalayan-tea
    description: Ilam and Dhankuta estates
"#;

    #[test]
    fn test_parse_sample() {
        let seed: CatalogSeed = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(seed.categories.len(), 2);
        let bowl = &seed.categories[0].products[0];
        assert_eq!(bowl.price.to_string(), "2499.00");
        assert!(bowl.is_trending);
        assert_eq!(seed.categories[0].products[1].stock, 0);
        assert_eq!(seed.categories[1].slug.as_deref(), Some("himalayan-tea"));
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let yaml = r#"
categories:
  - name: "  "
    products:
      - name: ""
        price: "10"
      - name: Broken
        price: "10"
        stock: -1
"#;
        let seed: CatalogSeed = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(validate(&seed).len(), 3);
    }

    #[test]
    fn test_negative_price_is_rejected_at_parse() {
        let yaml = "categories:\n  - name: X\n    products:\n      - name: Y\n        price: \"-5\"\n";
        assert!(serde_yaml::from_str::<CatalogSeed>(yaml).is_err());
    }
}
