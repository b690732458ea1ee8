//! Seed a development database with catalog items.
//!
//! Without `--file` a small built-in menu is inserted. The catalog file is a
//! YAML list:
//!
//! ```yaml
//! - name: Margherita
//!   price: "95.00"
//! - name: Tiramisu
//!   price: 55
//!   is_available: false
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::info;

use orderdesk_core::Money;
use orderdesk_server::db::{self, CatalogRepository};

/// One catalog entry in the seed file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogSeed {
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

const fn default_available() -> bool {
    true
}

fn builtin_catalog() -> Vec<CatalogSeed> {
    [
        ("Plăcinte cu brânză", 35),
        ("Zeamă de găină", 55),
        ("Mămăligă cu brânză și smântână", 70),
        ("Sarmale", 85),
        ("Compot de casă", 20),
    ]
    .into_iter()
    .map(|(name, price)| CatalogSeed {
        name: name.to_string(),
        price: Decimal::from(price),
        is_available: true,
    })
    .collect()
}

/// Parse and check a YAML catalog.
///
/// # Errors
///
/// Returns an error for malformed YAML, blank names or negative prices.
pub fn parse_catalog(content: &str) -> Result<Vec<CatalogSeed>, Box<dyn std::error::Error>> {
    let items: Vec<CatalogSeed> = serde_yaml::from_str(content)?;

    for item in &items {
        if item.name.trim().is_empty() {
            return Err("catalog item with a blank name".into());
        }
        if item.price.is_sign_negative() {
            return Err(format!("negative price for {}", item.name).into());
        }
    }

    Ok(items)
}

/// Insert catalog items.
///
/// Skips seeding when the catalog already has items, unless `force` is set.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset, the file cannot be read or
/// parsed, or an insert fails.
pub async fn catalog(file_path: Option<&str>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| "DATABASE_URL not set")?;

    let items = match file_path {
        Some(file_path) => {
            let path = Path::new(file_path);
            if !path.exists() {
                return Err(format!("File not found: {file_path}").into());
            }
            info!(path = %file_path, "Loading catalog from file");
            let content = tokio::fs::read_to_string(path).await?;
            parse_catalog(&content)?
        }
        None => builtin_catalog(),
    };

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let repo = CatalogRepository::new(&pool);
    let existing = repo.count().await?;
    if existing > 0 && !force {
        info!(existing, "Catalog already seeded, use --force to insert anyway");
        return Ok(());
    }

    for item in &items {
        let id = repo
            .insert(&item.name, Money::from(item.price), item.is_available)
            .await?;
        info!(id = %id, name = %item.name, price = %item.price, "Inserted catalog item");
    }

    info!(inserted = items.len(), "Seeding complete!");
    Ok(())
}
