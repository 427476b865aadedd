//! # Seed Data Generator
//!
//! Populates a development store with sample clothing products.
//!
//! ## Usage
//! ```bash
//! # Generate 300 products (default) in the configured store
//! cargo run -p pdv-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p pdv-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p pdv-db --bin seed -- --db ./data/pdv_dev.db
//! ```
//!
//! ## Generated Products
//! Every model is expanded over sizes and colors:
//! - Code: `{CATEGORY}-{MODEL}-{SIZE}-{COLOR}`
//! - Price: model base price, +10% for GG
//! - Stock: 0 - 40, minimum 3 (some products start low on stock)

use std::env;
use std::path::PathBuf;

use pdv_core::{Money, ProductDraft};
use pdv_db::{AppConfig, Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category code, category name, brand, [(model, base price in centavos)])
const CATALOG: &[(&str, &str, &str, &[(&str, i64)])] = &[
    (
        "CAM",
        "Camisetas",
        "Malwee",
        &[
            ("Camiseta Básica", 3990),
            ("Camiseta Gola V", 4490),
            ("Camiseta Estampada", 5990),
            ("Camiseta Manga Longa", 6990),
        ],
    ),
    (
        "CAL",
        "Calças",
        "Levi's",
        &[
            ("Calça Jeans Skinny", 14990),
            ("Calça Jeans Reta", 13990),
            ("Calça Sarja", 11990),
            ("Calça Moletom", 8990),
        ],
    ),
    (
        "BER",
        "Bermudas",
        "Hering",
        &[("Bermuda Jeans", 8990), ("Bermuda Tactel", 5990)],
    ),
    (
        "VES",
        "Vestidos",
        "Farm",
        &[
            ("Vestido Midi", 18990),
            ("Vestido Longo", 22990),
            ("Vestido Tubinho", 15990),
        ],
    ),
    (
        "JAQ",
        "Jaquetas",
        "Colcci",
        &[("Jaqueta Jeans", 24990), ("Jaqueta Corta-Vento", 19990)],
    ),
];

const SIZES: &[&str] = &["P", "M", "G", "GG"];

const COLORS: &[(&str, &str)] = &[("PRE", "Preto"), ("BRA", "Branco"), ("AZU", "Azul")];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 300;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(300);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("SnapDev PDV Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 300)");
                println!("  -d, --db <PATH>    Database file path (default: configured store)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = AppConfig::load_or_default(None);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db_config = match db_path {
        Some(path) => DbConfig::new(path),
        None => DbConfig::from_app_config(&config),
    };
    info!(path = %db_config.database_path.display(), count, "Seeding store");

    let db = Database::new(db_config).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Store already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    for (seed, draft) in drafts().enumerate() {
        if generated >= count {
            break;
        }

        let draft = with_stock(draft, seed);
        if let Err(e) = db.products().create(&draft).await {
            warn!(code = %draft.code, error = %e, "Failed to insert product");
            continue;
        }

        generated += 1;
        if generated % 100 == 0 {
            info!(generated, "Progress");
        }
    }

    let elapsed = start.elapsed();
    let categories = db.products().categories().await?.len();
    let low_stock = db.reports().low_stock().await?.len();
    info!(
        generated,
        elapsed_ms = elapsed.as_millis() as u64,
        categories,
        low_stock,
        "Seed complete"
    );

    Ok(())
}

/// Every catalog combination, in a stable order.
fn drafts() -> impl Iterator<Item = ProductDraft> {
    CATALOG.iter().flat_map(|(category_code, category, brand, models)| {
        models.iter().enumerate().flat_map(move |(model_idx, (model, base_price))| {
            SIZES.iter().flat_map(move |size| {
                COLORS.iter().map(move |(color_code, color)| {
                    let price = if *size == "GG" {
                        base_price + base_price / 10
                    } else {
                        *base_price
                    };

                    ProductDraft {
                        code: format!(
                            "{}-{:02}-{}-{}",
                            category_code,
                            model_idx + 1,
                            size,
                            color_code
                        ),
                        name: format!("{} {} {}", model, color, size),
                        description: Some(format!("{} {}", model, brand)),
                        price: Money::from_cents(price),
                        category: Some(category.to_string()),
                        brand: Some(brand.to_string()),
                        size: Some(size.to_string()),
                        color: Some(color.to_string()),
                        ..ProductDraft::default()
                    }
                })
            })
        })
    })
}

fn with_stock(draft: ProductDraft, seed: usize) -> ProductDraft {
    ProductDraft {
        quantity: ((seed * 7) % 41) as i64,
        min_quantity: 3,
        ..draft
    }
}
