//! # Seed Data Generator
//!
//! Populates the database with a demo catalog and a demo loyalty account.
//!
//! ## Usage
//! ```bash
//! # Seed ./bits_dev.db
//! cargo run -p bits-db --bin seed
//!
//! # Specify database path
//! cargo run -p bits-db --bin seed -- --db ./data/bits.db
//!
//! # Seed a different demo user
//! cargo run -p bits-db --bin seed -- --user u-ana --balance 5000
//! ```
//!
//! Coupons are not seeded here; migration 002 inserts the catalog.

use std::env;

use bits_core::{LoyaltyAccount, Money, Product};
use bits_db::{Database, DbConfig, LoyaltyStore, ProductStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Demo catalog: (id, name, price, discount price, stock)
const PRODUCTS: &[(&str, &str, i64, Option<i64>, i64)] = &[
    ("kb-mech-01", "Teclado mecánico TKL", 49_990, Some(44_990), 12),
    ("ms-wl-01", "Mouse inalámbrico", 19_990, None, 30),
    ("hs-usb-01", "Audífonos USB", 34_990, None, 8),
    ("mn-24-01", "Monitor 24\" IPS", 129_990, Some(119_990), 5),
    ("cb-usbc-01", "Cable USB-C 1m", 4_990, None, 100),
    ("pd-xl-01", "Mousepad XL", 9_990, None, 40),
    ("wc-hd-01", "Cámara web HD", 29_990, None, 0),
    ("ss-1tb-01", "SSD NVMe 1TB", 69_990, Some(59_990), 15),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./bits_dev.db");
    let mut user_id = String::from("u-demo");
    let mut balance: i64 = 200_000;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--balance" | "-b" => {
                if i + 1 < args.len() {
                    balance = args[i + 1].parse().unwrap_or(balance);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bits Store Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./bits_dev.db)");
                println!("  -u, --user <ID>        Demo loyalty user (default: u-demo)");
                println!("  -b, --balance <BITS>   Demo Bits balance (default: 200000)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has products, skipping seed (delete the file to regenerate)"
        );
        return Ok(());
    }

    for (id, name, price, discount, stock) in PRODUCTS {
        let product = Product {
            id: id.to_string(),
            name: name.to_string(),
            price: Money::from_units(*price),
            discount_price: discount.map(Money::from_units),
            stock: *stock,
        };
        db.upsert_product(&product).await?;
    }
    info!(count = PRODUCTS.len(), "Seeded products");

    match db.get_account(&user_id).await? {
        Some(account) => info!(user_id = %user_id, balance = account.balance, "Loyalty account exists"),
        None => {
            let mut account = LoyaltyAccount::empty(&user_id);
            account.balance = balance;
            db.save_account(&account).await?;
            info!(user_id = %user_id, balance, "Seeded loyalty account");
        }
    }

    let coupons = db.coupons().list_all().await?;
    info!(count = coupons.len(), "Coupon catalog present");

    db.close().await;
    info!("Seed complete");
    Ok(())
}
