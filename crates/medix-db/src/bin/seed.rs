//! # Seed Data Generator
//!
//! Populates the database with medicines and stock batches for development.
//!
//! ## Usage
//! ```bash
//! # 200 medicines, 3 batches each (default)
//! cargo run -p medix-db --bin seed
//!
//! # Custom amounts
//! cargo run -p medix-db --bin seed -- --count 1000 --batches 5
//!
//! # Specify database path
//! cargo run -p medix-db --bin seed -- --db ./data/medix.db
//! ```
//!
//! ## Generated Data
//! Each medicine gets a category, a strength suffix and `--batches`
//! batches whose expiry dates are spread from one month already expired to
//! three years out, so FEFO ordering and expiry filtering both have
//! something to work on.

use std::env;

use chrono::{Days, Months, Utc};
use medix_core::{MedicineCategory, NewBatch, NewMedicine};
use medix_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// Generic names for realistic test data, with the category they ship as.
const MEDICINES: &[(&str, MedicineCategory, bool)] = &[
    ("Paracetamol", MedicineCategory::Tablet, false),
    ("Ibuprofen", MedicineCategory::Tablet, false),
    ("Amoxicillin", MedicineCategory::Capsule, true),
    ("Azithromycin", MedicineCategory::Tablet, true),
    ("Cetirizine", MedicineCategory::Tablet, false),
    ("Omeprazole", MedicineCategory::Capsule, false),
    ("Metformin", MedicineCategory::Tablet, true),
    ("Amlodipine", MedicineCategory::Tablet, true),
    ("Salbutamol", MedicineCategory::Inhaler, true),
    ("Dextromethorphan", MedicineCategory::Syrup, false),
    ("Ondansetron", MedicineCategory::Injection, true),
    ("Insulin Glargine", MedicineCategory::Injection, true),
    ("Clotrimazole", MedicineCategory::Ointment, false),
    ("Ciprofloxacin", MedicineCategory::Drops, true),
    ("Oral Rehydration Salts", MedicineCategory::Other, false),
];

/// Strength suffixes combined with the names above.
const STRENGTHS: &[&str] = &[
    "5mg", "10mg", "25mg", "50mg", "100mg", "250mg", "500mg", "650mg", "1g", "100ml", "200ml",
    "15g", "30g",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut batches_per_medicine: usize = 3;
    let mut db_path = String::from("./medix_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--batches" | "-b" => {
                if i + 1 < args.len() {
                    batches_per_medicine = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Medix Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of medicines to generate (default: 200)");
                println!("  -b, --batches <N>    Batches per medicine (default: 3)");
                println!("  -d, --db <PATH>      Database file path (default: ./medix_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Medix Seed Data Generator");
    println!("============================");
    println!("Database:  {}", db_path);
    println!("Medicines: {}", count);
    println!("Batches:   {} per medicine", batches_per_medicine);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.medicines().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} medicines", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating medicines...");

    let today = Utc::now().date_naive();
    let mut generated = 0;
    let mut received = 0;
    let start = std::time::Instant::now();

    'outer: for (strength_idx, strength) in STRENGTHS.iter().enumerate() {
        for (name_idx, (name, category, rx)) in MEDICINES.iter().enumerate() {
            if generated >= count {
                break 'outer;
            }

            let seed = strength_idx * MEDICINES.len() + name_idx;
            let medicine = match db
                .medicines()
                .create(&NewMedicine {
                    name: format!("{} {}", name, strength),
                    generic_name: Some(name.to_lowercase()),
                    category: *category,
                    requires_prescription: *rx,
                })
                .await
            {
                Ok(medicine) => medicine,
                Err(e) => {
                    eprintln!("Failed to insert {} {}: {}", name, strength, e);
                    continue;
                }
            };
            generated += 1;

            for batch_idx in 0..batches_per_medicine {
                let batch = generate_batch(&medicine.id, seed, batch_idx, today);
                if let Err(e) = db.batches().receive(&batch, Some("seed")).await {
                    eprintln!("Failed to receive {}: {}", batch.batch_number, e);
                    continue;
                }
                received += 1;
            }

            if generated % 50 == 0 {
                println!("  Generated {} medicines...", generated);
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} medicines and {} batches in {:?}",
        generated, received, elapsed
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates one receipt with deterministic pseudo-random data.
fn generate_batch(
    medicine_id: &str,
    seed: usize,
    batch_idx: usize,
    today: chrono::NaiveDate,
) -> NewBatch {
    // Batch 0 expired last month, later batches every ~9 months after
    let expiry_date = if batch_idx == 0 {
        today - Months::new(1)
    } else {
        today + Months::new((batch_idx as u32) * 9 + (seed % 6) as u32)
    };
    let manufactured_date = expiry_date - Months::new(24) - Days::new((seed % 30) as u64);

    // Unit price 0.50 - 25.49
    let sale_price_cents = 50 + ((seed * 37 + batch_idx * 11) % 2500) as i64;
    // Cost 55-75% of price
    let purchase_cost_cents = sale_price_cents * (55 + (seed % 21) as i64) / 100;

    NewBatch {
        medicine_id: medicine_id.to_string(),
        batch_number: format!("LOT-{:04}-{:02}", seed, batch_idx + 1),
        quantity: 20 + ((seed * 13 + batch_idx * 7) % 180) as i64,
        expiry_date,
        manufactured_date,
        sale_price_cents,
        purchase_cost_cents,
    }
}
