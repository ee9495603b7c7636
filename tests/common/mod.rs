//! Shared listing generator for the integration tests

#![allow(dead_code)]

use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use resale_price::listing::{records_to_frame, ListingRecord, MISSING};

const DESIGNERS: [(&str, f64); 6] = [
    ("Acne Studios", 180.0),
    ("Levi's", 60.0),
    ("Hermes", 900.0),
    ("Nike", 90.0),
    ("Prada", 600.0),
    ("Uniqlo", 25.0),
];

const CATEGORIES: [(&str, &str, &[&str]); 5] = [
    ("tops", "womenswear", &["XS", "S", "M", "L", "XL"]),
    ("bottoms", "menswear", &["28", "30", "32", "34", "36"]),
    ("footwear", "menswear", &["7", "8", "9", "10", "11"]),
    ("outerwear", "womenswear", &["S", "M", "L"]),
    ("accessories", "womenswear", &["ONE SIZE", "OS", "n/a"]),
];

const CONDITIONS: [(&str, f64); 4] = [("Worn", 0.4), ("Used", 0.6), ("Gently Used", 0.8), ("New", 1.0)];

const COLORS: [&str; 4] = ["black", "white", "navy", "olive"];

const PHRASES: [&str; 8] = [
    "great condition barely worn",
    "vintage piece with small flaws",
    "brand new with tags, amazing fit",
    "classic cut in soft cotton",
    "runs small, beautiful colour",
    "worn a few times, still excellent",
    "some fading and a tiny hole",
    "perfect for everyday wear",
];

/// `n` reproducible listings with prices driven by designer, condition and photos
pub fn listings(n: usize, seed: u64) -> Vec<ListingRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let (designer, base) = DESIGNERS[rng.gen_range(0..DESIGNERS.len())];
            let (category, department, sizes) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
            let (condition, factor) = CONDITIONS[rng.gen_range(0..CONDITIONS.len())];
            let n_photos = rng.gen_range(1..=8) as f64;
            let phrase = PHRASES[rng.gen_range(0..PHRASES.len())];
            let hashtags = if rng.gen_bool(0.3) {
                MISSING.to_string()
            } else {
                format!("#{} #{}", designer.to_lowercase().replace(' ', ""), category)
            };
            let noise = 1.0 + rng.gen_range(-0.1..0.1);

            ListingRecord {
                designer: designer.to_string(),
                department: department.to_string(),
                category: category.to_string(),
                subcategory: format!("{} {}", category, i % 3),
                size: sizes[rng.gen_range(0..sizes.len())].to_string(),
                color: COLORS[rng.gen_range(0..COLORS.len())].to_string(),
                condition: condition.to_string(),
                n_photos,
                item_name: format!("{} {} {}", designer, COLORS[i % COLORS.len()], category),
                description: phrase.to_string(),
                hashtags,
                sold_price: Some((base * factor * (1.0 + 0.05 * n_photos) * noise).round()),
            }
        })
        .collect()
}

/// Listing frame with the `sold_price` column split off
pub fn frame(n: usize, seed: u64) -> (DataFrame, Vec<f64>) {
    let records = listings(n, seed);
    let y = records.iter().filter_map(|r| r.sold_price).collect();
    let df = records_to_frame(&records).unwrap();
    (df.drop("sold_price").unwrap(), y)
}
