use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use resale_price::listing::{records_to_frame, ListingRecord, MISSING};
use resale_price::model::{Model, ModelConfig};
use resale_price::training::EstimatorKind;

const DESIGNERS: [&str; 5] = ["Acne Studios", "Levi's", "Hermes", "Nike", "Uniqlo"];
const CATEGORIES: [(&str, &str); 3] = [("tops", "M"), ("bottoms", "32"), ("footwear", "9")];
const CONDITIONS: [&str; 4] = ["Worn", "Used", "Gently Used", "New"];

fn create_listings(n_rows: usize) -> (DataFrame, Vec<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let records: Vec<ListingRecord> = (0..n_rows)
        .map(|i| {
            let designer = DESIGNERS[rng.gen_range(0..DESIGNERS.len())];
            let (category, size) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
            ListingRecord {
                designer: designer.to_string(),
                department: "menswear".to_string(),
                category: category.to_string(),
                subcategory: format!("{} {}", category, i % 4),
                size: size.to_string(),
                color: "black".to_string(),
                condition: CONDITIONS[rng.gen_range(0..CONDITIONS.len())].to_string(),
                n_photos: rng.gen_range(1..=8) as f64,
                item_name: format!("{} {}", designer, category),
                description: "great condition, barely worn".to_string(),
                hashtags: if i % 3 == 0 { MISSING.to_string() } else { format!("#{}", category) },
                sold_price: Some(rng.gen_range(20.0..900.0_f64).round()),
            }
        })
        .collect();
    let y = records.iter().filter_map(|r| r.sold_price).collect();
    let df = records_to_frame(&records).unwrap();
    (df.drop("sold_price").unwrap(), y)
}

fn config(text: bool) -> ModelConfig {
    ModelConfig::new(EstimatorKind::Ridge.into()).with_text_features(text)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    for n_rows in [500, 2000].iter() {
        let (df, y) = create_listings(*n_rows);
        let log_y: Vec<f64> = y.iter().map(|v| v.ln_1p()).collect();

        for text in [false, true] {
            let label = if text { "tabular+text" } else { "tabular" };
            group.bench_with_input(BenchmarkId::new(label, n_rows), &df, |b, df| {
                b.iter(|| {
                    let mut model = Model::new(config(text)).unwrap();
                    model.fit(black_box(df), &log_y).unwrap();
                })
            });
        }
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");

    let (train_df, y) = create_listings(2000);
    let log_y: Vec<f64> = y.iter().map(|v| v.ln_1p()).collect();
    let mut model = Model::new(config(true)).unwrap();
    model.fit(&train_df, &log_y).unwrap();

    for n_rows in [100, 1000].iter() {
        let (df, _) = create_listings(*n_rows);
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &df, |b, df| {
            b.iter(|| model.predict(black_box(df)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
