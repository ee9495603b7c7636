//! Listing records and the text normalisation applied before serving

use crate::error::Result;
use crate::utils::data_loader::string_column;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Placeholder for absent text values
pub const MISSING: &str = "missing";

/// Column holding the realised sale price
pub const TARGET_COLUMN: &str = "sold_price";

/// Columns every listing frame carries
pub const LISTING_COLUMNS: [&str; 11] = [
    "designer",
    "department",
    "category",
    "subcategory",
    "size",
    "color",
    "condition",
    "n_photos",
    "item_name",
    "description",
    "hashtags",
];

/// A single secondhand fashion listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub designer: String,
    pub department: String,
    pub category: String,
    pub subcategory: String,
    pub size: String,
    pub color: String,
    pub condition: String,
    pub n_photos: f64,
    pub item_name: String,
    pub description: String,
    pub hashtags: String,
    /// Absent at prediction time
    #[serde(default)]
    pub sold_price: Option<f64>,
}

/// Build the polars frame every component consumes
pub fn records_to_frame(records: &[ListingRecord]) -> Result<DataFrame> {
    fn text<'a>(records: &'a [ListingRecord], f: impl Fn(&'a ListingRecord) -> &'a str) -> Vec<&'a str> {
        records.iter().map(f).collect()
    }

    let df = df!(
        "designer" => text(records, |r| r.designer.as_str()),
        "department" => text(records, |r| r.department.as_str()),
        "category" => text(records, |r| r.category.as_str()),
        "subcategory" => text(records, |r| r.subcategory.as_str()),
        "size" => text(records, |r| r.size.as_str()),
        "color" => text(records, |r| r.color.as_str()),
        "condition" => text(records, |r| r.condition.as_str()),
        "n_photos" => records.iter().map(|r| r.n_photos).collect::<Vec<f64>>(),
        "item_name" => text(records, |r| r.item_name.as_str()),
        "description" => text(records, |r| r.description.as_str()),
        "hashtags" => text(records, |r| r.hashtags.as_str()),
        TARGET_COLUMN => records.iter().map(|r| r.sold_price).collect::<Vec<Option<f64>>>(),
    )?;
    Ok(df)
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "s", "same", "she", "should",
    "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "you", "your", "yours", "yourself", "yourselves",
];

/// Whether `word` is an English stop word
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Lowercase, tokenize on non-alphanumerics, drop stop words.
/// An empty result becomes [`MISSING`].
pub fn clean_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !is_stop_word(t))
        .collect();
    if tokens.is_empty() {
        MISSING.to_string()
    } else {
        tokens.join(" ")
    }
}

/// Apply [`clean_text`] to the given columns; nulls become [`MISSING`]
pub fn clean_text_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let mut out = df.clone();
    for name in columns {
        let values = string_column(df, name)?;
        let cleaned: Vec<String> = values
            .iter()
            .map(|v| v.as_deref().map(clean_text).unwrap_or_else(|| MISSING.to_string()))
            .collect();
        out.with_column(Series::new(name.as_str().into(), cleaned))?;
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::ListingRecord;

    pub fn record(
        designer: &str,
        category: &str,
        size: &str,
        condition: &str,
        price: f64,
    ) -> ListingRecord {
        ListingRecord {
            designer: designer.to_string(),
            department: if category == "bottoms" { "menswear" } else { "womenswear" }.to_string(),
            category: category.to_string(),
            subcategory: format!("{} basics", category),
            size: size.to_string(),
            color: "black".to_string(),
            condition: condition.to_string(),
            n_photos: 4.0,
            item_name: format!("{} {}", designer, category),
            description: "great piece, barely worn".to_string(),
            hashtags: "missing".to_string(),
            sold_price: Some(price),
        }
    }

    /// Five listings covering every default size chart
    pub fn five_listings() -> Vec<ListingRecord> {
        vec![
            record("Acne Studios", "tops", "S", "Used", 100.0),
            record("Levi's", "bottoms", "28", "Gently Used", 200.0),
            record("Acne Studios", "dresses", "XS", "New", 150.0),
            record("Hermes", "accessories", "ONE SIZE", "Worn", 300.0),
            record("Nike", "footwear", "8", "New", 400.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_sorted() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("The BEST jacket, in great shape!"), "best jacket great shape");
        assert_eq!(clean_text("  "), MISSING);
        assert_eq!(clean_text("of the and"), MISSING);
    }

    #[test]
    fn test_records_to_frame() {
        let df = records_to_frame(&fixtures::five_listings()).unwrap();
        assert_eq!(df.height(), 5);
        assert_eq!(df.width(), 12);
        let sizes = string_column(&df, "size").unwrap();
        assert_eq!(sizes[1].as_deref(), Some("28"));
    }

    #[test]
    fn test_clean_text_columns() {
        let df = df!(
            "description" => &[Some("Worn twice, no flaws"), None],
            "n_photos" => &[1.0, 2.0],
        )
        .unwrap();
        let cleaned = clean_text_columns(&df, &["description".to_string()]).unwrap();
        let values = string_column(&cleaned, "description").unwrap();
        assert_eq!(values[0].as_deref(), Some("worn twice flaws"));
        assert_eq!(values[1].as_deref(), Some(MISSING));
    }
}
