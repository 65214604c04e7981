//! Joins stock rows onto product rows by SKU.

use std::collections::{BTreeMap, HashMap};

use crate::models::{FeedRow, Sku, UnifiedRecord};

/// Merge both feeds into one record per product SKU.
///
/// The product feed decides which SKUs exist: stock rows without a product
/// row are ignored. Stock values override product values for the same
/// column. Within one feed the last row for a SKU wins.
pub fn merge(stock: Vec<FeedRow>, products: Vec<FeedRow>) -> BTreeMap<Sku, UnifiedRecord> {
    let mut stock_map: HashMap<Sku, FeedRow> = stock
        .into_iter()
        .map(|row| (row.sku().clone(), row))
        .collect();

    let product_map: BTreeMap<Sku, FeedRow> = products
        .into_iter()
        .map(|row| (row.sku().clone(), row))
        .collect();

    let mut merged = BTreeMap::new();
    for (sku, product) in product_map {
        let mut fields = product.into_fields();
        if let Some(stock_row) = stock_map.remove(&sku) {
            fields.extend(stock_row.into_fields());
        }
        merged.insert(sku.clone(), UnifiedRecord { sku, fields });
    }

    if !stock_map.is_empty() {
        log::debug!(
            "{} stock SKUs have no product row and are skipped",
            stock_map.len()
        );
    }

    merged
}
