#![forbid(unsafe_code)]

use crate::model::ContentItem;
use std::cmp::Ordering;

/// Listing order for content items.
///
/// Items carrying a manual `order` always sort before items without one,
/// ascending by `order`. Order-less items fall back to most-recent-first by
/// `modified_ms`. Ties break on `key` so the listing is deterministic.
pub fn listing_order(a: &ContentItem, b: &ContentItem) -> Ordering {
    match (a.order, b.order) {
        (Some(left), Some(right)) => left
            .cmp(&right)
            .then_with(|| b.modified_ms.cmp(&a.modified_ms))
            .then_with(|| a.key.cmp(&b.key)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b
            .modified_ms
            .cmp(&a.modified_ms)
            .then_with(|| a.key.cmp(&b.key)),
    }
}
