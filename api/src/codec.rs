//! Binary layout of the `game_categories.categories` column.
//!
//! A little-endian `u16` count followed by that many little-endian `u16`
//! category ids. A count with nothing after it reads as no categories.

use crate::models::Categories;

pub fn encode(categories: &[u16]) -> Vec<u8> {
    assert!(
        categories.len() <= usize::from(u16::MAX),
        "too many categories to encode: {}",
        categories.len()
    );

    let mut encoded = Vec::with_capacity(2 + categories.len() * 2);
    encoded.extend_from_slice(&(categories.len() as u16).to_le_bytes());
    for category in categories {
        encoded.extend_from_slice(&category.to_le_bytes());
    }
    encoded
}

/// Panics on bytes that were not produced by [`encode`].
pub fn decode(encoded: &[u8]) -> Categories {
    assert!(
        encoded.len() >= 2,
        "encoded categories too short: {} bytes",
        encoded.len()
    );

    let count = usize::from(u16::from_le_bytes([encoded[0], encoded[1]]));
    let body = &encoded[2..];
    if body.is_empty() {
        return Vec::new();
    }

    assert_eq!(
        body.len(),
        count * 2,
        "encoded categories declare {count} ids but carry {} bytes",
        body.len()
    );

    body.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
