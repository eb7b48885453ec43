use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Anonymous cart payload stored in the session row's `cart` slot, keyed by
/// product id. JSON object keys are strings, so the slot round-trips as
/// `{"5": 2}`.
///
/// Quantities are strictly positive: any operation that would leave a line at
/// zero or below removes the line instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCart(BTreeMap<i32, i32>);

impl SessionCart {
    /// Adds `quantity` to a line, creating it if absent. Non-positive
    /// quantities are ignored.
    pub fn add(&mut self, product_id: i32, quantity: i32) {
        if quantity <= 0 {
            return;
        }
        let line = self.0.entry(product_id).or_insert(0);
        *line = line.saturating_add(quantity);
        if *line <= 0 {
            self.0.remove(&product_id);
        }
    }

    /// Drops a line's quantity by one, removing the line when it hits zero.
    pub fn decrease(&mut self, product_id: i32) {
        if let Some(line) = self.0.get_mut(&product_id) {
            *line -= 1;
            if *line <= 0 {
                self.0.remove(&product_id);
            }
        }
    }

    pub fn remove(&mut self, product_id: i32) {
        self.0.remove(&product_id);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn quantity(&self, product_id: i32) -> i32 {
        self.0.get(&product_id).copied().unwrap_or(0)
    }

    pub fn total_quantity(&self) -> i64 {
        self.0.values().map(|quantity| *quantity as i64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Product ids in ascending order, which fixes the listing order for
    /// anonymous carts.
    pub fn product_ids(&self) -> Vec<i32> {
        self.0.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.0.iter().map(|(id, quantity)| (*id, *quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates_per_product() {
        let mut cart = SessionCart::default();
        cart.add(5, 2);
        cart.add(5, 3);
        cart.add(7, 1);
        assert_eq!(cart.quantity(5), 5);
        assert_eq!(cart.quantity(7), 1);
        assert_eq!(cart.total_quantity(), 6);
    }

    #[test]
    fn add_ignores_non_positive_quantities() {
        let mut cart = SessionCart::default();
        cart.add(5, 0);
        cart.add(5, -3);
        assert!(cart.is_empty());

        cart.add(5, 2);
        cart.add(5, -1);
        assert_eq!(cart.quantity(5), 2);
    }

    #[test]
    fn decrease_removes_the_line_at_zero() {
        let mut cart = SessionCart::default();
        cart.add(5, 2);
        cart.decrease(5);
        assert_eq!(cart.quantity(5), 1);
        cart.decrease(5);
        assert_eq!(cart.quantity(5), 0);
        assert!(cart.is_empty());

        // Unknown products are a no-op.
        cart.decrease(9);
        assert!(cart.is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let mut cart = SessionCart::default();
        cart.add(5, 2);
        cart.add(7, 1);
        cart.remove(5);
        assert_eq!(cart.quantity(5), 0);
        assert_eq!(cart.total_quantity(), 1);
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn product_ids_are_sorted() {
        let mut cart = SessionCart::default();
        cart.add(9, 1);
        cart.add(2, 1);
        cart.add(5, 1);
        assert_eq!(cart.product_ids(), vec![2, 5, 9]);
    }

    #[test]
    fn serializes_with_string_keys() {
        let mut cart = SessionCart::default();
        cart.add(5, 2);
        cart.add(12, 1);
        let value = serde_json::to_value(&cart).unwrap();
        assert_eq!(value, serde_json::json!({"5": 2, "12": 1}));

        let back: SessionCart = serde_json::from_value(value).unwrap();
        assert_eq!(back, cart);
    }
}
