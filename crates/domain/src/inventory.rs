//! Inventory records and catalog products.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;
use crate::order::Money;

/// A catalog product as seen by the fulfillment engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current catalog price. Orders copy it into their lines.
    pub price: Money,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            price,
        }
    }
}

/// Per-product stock levels.
///
/// `available` is what can still be sold; `reserved` counts units backing
/// non-terminal orders. Both are unsigned, so neither can go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub available: u32,
    pub reserved: u32,
}

impl InventoryRecord {
    pub fn new(product_id: ProductId, available: u32) -> Self {
        Self {
            product_id,
            available,
            reserved: 0,
        }
    }

    /// A record for a product that has never been stocked.
    pub fn empty(product_id: ProductId) -> Self {
        Self::new(product_id, 0)
    }

    /// Moves `quantity` units from available to reserved.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), InventoryError> {
        if self.available < quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: self.product_id,
                requested: quantity,
                available: self.available,
            });
        }
        let reserved =
            self.reserved
                .checked_add(quantity)
                .ok_or(InventoryError::ReservedOverflow {
                    product_id: self.product_id,
                    requested: quantity,
                    reserved: self.reserved,
                })?;
        self.available -= quantity;
        self.reserved = reserved;
        Ok(())
    }

    /// Drops `quantity` units from reserved without returning them to available.
    pub fn release(&mut self, quantity: u32) -> Result<(), InventoryError> {
        if self.reserved < quantity {
            return Err(InventoryError::ReleaseExceedsReserved {
                product_id: self.product_id,
                requested: quantity,
                reserved: self.reserved,
            });
        }
        self.reserved -= quantity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_moves_stock() {
        let mut record = InventoryRecord::new(ProductId::new(), 5);
        record.reserve(3).unwrap();

        assert_eq!(record.available, 2);
        assert_eq!(record.reserved, 3);
    }

    #[test]
    fn test_reserve_exact_stock() {
        let mut record = InventoryRecord::new(ProductId::new(), 4);
        record.reserve(4).unwrap();

        assert_eq!(record.available, 0);
        assert_eq!(record.reserved, 4);
    }

    #[test]
    fn test_reserve_insufficient_leaves_record_unchanged() {
        let mut record = InventoryRecord::new(ProductId::new(), 2);
        let before = record;

        let err = record.reserve(3).unwrap_err();

        assert!(matches!(
            err,
            InventoryError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(record, before);
    }

    #[test]
    fn test_reserve_overflowing_reserved_leaves_record_unchanged() {
        let mut record = InventoryRecord {
            product_id: ProductId::new(),
            available: 10,
            reserved: u32::MAX - 1,
        };
        let before = record;

        let err = record.reserve(2).unwrap_err();

        assert!(matches!(err, InventoryError::ReservedOverflow { requested: 2, .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn test_release_only_touches_reserved() {
        let mut record = InventoryRecord::new(ProductId::new(), 5);
        record.reserve(3).unwrap();
        record.release(3).unwrap();

        assert_eq!(record.available, 2);
        assert_eq!(record.reserved, 0);
    }

    #[test]
    fn test_release_more_than_reserved_fails() {
        let mut record = InventoryRecord::new(ProductId::new(), 5);
        record.reserve(1).unwrap();

        let err = record.release(2).unwrap_err();
        assert!(matches!(err, InventoryError::ReleaseExceedsReserved { .. }));
        assert_eq!(record.reserved, 1);
    }
}
