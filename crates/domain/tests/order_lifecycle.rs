//! Integration tests for the order model.
//!
//! These tests drive an order and the inventory it reserves through the
//! full status lifecycle without any storage.

use chrono::Utc;
use common::{ProductId, UserId};
use domain::{InventoryError, InventoryRecord, Money, Order, OrderError, OrderStatus};

fn reserve_line(order: &mut Order, record: &mut InventoryRecord, quantity: u32, price: Money) {
    record.reserve(quantity).unwrap();
    order.add_line(record.product_id, quantity, price).unwrap();
}

mod lifecycle {
    use super::*;

    #[test]
    fn happy_path_to_delivered() {
        let mut record = InventoryRecord::new(ProductId::new(), 10);
        let mut order = Order::pending(UserId::new(), Utc::now());

        reserve_line(&mut order, &mut record, 2, Money::from_cents(1000));
        reserve_line(&mut order, &mut record, 1, Money::from_cents(1000));

        assert_eq!(order.total_amount().cents(), 3000);
        assert_eq!(order.total_quantity(), 3);
        assert_eq!((record.available, record.reserved), (7, 3));

        for next in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            order.transition_to(next, Utc::now()).unwrap();
        }
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.status().is_terminal());
    }

    #[test]
    fn cancel_releases_reserved_but_not_available() {
        let mut record = InventoryRecord::new(ProductId::new(), 5);
        let mut order = Order::pending(UserId::new(), Utc::now());
        reserve_line(&mut order, &mut record, 3, Money::from_cents(500));
        order
            .transition_to(OrderStatus::Processing, Utc::now())
            .unwrap();

        order
            .transition_to(OrderStatus::Cancelled, Utc::now())
            .unwrap();
        for line in order.lines() {
            record.release(line.quantity).unwrap();
        }

        assert_eq!((record.available, record.reserved), (2, 0));
    }

    #[test]
    fn delivered_order_rejects_cancellation() {
        let mut order = Order::pending(UserId::new(), Utc::now());
        for next in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            order.transition_to(next, Utc::now()).unwrap();
        }

        let err = order
            .transition_to(OrderStatus::Cancelled, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            }
        );
        assert_eq!(order.status(), OrderStatus::Delivered);
    }
}

mod inventory {
    use super::*;

    #[test]
    fn over_reservation_leaves_record_untouched() {
        let product_id = ProductId::new();
        let mut record = InventoryRecord::new(product_id, 2);

        let err = record.reserve(3).unwrap_err();

        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                product_id,
                requested: 3,
                available: 2,
            }
        );
        assert_eq!((record.available, record.reserved), (2, 0));
    }

    #[test]
    fn price_is_frozen_on_the_line() {
        let mut record = InventoryRecord::new(ProductId::new(), 5);
        let mut order = Order::pending(UserId::new(), Utc::now());
        let mut price = Money::from_cents(250);

        reserve_line(&mut order, &mut record, 2, price);
        price = Money::from_cents(9999);

        assert_eq!(order.lines()[0].unit_price, Money::from_cents(250));
        assert_ne!(order.lines()[0].unit_price, price);
        assert_eq!(order.total_amount().cents(), 500);
    }
}
