use anyhow::{Context, Result};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;

use crate::{
    cart::CartLine,
    checkout::{CartTotals, CheckoutDraft},
    models::{CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderStatus, PaymentMethod},
    schema::{cart_items, order_items, orders, products},
};

/// First line whose quantity exceeds the stock read for this request, as a
/// customer-facing message.
pub fn check_stock(lines: &[CartLine]) -> Option<String> {
    lines
        .iter()
        .find(|line| line.product.stock < line.quantity)
        .map(|line| format!("Sản phẩm {} không đủ số lượng.", line.product.name))
}

pub struct PlaceOrder {
    pub user_id: i32,
    pub draft: CheckoutDraft,
    pub payment_method: PaymentMethod,
    pub coupon_code: String,
    pub totals: CartTotals,
}

struct LineSnapshot {
    product_id: i32,
    product_name: String,
    price: Decimal,
    quantity: i32,
    remaining_stock: i32,
}

/// Writes the order, its item snapshots and the stock adjustments, and
/// empties the DB cart, all in one transaction. Item names and prices are
/// copied from the product rows read for this request, so later catalog
/// edits leave the order untouched. Stock never goes below zero.
pub async fn place_order(
    conn: &mut AsyncPgConnection,
    order: PlaceOrder,
    lines: &[CartLine],
) -> Result<OrderEntity> {
    let snapshots: Vec<LineSnapshot> = lines
        .iter()
        .map(|line| LineSnapshot {
            product_id: line.product.id,
            product_name: line.product.name.clone(),
            price: line.product.price,
            quantity: line.quantity,
            remaining_stock: (line.product.stock - line.quantity).max(0),
        })
        .collect();

    let PlaceOrder {
        user_id,
        draft,
        payment_method,
        coupon_code,
        totals,
    } = order;

    let row = CreateOrderEntity {
        user_id: Some(user_id),
        full_name: draft.full_name,
        phone: draft.phone,
        email: draft.email,
        delivery_method: draft.delivery_method.as_str().to_string(),
        city: if draft.city_name.is_empty() {
            draft.city
        } else {
            draft.city_name
        },
        ward: if draft.ward_name.is_empty() {
            draft.ward
        } else {
            draft.ward_name
        },
        address: draft.address,
        delivery_time: draft.delivery_time,
        note: draft.note,
        invoice_required: draft.invoice_required,
        payment_method: payment_method.as_str().to_string(),
        coupon_code,
        subtotal: totals.subtotal,
        discount: totals.discount,
        shipping: totals.shipping,
        total: totals.total,
        status: OrderStatus::Pending.as_str().to_string(),
    };

    let order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(row)
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let items: Vec<CreateOrderItemEntity> = snapshots
                    .iter()
                    .map(|line| CreateOrderItemEntity {
                        order_id: order.id,
                        product_id: line.product_id,
                        product_name: line.product_name.clone(),
                        price: line.price,
                        quantity: line.quantity,
                        total: line.price * Decimal::from(line.quantity),
                    })
                    .collect();

                diesel::insert_into(order_items::table)
                    .values(items)
                    .execute(conn)
                    .await
                    .context("Failed to create order items")?;

                for line in &snapshots {
                    diesel::update(products::table.find(line.product_id))
                        .set(products::stock.eq(line.remaining_stock))
                        .execute(conn)
                        .await
                        .context("Failed to adjust product stock")?;
                }

                diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user_id)))
                    .execute(conn)
                    .await
                    .context("Failed to clear cart")?;

                Ok::<OrderEntity, anyhow::Error>(order)
            })
        })
        .await
        .context("Order transaction failed")?;

    tracing::info!("Order #{} has been placed by user #{}", order.id, user_id);
    Ok(order)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::ProductEntity;

    fn line(name: &str, stock: i32, quantity: i32) -> CartLine {
        let price = dec!(100000);
        CartLine {
            product: ProductEntity {
                id: 1,
                name: name.to_string(),
                slug: "p".into(),
                brand_id: 1,
                category_id: 1,
                price,
                old_price: None,
                stock,
                description: String::new(),
                specifications: String::new(),
                image_url: String::new(),
                is_active: true,
                is_featured: false,
                created_at: Utc::now(),
            },
            quantity,
            total_price: price * Decimal::from(quantity),
        }
    }

    #[test]
    fn stock_check_reports_the_first_short_line() {
        assert_eq!(check_stock(&[]), None);
        assert_eq!(check_stock(&[line("Laptop", 5, 5)]), None);
        assert_eq!(
            check_stock(&[line("Laptop", 5, 6), line("Chuột", 0, 1)]),
            Some("Sản phẩm Laptop không đủ số lượng.".to_string())
        );
    }
}
