use anyhow::{Context, Result};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, upsert::excluded};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::{
    models::{CartItemEntity, CreateCartItemEntity, ProductEntity},
    schema::{cart_items, products},
    session::SessionHandle,
};

/// Adds `quantity` to the user's line for a product with a single upsert, so
/// two concurrent adds both land on the one row instead of racing a
/// read-modify-write. Non-positive quantities are ignored.
pub async fn add(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    product_id: i32,
    quantity: i32,
) -> Result<()> {
    if quantity <= 0 {
        return Ok(());
    }

    diesel::insert_into(cart_items::table)
        .values(CreateCartItemEntity {
            user_id,
            product_id,
            quantity,
        })
        .on_conflict((cart_items::user_id, cart_items::product_id))
        .do_update()
        .set(cart_items::quantity.eq(cart_items::quantity + excluded(cart_items::quantity)))
        .execute(conn)
        .await
        .context("Failed to upsert cart item")?;

    Ok(())
}

/// Drops a line's quantity by one, deleting the row when it reaches zero.
/// Missing lines are a no-op.
pub async fn decrease(conn: &mut AsyncPgConnection, user_id: i32, product_id: i32) -> Result<()> {
    let item: Option<CartItemEntity> = cart_items::table
        .find((user_id, product_id))
        .select(CartItemEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to load cart item")?;

    let Some(item) = item else {
        return Ok(());
    };

    if item.quantity <= 1 {
        diesel::delete(cart_items::table.find((user_id, product_id)))
            .execute(conn)
            .await
            .context("Failed to delete cart item")?;
    } else {
        diesel::update(cart_items::table.find((user_id, product_id)))
            .set(cart_items::quantity.eq(item.quantity - 1))
            .execute(conn)
            .await
            .context("Failed to update cart item")?;
    }

    Ok(())
}

pub async fn remove(conn: &mut AsyncPgConnection, user_id: i32, product_id: i32) -> Result<()> {
    diesel::delete(cart_items::table.find((user_id, product_id)))
        .execute(conn)
        .await
        .context("Failed to remove cart item")?;
    Ok(())
}

pub async fn clear(conn: &mut AsyncPgConnection, user_id: i32) -> Result<()> {
    diesel::delete(cart_items::table.filter(cart_items::user_id.eq(user_id)))
        .execute(conn)
        .await
        .context("Failed to clear cart")?;
    Ok(())
}

/// Loads the user's cart joined with its products, oldest line first so the
/// listing order is stable across requests.
pub async fn load_lines(
    conn: &mut AsyncPgConnection,
    user_id: i32,
) -> Result<Vec<(CartItemEntity, ProductEntity)>> {
    let lines = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::user_id.eq(user_id))
        .order((cart_items::created_at.asc(), cart_items::product_id.asc()))
        .select((CartItemEntity::as_select(), ProductEntity::as_select()))
        .load::<(CartItemEntity, ProductEntity)>(conn)
        .await
        .context("Failed to load cart lines")?;
    Ok(lines)
}

/// Folds the session cart into the user's DB cart and empties the session
/// copy. Quantities are added to whatever the DB cart already holds; lines
/// naming products that no longer exist are dropped. The session cart is
/// only cleared once the merge lands, so a failed merge loses nothing and a
/// repeated call is a no-op.
pub async fn merge_session_cart(
    conn: &mut AsyncPgConnection,
    session: &SessionHandle,
    user_id: i32,
) -> Result<()> {
    let cart = session.cart();
    if cart.is_empty() {
        return Ok(());
    }

    let ids = cart.product_ids();
    let known_ids: Vec<i32> = products::table
        .filter(products::id.eq_any(&ids))
        .select(products::id)
        .load(conn)
        .await
        .context("Failed to check products for cart merge")?;

    let lines: Vec<(i32, i32)> = cart
        .iter()
        .filter(|(product_id, _)| known_ids.contains(product_id))
        .collect();
    if lines.is_empty() {
        session.take_cart();
        return Ok(());
    }

    let merged = lines.len();
    conn.transaction(move |conn| {
        Box::pin(async move {
            for (product_id, quantity) in lines {
                add(conn, user_id, product_id, quantity).await?;
            }
            Ok::<(), anyhow::Error>(())
        })
    })
    .await
    .context("Cart merge transaction failed")?;

    session.take_cart();
    tracing::info!("Merged {} session cart lines for user #{}", merged, user_id);
    Ok(())
}
