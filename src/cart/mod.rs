pub mod db;
pub mod session;

use anyhow::Result;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::{CartItemEntity, ProductEntity},
    schema::products,
    session::SessionHandle,
};

/// One cart line with its product and the line total at today's price.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct CartLine {
    pub product: ProductEntity,
    pub quantity: i32,
    pub total_price: Decimal,
}

/// The cart behind a request. Anonymous visitors keep their cart in the
/// session row; authenticated customers keep theirs in `cart_items`. Both
/// modes answer the same operations so handlers never branch on login state.
///
/// Resolution looks only at the session, never at the database; the session
/// cart is folded into the DB cart once, at login.
pub enum Cart {
    Session(SessionHandle),
    Db {
        user_id: i32,
        cache: Option<Vec<(CartItemEntity, ProductEntity)>>,
    },
}

impl Cart {
    pub fn resolve(session: &SessionHandle) -> Self {
        match session.user_id() {
            Some(user_id) => Self::Db {
                user_id,
                cache: None,
            },
            None => Self::Session(session.clone()),
        }
    }

    pub async fn add(
        &mut self,
        conn: &mut AsyncPgConnection,
        product_id: i32,
        quantity: i32,
    ) -> Result<()> {
        match self {
            Self::Session(session) => {
                session.with_cart(|cart| cart.add(product_id, quantity));
                Ok(())
            }
            Self::Db { user_id, cache } => {
                db::add(conn, *user_id, product_id, quantity).await?;
                *cache = None;
                Ok(())
            }
        }
    }

    pub async fn decrease(&mut self, conn: &mut AsyncPgConnection, product_id: i32) -> Result<()> {
        match self {
            Self::Session(session) => {
                session.with_cart(|cart| cart.decrease(product_id));
                Ok(())
            }
            Self::Db { user_id, cache } => {
                db::decrease(conn, *user_id, product_id).await?;
                *cache = None;
                Ok(())
            }
        }
    }

    pub async fn remove(&mut self, conn: &mut AsyncPgConnection, product_id: i32) -> Result<()> {
        match self {
            Self::Session(session) => {
                session.with_cart(|cart| cart.remove(product_id));
                Ok(())
            }
            Self::Db { user_id, cache } => {
                db::remove(conn, *user_id, product_id).await?;
                *cache = None;
                Ok(())
            }
        }
    }

    pub async fn clear(&mut self, conn: &mut AsyncPgConnection) -> Result<()> {
        match self {
            Self::Session(session) => {
                session.with_cart(|cart| cart.clear());
                Ok(())
            }
            Self::Db { user_id, cache } => {
                db::clear(conn, *user_id).await?;
                *cache = None;
                Ok(())
            }
        }
    }

    /// Number of units across all lines. For session carts this counts the
    /// stored payload directly, without touching the database.
    pub async fn total_quantity(&mut self, conn: &mut AsyncPgConnection) -> Result<i64> {
        match self {
            Self::Session(session) => Ok(session.cart().total_quantity()),
            Self::Db { user_id, cache } => {
                let lines = Self::cached_db_lines(conn, *user_id, cache).await?;
                Ok(lines.iter().map(|(item, _)| item.quantity as i64).sum())
            }
        }
    }

    pub async fn total_price(&mut self, conn: &mut AsyncPgConnection) -> Result<Decimal> {
        let lines = self.lines(conn).await?;
        Ok(lines.iter().map(|line| line.total_price).sum())
    }

    /// Materializes the cart with product rows. Session lines whose product
    /// has disappeared are skipped. Session carts list by ascending product
    /// id, DB carts by line age.
    pub async fn lines(&mut self, conn: &mut AsyncPgConnection) -> Result<Vec<CartLine>> {
        match self {
            Self::Session(session) => {
                let snapshot = session.cart();
                let ids = snapshot.product_ids();
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let loaded: Vec<ProductEntity> = products::table
                    .filter(products::id.eq_any(&ids))
                    .order(products::id.asc())
                    .select(ProductEntity::as_select())
                    .load(conn)
                    .await?;
                Ok(loaded
                    .into_iter()
                    .map(|product| {
                        let quantity = snapshot.quantity(product.id);
                        CartLine {
                            total_price: product.price * Decimal::from(quantity),
                            quantity,
                            product,
                        }
                    })
                    .collect())
            }
            Self::Db { user_id, cache } => {
                let lines = Self::cached_db_lines(conn, *user_id, cache).await?;
                Ok(lines
                    .iter()
                    .map(|(item, product)| CartLine {
                        product: product.clone(),
                        quantity: item.quantity,
                        total_price: product.price * Decimal::from(item.quantity),
                    })
                    .collect())
            }
        }
    }

    /// The distinct products the cart references, for bulk display.
    pub async fn products(&mut self, conn: &mut AsyncPgConnection) -> Result<Vec<ProductEntity>> {
        let lines = self.lines(conn).await?;
        Ok(lines.into_iter().map(|line| line.product).collect())
    }

    async fn cached_db_lines<'a>(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        cache: &'a mut Option<Vec<(CartItemEntity, ProductEntity)>>,
    ) -> Result<&'a [(CartItemEntity, ProductEntity)]> {
        if cache.is_none() {
            *cache = Some(db::load_lines(conn, user_id).await?);
        }
        Ok(cache.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_picks_the_backend_from_the_session() {
        let anonymous = SessionHandle::anonymous();
        assert!(matches!(Cart::resolve(&anonymous), Cart::Session(_)));

        anonymous.login(42, "customer");
        assert!(matches!(
            Cart::resolve(&anonymous),
            Cart::Db { user_id: 42, .. }
        ));
    }
}
