use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    cart::session::SessionCart,
    checkout::CheckoutDraft,
    models::{SaveSessionEntity, SessionEntity},
};

/// In-memory view of one session row, shared with handlers for the duration
/// of a request. All writes go through methods that flip the dirty flag, and
/// the session middleware persists the row once the handler has finished.
#[derive(Debug, Default)]
struct SessionInner {
    token: Option<Uuid>,
    user_id: Option<i32>,
    role: Option<String>,
    cart: SessionCart,
    checkout: Option<CheckoutDraft>,
    dirty: bool,
    rotated: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SessionHandle(Arc<Mutex<SessionInner>>);

impl SessionHandle {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builds the handle from a loaded row. Slots that fail to decode are
    /// dropped rather than failing the request; the row is rewritten on the
    /// next mutation anyway.
    pub fn from_entity(entity: SessionEntity) -> Self {
        let cart = entity
            .cart
            .map(|value| match serde_json::from_value(value) {
                Ok(cart) => cart,
                Err(err) => {
                    tracing::warn!("Discarding undecodable session cart: {err}");
                    SessionCart::default()
                }
            })
            .unwrap_or_default();
        let checkout = entity.checkout.and_then(|value| {
            match serde_json::from_value::<CheckoutDraft>(value) {
                Ok(draft) => Some(draft),
                Err(err) => {
                    tracing::warn!("Discarding undecodable checkout draft: {err}");
                    None
                }
            }
        });

        Self(Arc::new(Mutex::new(SessionInner {
            token: Some(entity.id),
            user_id: entity.user_id,
            role: entity.role,
            cart,
            checkout,
            dirty: false,
            rotated: false,
        })))
    }

    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user_id(&self) -> Option<i32> {
        self.inner().user_id
    }

    pub fn role(&self) -> Option<String> {
        self.inner().role.clone()
    }

    /// Marks the session authenticated. The token is rotated on the next
    /// write so a pre-login cookie can never name a logged-in row.
    pub fn login(&self, user_id: i32, role: &str) {
        let mut inner = self.inner();
        inner.user_id = Some(user_id);
        inner.role = Some(role.to_string());
        inner.dirty = true;
        inner.rotated = true;
    }

    /// Drops everything the session holds, cart and draft included.
    pub fn flush(&self) {
        let mut inner = self.inner();
        *inner = SessionInner {
            token: inner.token,
            dirty: true,
            rotated: true,
            ..SessionInner::default()
        };
    }

    pub fn cart(&self) -> SessionCart {
        self.inner().cart.clone()
    }

    pub fn with_cart<R>(&self, mutate: impl FnOnce(&mut SessionCart) -> R) -> R {
        let mut inner = self.inner();
        let result = mutate(&mut inner.cart);
        inner.dirty = true;
        result
    }

    /// Removes the cart from the session and returns it. Used by the merge
    /// step at login; a second call returns an empty cart, which keeps the
    /// merge idempotent.
    pub fn take_cart(&self) -> SessionCart {
        let mut inner = self.inner();
        inner.dirty = true;
        std::mem::take(&mut inner.cart)
    }

    pub fn checkout_draft(&self) -> Option<CheckoutDraft> {
        self.inner().checkout.clone()
    }

    pub fn set_checkout_draft(&self, draft: CheckoutDraft) {
        let mut inner = self.inner();
        inner.checkout = Some(draft);
        inner.dirty = true;
    }

    pub fn clear_checkout_draft(&self) {
        let mut inner = self.inner();
        if inner.checkout.take().is_some() {
            inner.dirty = true;
        }
    }

    // Middleware-facing accessors below.

    pub fn token(&self) -> Option<Uuid> {
        self.inner().token
    }

    pub fn is_dirty(&self) -> bool {
        self.inner().dirty
    }

    pub fn rotated(&self) -> bool {
        self.inner().rotated
    }

    /// True when there is nothing worth persisting; the middleware deletes
    /// the row and drops the cookie instead of writing an empty session.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner();
        inner.user_id.is_none() && inner.cart.is_empty() && inner.checkout.is_none()
    }

    pub fn save_row(&self, token: Uuid, expires_at: DateTime<Utc>) -> Result<SaveSessionEntity> {
        let inner = self.inner();
        let cart = if inner.cart.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&inner.cart).context("Failed to serialize session cart")?)
        };
        let checkout = inner
            .checkout
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .context("Failed to serialize checkout draft")?;

        Ok(SaveSessionEntity {
            id: token,
            user_id: inner.user_id,
            role: inner.role.clone(),
            cart,
            checkout,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sessions_are_empty_and_clean() {
        let session = SessionHandle::anonymous();
        assert!(session.is_empty());
        assert!(!session.is_dirty());
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn login_dirties_and_rotates() {
        let session = SessionHandle::anonymous();
        session.login(7, "customer");
        assert_eq!(session.user_id(), Some(7));
        assert_eq!(session.role().as_deref(), Some("customer"));
        assert!(session.is_dirty());
        assert!(session.rotated());
        assert!(!session.is_empty());
    }

    #[test]
    fn flush_clears_cart_and_draft() {
        let session = SessionHandle::anonymous();
        session.login(7, "customer");
        session.with_cart(|cart| cart.add(1, 2));
        session.flush();
        assert!(session.is_empty());
        assert!(session.cart().is_empty());
        assert_eq!(session.checkout_draft(), None);
    }

    #[test]
    fn take_cart_is_idempotent() {
        let session = SessionHandle::anonymous();
        session.with_cart(|cart| cart.add(3, 4));
        let first = session.take_cart();
        assert_eq!(first.quantity(3), 4);
        let second = session.take_cart();
        assert!(second.is_empty());
    }

    #[test]
    fn undecodable_slots_fall_back_to_empty() {
        let entity = SessionEntity {
            id: Uuid::new_v4(),
            user_id: Some(1),
            role: Some("customer".into()),
            cart: Some(serde_json::json!("not a cart")),
            checkout: Some(serde_json::json!(42)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: Utc::now(),
        };
        let session = SessionHandle::from_entity(entity);
        assert!(session.cart().is_empty());
        assert_eq!(session.checkout_draft(), None);
        assert_eq!(session.user_id(), Some(1));
    }
}
