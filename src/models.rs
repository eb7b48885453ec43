use chrono::{DateTime, Utc};
use diesel::{
    AsChangeset, Selectable,
    prelude::{Insertable, Queryable},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Catalog

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryEntity {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub name: String,
    pub slug: String,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::brands)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BrandEntity {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::brands)]
pub struct CreateBrandEntity {
    pub name: String,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub brand_id: i32,
    pub category_id: i32,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub stock: i32,
    pub description: String,
    pub specifications: String,
    pub image_url: String,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub name: String,
    pub slug: String,
    pub brand_id: i32,
    pub category_id: i32,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub stock: i32,
    pub description: String,
    pub specifications: String,
    pub image_url: String,
    pub is_active: bool,
    pub is_featured: bool,
}

// Carts

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItemEntity {
    pub user_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct CreateCartItemEntity {
    pub user_id: i32,
    pub product_id: i32,
    pub quantity: i32,
}

// Orders

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub user_id: Option<i32>,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub delivery_method: String,
    pub city: String,
    pub ward: String,
    pub address: String,
    pub delivery_time: String,
    pub note: String,
    pub invoice_required: bool,
    pub payment_method: String,
    pub coupon_code: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderEntity {
    /// Street address, ward and city joined for display, skipping blanks.
    pub fn address_display(&self) -> String {
        [
            self.address.as_str(),
            self.ward.as_str(),
            self.city.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub user_id: Option<i32>,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub delivery_method: String,
    pub city: String,
    pub ward: String,
    pub address: String,
    pub delivery_time: String,
    pub note: String,
    pub invoice_required: bool,
    pub payment_method: String,
    pub coupon_code: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub status: String,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
}

// Sessions

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionEntity {
    pub id: Uuid,
    pub user_id: Option<i32>,
    pub role: Option<String>,
    pub cart: Option<Value>,
    pub checkout: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Full-row write for the session upsert. `None` must clear the stored
/// column (logout, emptied cart), hence `treat_none_as_null`.
#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(treat_none_as_null = true)]
pub struct SaveSessionEntity {
    pub id: Uuid,
    pub user_id: Option<i32>,
    pub role: Option<String>,
    pub cart: Option<Value>,
    pub checkout: Option<Value>,
    pub expires_at: DateTime<Utc>,
}

// Closed vocabularies stored as text columns, validated at the boundary.

/// Roles allowed through the dashboard gate.
pub fn is_staff_role(role: &str) -> bool {
    matches!(role, "admin" | "staff")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Delivery,
    Pickup,
}

impl DeliveryMethod {
    /// Form values outside the closed set fold to the `delivery` default,
    /// matching how an empty submission is treated.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "pickup" => Self::Pickup,
            _ => Self::Delivery,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Pickup => "pickup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cod,
    Wallet,
    Bank,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "cod" => Some(Self::Cod),
            "wallet" => Some(Self::Wallet),
            "bank" => Some(Self::Bank),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Wallet => "wallet",
            Self::Bank => "bank",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipping,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "shipping" => Some(Self::Shipping),
            "completed" => Some(Self::Completed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipping => "shipping",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}
