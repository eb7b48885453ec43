pub mod commit;

use std::collections::BTreeMap;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    cart::CartLine,
    config::VietQrConfig,
    models::{DeliveryMethod, PaymentMethod},
};

/// Shipping form as submitted in the first checkout step. Every field is
/// optional on the wire; missing ones arrive empty.
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(default)]
pub struct AddressForm {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub delivery_method: String,
    pub city: String,
    pub city_name: String,
    pub ward: String,
    pub ward_name: String,
    pub address: String,
    pub delivery_time: String,
    pub note: String,
    pub invoice_required: bool,
}

/// Validated shipping details parked in the session between the two checkout
/// steps. `city`/`ward` hold the selected codes, `city_name`/`ward_name` the
/// labels shown to the customer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct CheckoutDraft {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub delivery_method: DeliveryMethod,
    pub city: String,
    pub city_name: String,
    pub ward: String,
    pub ward_name: String,
    pub address: String,
    pub delivery_time: String,
    pub note: String,
    pub invoice_required: bool,
}

impl CheckoutDraft {
    pub fn shipping_city(&self) -> &str {
        if self.city_name.is_empty() {
            &self.city
        } else {
            &self.city_name
        }
    }

    pub fn shipping_ward(&self) -> &str {
        if self.ward_name.is_empty() {
            &self.ward
        } else {
            &self.ward_name
        }
    }

    /// Street address, ward and city joined for display, skipping blanks.
    pub fn address_display(&self) -> String {
        [self.address.as_str(), self.shipping_ward(), self.shipping_city()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<CheckoutDraft> for AddressForm {
    fn from(draft: CheckoutDraft) -> Self {
        AddressForm {
            full_name: draft.full_name,
            phone: draft.phone,
            email: draft.email,
            delivery_method: draft.delivery_method.as_str().to_string(),
            city: draft.city,
            city_name: draft.city_name,
            ward: draft.ward,
            ward_name: draft.ward_name,
            address: draft.address,
            delivery_time: draft.delivery_time,
            note: draft.note,
            invoice_required: draft.invoice_required,
        }
    }
}

/// Checks the shipping form and turns it into a draft. Pickup orders have
/// their address fields blanked before the checks run, so a customer who
/// switches to pickup is never asked for a street address. On failure the
/// sanitized form comes back along with per-field messages.
pub fn validate_address(
    form: AddressForm,
) -> Result<CheckoutDraft, (AddressForm, BTreeMap<String, String>)> {
    let mut form = AddressForm {
        full_name: form.full_name.trim().to_string(),
        phone: form.phone.trim().to_string(),
        email: form.email.trim().to_string(),
        delivery_method: form.delivery_method.trim().to_string(),
        city: form.city.trim().to_string(),
        city_name: form.city_name.trim().to_string(),
        ward: form.ward.trim().to_string(),
        ward_name: form.ward_name.trim().to_string(),
        address: form.address.trim().to_string(),
        delivery_time: form.delivery_time.trim().to_string(),
        note: form.note.trim().to_string(),
        invoice_required: form.invoice_required,
    };

    let delivery_method = DeliveryMethod::parse(&form.delivery_method);
    form.delivery_method = delivery_method.as_str().to_string();

    if delivery_method == DeliveryMethod::Pickup {
        form.city.clear();
        form.city_name.clear();
        form.ward.clear();
        form.ward_name.clear();
        form.address.clear();
    }

    let mut errors = BTreeMap::new();
    if form.full_name.is_empty() {
        errors.insert("full_name".to_string(), "Vui lòng nhập họ và tên.".to_string());
    }
    if form.phone.is_empty() {
        errors.insert("phone".to_string(), "Vui lòng nhập số điện thoại.".to_string());
    }
    if delivery_method == DeliveryMethod::Delivery {
        if form.city.is_empty() {
            errors.insert("city".to_string(), "Vui lòng chọn Tỉnh/Thành phố.".to_string());
        }
        if form.ward.is_empty() {
            errors.insert("ward".to_string(), "Vui lòng chọn Phường/Xã.".to_string());
        }
        if form.address.is_empty() {
            errors.insert(
                "address".to_string(),
                "Vui lòng nhập địa chỉ nhận hàng.".to_string(),
            );
        }
    }

    if !errors.is_empty() {
        return Err((form, errors));
    }

    Ok(CheckoutDraft {
        full_name: form.full_name,
        phone: form.phone,
        email: form.email,
        delivery_method,
        city: form.city,
        city_name: form.city_name,
        ward: form.ward,
        ward_name: form.ward_name,
        address: form.address,
        delivery_time: form.delivery_time,
        note: form.note,
        invoice_required: form.invoice_required,
    })
}

/// An absent or blank payment choice falls back to cash on delivery; anything
/// outside the closed set is rejected.
pub fn parse_payment_method(raw: &str) -> Option<PaymentMethod> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(PaymentMethod::Cod);
    }
    PaymentMethod::parse(raw)
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Order totals from the materialized cart. Discounts and shipping fees are
/// carried as explicit zero lines until pricing rules exist, and the grand
/// total never goes below zero.
pub fn cart_totals(lines: &[CartLine]) -> CartTotals {
    let subtotal: Decimal = lines.iter().map(|line| line.total_price).sum();
    let discount = Decimal::ZERO;
    let shipping = Decimal::ZERO;
    let total = (subtotal - discount + shipping).max(Decimal::ZERO);
    CartTotals {
        subtotal,
        discount,
        shipping,
        total,
    }
}

/// Builds the VietQR image URL for a bank transfer, or `None` when the
/// receiving account is not configured. The amount is truncated to whole
/// dong.
pub fn vietqr_url(config: &VietQrConfig, total: Decimal) -> Option<String> {
    if config.bank_id.is_empty() || config.account_no.is_empty() || config.account_name.is_empty()
    {
        return None;
    }

    let template = if config.template.is_empty() {
        "compact2"
    } else {
        config.template.as_str()
    };
    let amount = total.trunc().to_i64().unwrap_or(0).max(0);

    let base = format!(
        "https://img.vietqr.io/image/{}-{}-{}.png",
        config.bank_id, config.account_no, template
    );
    let mut url = reqwest::Url::parse(&base).ok()?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("amount", &amount.to_string());
        pairs.append_pair("accountName", &config.account_name);
        if !config.add_info.is_empty() {
            pairs.append_pair("addInfo", &config.add_info);
        }
    }
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::ProductEntity;
    use chrono::Utc;

    fn line(id: i32, price: Decimal, quantity: i32) -> CartLine {
        CartLine {
            product: ProductEntity {
                id,
                name: format!("Product {id}"),
                slug: format!("product-{id}"),
                brand_id: 1,
                category_id: 1,
                price,
                old_price: None,
                stock: 100,
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

    fn delivery_form() -> AddressForm {
        AddressForm {
            full_name: "Nguyễn Văn A".into(),
            phone: "0901234567".into(),
            email: "a@example.com".into(),
            delivery_method: "delivery".into(),
            city: "79".into(),
            city_name: "TP. Hồ Chí Minh".into(),
            ward: "26734".into(),
            ward_name: "Phường Bến Nghé".into(),
            address: "12 Lê Lợi".into(),
            delivery_time: "Buổi sáng".into(),
            note: String::new(),
            invoice_required: false,
        }
    }

    #[test]
    fn a_complete_delivery_form_validates() {
        let draft = validate_address(delivery_form()).unwrap();
        assert_eq!(draft.delivery_method, DeliveryMethod::Delivery);
        assert_eq!(draft.shipping_city(), "TP. Hồ Chí Minh");
        assert_eq!(draft.shipping_ward(), "Phường Bến Nghé");
        assert_eq!(
            draft.address_display(),
            "12 Lê Lợi, Phường Bến Nghé, TP. Hồ Chí Minh"
        );
    }

    #[test]
    fn delivery_requires_the_address_fields() {
        let form = AddressForm {
            city: String::new(),
            city_name: String::new(),
            ward: String::new(),
            ward_name: String::new(),
            address: "  ".into(),
            ..delivery_form()
        };
        let (_, errors) = validate_address(form).unwrap_err();
        assert_eq!(errors["city"], "Vui lòng chọn Tỉnh/Thành phố.");
        assert_eq!(errors["ward"], "Vui lòng chọn Phường/Xã.");
        assert_eq!(errors["address"], "Vui lòng nhập địa chỉ nhận hàng.");
    }

    #[test]
    fn name_and_phone_are_always_required() {
        let form = AddressForm {
            full_name: " ".into(),
            phone: String::new(),
            ..delivery_form()
        };
        let (_, errors) = validate_address(form).unwrap_err();
        assert_eq!(errors["full_name"], "Vui lòng nhập họ và tên.");
        assert_eq!(errors["phone"], "Vui lòng nhập số điện thoại.");
    }

    #[test]
    fn pickup_clears_the_address_before_validation() {
        let form = AddressForm {
            delivery_method: "pickup".into(),
            city: String::new(),
            ward: String::new(),
            address: String::new(),
            ..delivery_form()
        };
        let draft = validate_address(form).unwrap();
        assert_eq!(draft.delivery_method, DeliveryMethod::Pickup);
        assert_eq!(draft.city, "");
        assert_eq!(draft.city_name, "");
        assert_eq!(draft.address_display(), "");
    }

    #[test]
    fn unknown_delivery_methods_fold_to_delivery() {
        let form = AddressForm {
            delivery_method: "drone".into(),
            ..delivery_form()
        };
        let draft = validate_address(form).unwrap();
        assert_eq!(draft.delivery_method, DeliveryMethod::Delivery);
    }

    #[test]
    fn payment_method_defaults_to_cod_and_rejects_strangers() {
        assert_eq!(parse_payment_method(""), Some(PaymentMethod::Cod));
        assert_eq!(parse_payment_method("  "), Some(PaymentMethod::Cod));
        assert_eq!(parse_payment_method("wallet"), Some(PaymentMethod::Wallet));
        assert_eq!(parse_payment_method("bank"), Some(PaymentMethod::Bank));
        assert_eq!(parse_payment_method("crypto"), None);
    }

    #[test]
    fn totals_sum_the_lines_and_floor_at_zero() {
        let lines = vec![line(1, dec!(100000), 2), line(2, dec!(50000), 1)];
        let totals = cart_totals(&lines);
        assert_eq!(totals.subtotal, dec!(250000));
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec!(250000));

        let empty = cart_totals(&[]);
        assert_eq!(empty.total, Decimal::ZERO);
    }

    #[test]
    fn vietqr_url_is_only_built_when_configured() {
        let unconfigured = VietQrConfig::default();
        assert_eq!(vietqr_url(&unconfigured, dec!(250000)), None);

        let config = VietQrConfig {
            bank_id: "970422".into(),
            account_no: "0123456789".into(),
            account_name: "TECHMART".into(),
            template: String::new(),
            add_info: String::new(),
        };
        let url = vietqr_url(&config, dec!(250000.75)).unwrap();
        assert_eq!(
            url,
            "https://img.vietqr.io/image/970422-0123456789-compact2.png?amount=250000&accountName=TECHMART"
        );
    }
}
