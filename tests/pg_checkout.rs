//! Checkout tests against a live Postgres. The commit tests run inside a
//! test transaction; the router-level tests commit a throwaway session row
//! and scrub it afterwards. Run with `cargo test -- --ignored` and a
//! reachable `DATABASE_URL`.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use techmart_storefront::{
    app_state::AppState,
    cart::{self, Cart},
    checkout::{self, AddressForm, commit},
    models::{
        CreateCartItemEntity, OrderEntity, OrderItemEntity, PaymentMethod, ProductEntity,
        SaveSessionEntity,
    },
    schema::{brands, cart_items, categories, order_items, orders, products, sessions},
    session::SessionHandle,
};
use tower::ServiceExt;
use uuid::Uuid;

fn pickup_form(full_name: &str) -> AddressForm {
    AddressForm {
        full_name: full_name.to_string(),
        phone: "0901234567".to_string(),
        delivery_method: "pickup".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "needs a Postgres database via DATABASE_URL"]
async fn place_order_snapshots_the_cart_and_decrements_stock() {
    let conn = &mut common::connect().await;
    let p1 = common::seed_product(conn, "Điện thoại Samsung", dec!(100000), 10).await;
    let p2 = common::seed_product(conn, "Ốp lưng", dec!(50000), 5).await;

    let session = SessionHandle::anonymous();
    session.login(9_201, "customer");
    let mut cart = Cart::resolve(&session);
    cart.add(conn, p1.id, 2).await.unwrap();
    cart.add(conn, p2.id, 1).await.unwrap();

    let lines = cart.lines(conn).await.unwrap();
    assert_eq!(commit::check_stock(&lines), None);
    let totals = checkout::cart_totals(&lines);
    assert_eq!(totals.subtotal, dec!(250000));

    let draft = checkout::validate_address(pickup_form("Nguyễn Văn A")).unwrap();
    let order = commit::place_order(
        conn,
        commit::PlaceOrder {
            user_id: 9_201,
            draft,
            payment_method: PaymentMethod::Cod,
            coupon_code: String::new(),
            totals,
        },
        &lines,
    )
    .await
    .unwrap();

    assert_eq!(order.user_id, Some(9_201));
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_method, "cod");
    assert_eq!(order.delivery_method, "pickup");
    assert_eq!(order.full_name, "Nguyễn Văn A");
    assert_eq!(order.address, "");
    assert_eq!(order.subtotal, dec!(250000));
    assert_eq!(order.total, dec!(250000));

    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .order(order_items::product_id.asc())
        .get_results(conn)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].product_name, "Điện thoại Samsung");
    assert_eq!(items[0].price, dec!(100000));
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].total, dec!(200000));
    assert_eq!(items[1].product_name, "Ốp lưng");
    assert_eq!(items[1].total, dec!(50000));

    let stocks: Vec<i32> = products::table
        .filter(products::id.eq_any([p1.id, p2.id]))
        .order(products::id.asc())
        .select(products::stock)
        .load(conn)
        .await
        .unwrap();
    assert_eq!(stocks, vec![8, 4]);

    let remaining: i64 = cart_items::table
        .filter(cart_items::user_id.eq(9_201))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    // A catalog edit after the fact must not reach the snapshot.
    diesel::update(products::table.find(p1.id))
        .set(products::price.eq(dec!(123456)))
        .execute(conn)
        .await
        .unwrap();
    let item_price: Decimal = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .filter(order_items::product_id.eq(p1.id))
        .select(order_items::price)
        .first(conn)
        .await
        .unwrap();
    assert_eq!(item_price, dec!(100000));
}

#[tokio::test]
#[ignore = "needs a Postgres database via DATABASE_URL"]
async fn over_stock_lines_floor_the_decrement_at_zero() {
    let conn = &mut common::connect().await;
    let product = common::seed_product(conn, "Hàng sắp hết", dec!(80000), 2).await;

    let session = SessionHandle::anonymous();
    session.login(9_202, "customer");
    let mut cart = Cart::resolve(&session);
    cart.add(conn, product.id, 5).await.unwrap();

    let lines = cart.lines(conn).await.unwrap();
    assert_eq!(
        commit::check_stock(&lines),
        Some("Sản phẩm Hàng sắp hết không đủ số lượng.".to_string())
    );

    // The handlers stop on the message above; the commit itself, if asked
    // anyway, still never drives stock negative.
    let draft = checkout::validate_address(pickup_form("Trần Thị B")).unwrap();
    commit::place_order(
        conn,
        commit::PlaceOrder {
            user_id: 9_202,
            draft,
            payment_method: PaymentMethod::Cod,
            coupon_code: String::new(),
            totals: checkout::cart_totals(&lines),
        },
        &lines,
    )
    .await
    .unwrap();

    let stock: i32 = products::table
        .find(product.id)
        .select(products::stock)
        .first(conn)
        .await
        .unwrap();
    assert_eq!(stock, 0);
}

#[tokio::test]
#[ignore = "needs a Postgres database via DATABASE_URL"]
async fn a_failing_line_rolls_the_whole_commit_back() {
    let conn = &mut common::connect().await;
    let product = common::seed_product(conn, "Bàn phím cơ", dec!(1500000), 10).await;

    let session = SessionHandle::anonymous();
    session.login(9_203, "customer");
    let mut cart = Cart::resolve(&session);
    cart.add(conn, product.id, 2).await.unwrap();

    let mut lines = cart.lines(conn).await.unwrap();
    // A line whose product id matches nothing; its snapshot insert violates
    // the order_items foreign key.
    let mut ghost = lines[0].clone();
    ghost.product.id = i32::MAX;
    lines.push(ghost);

    let draft = checkout::validate_address(pickup_form("Lê Văn C")).unwrap();
    let result = commit::place_order(
        conn,
        commit::PlaceOrder {
            user_id: 9_203,
            draft,
            payment_method: PaymentMethod::Cod,
            coupon_code: String::new(),
            totals: checkout::cart_totals(&lines),
        },
        &lines,
    )
    .await;
    assert!(result.is_err());

    let order_count: i64 = orders::table
        .filter(orders::user_id.eq(9_203))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(order_count, 0);

    let stock: i32 = products::table
        .find(product.id)
        .select(products::stock)
        .first(conn)
        .await
        .unwrap();
    assert_eq!(stock, 10);

    let cart_count: i64 = cart_items::table
        .filter(cart_items::user_id.eq(9_203))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(cart_count, 1);
}

#[tokio::test]
#[ignore = "needs a Postgres database via DATABASE_URL"]
async fn an_anonymous_cart_becomes_an_order_after_login() {
    let conn = &mut common::connect().await;
    let phone = common::seed_product(conn, "Điện thoại Xiaomi", dec!(5000000), 6).await;
    let charger = common::seed_product(conn, "Củ sạc nhanh", dec!(300000), 20).await;

    // Browsing anonymously; everything lands in the session payload.
    let session = SessionHandle::anonymous();
    let mut cart = Cart::resolve(&session);
    cart.add(conn, phone.id, 1).await.unwrap();
    cart.add(conn, charger.id, 2).await.unwrap();
    assert_eq!(cart.total_quantity(conn).await.unwrap(), 3);

    // Signing in folds the session cart into the account cart.
    session.login(9_204, "customer");
    cart::db::merge_session_cart(conn, &session, 9_204)
        .await
        .unwrap();
    let mut cart = Cart::resolve(&session);

    let lines = cart.lines(conn).await.unwrap();
    let totals = checkout::cart_totals(&lines);
    assert_eq!(totals.subtotal, dec!(5600000));
    assert_eq!(commit::check_stock(&lines), None);

    // The two checkout steps: park the draft, then pay cash on delivery.
    session.set_checkout_draft(checkout::validate_address(pickup_form("Phạm Minh D")).unwrap());
    let draft = session.checkout_draft().unwrap();

    let order = commit::place_order(
        conn,
        commit::PlaceOrder {
            user_id: 9_204,
            draft,
            payment_method: PaymentMethod::Cod,
            coupon_code: String::new(),
            totals,
        },
        &lines,
    )
    .await
    .unwrap();
    session.clear_checkout_draft();

    assert_eq!(order.user_id, Some(9_204));
    assert_eq!(order.status, "pending");
    assert_eq!(order.total, dec!(5600000));

    let item_count: i64 = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(item_count, 2);

    let stocks: Vec<i32> = products::table
        .filter(products::id.eq_any([phone.id, charger.id]))
        .order(products::id.asc())
        .select(products::stock)
        .load(conn)
        .await
        .unwrap();
    assert_eq!(stocks, vec![5, 18]);

    let cart_count: i64 = cart_items::table
        .filter(cart_items::user_id.eq(9_204))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    assert_eq!(cart_count, 0);
    assert!(session.checkout_draft().is_none());
}

async fn seed_session(state: &AppState, user_id: i32) -> Uuid {
    let conn = &mut state.db_pool.get().await.expect("pool connection");
    let token = Uuid::new_v4();
    let row = SaveSessionEntity {
        id: token,
        user_id: Some(user_id),
        role: Some("customer".to_string()),
        cart: None,
        checkout: None,
        expires_at: Utc::now() + Duration::hours(1),
    };
    diesel::insert_into(sessions::table)
        .values(&row)
        .execute(conn)
        .await
        .expect("failed to seed session");
    token
}

async fn drop_session(state: &AppState, token: Uuid) {
    let conn = &mut state.db_pool.get().await.expect("pool connection");
    diesel::delete(sessions::table.find(token))
        .execute(conn)
        .await
        .expect("failed to drop session");
}

fn checkout_request(state: &AppState, token: Uuid, uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::COOKIE,
            format!("{}={}", state.config.session.cookie_name, token),
        )
        .body(Body::from("{}"))
        .expect("failed to build request")
}

#[tokio::test]
#[ignore = "needs a Postgres database via DATABASE_URL"]
async fn checkout_turns_an_empty_cart_away() {
    let state = common::app_state().await;
    let app = common::app(state.clone());
    let token = seed_session(&state, 9_301).await;

    let res = app
        .oneshot(checkout_request(&state, token, "/checkout/info"))
        .await
        .unwrap();

    drop_session(&state, token).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/cart");
}

#[tokio::test]
#[ignore = "needs a Postgres database via DATABASE_URL"]
async fn payment_without_a_draft_returns_to_the_info_step() {
    let state = common::app_state().await;
    let app = common::app(state.clone());
    let token = seed_session(&state, 9_302).await;

    // A committed cart line, so the emptiness guard lets the request through.
    let product: ProductEntity = {
        let conn = &mut state.db_pool.get().await.expect("pool connection");
        let product = common::seed_product(conn, "Hàng tạm", dec!(10000), 3).await;
        diesel::insert_into(cart_items::table)
            .values(&CreateCartItemEntity {
                user_id: 9_302,
                product_id: product.id,
                quantity: 1,
            })
            .execute(conn)
            .await
            .expect("failed to seed cart line");
        product
    };

    let res = app
        .oneshot(checkout_request(&state, token, "/checkout/payment"))
        .await
        .unwrap();

    // Scrub the committed fixtures before asserting anything.
    {
        let conn = &mut state.db_pool.get().await.expect("pool connection");
        diesel::delete(cart_items::table.filter(cart_items::user_id.eq(9_302)))
            .execute(conn)
            .await
            .expect("failed to scrub cart line");
        diesel::delete(categories::table.find(product.category_id))
            .execute(conn)
            .await
            .expect("failed to scrub category");
        diesel::delete(brands::table.find(product.brand_id))
            .execute(conn)
            .await
            .expect("failed to scrub brand");
    }
    drop_session(&state, token).await;

    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()[header::LOCATION], "/checkout/info");
}

#[tokio::test]
#[ignore = "needs a Postgres database via DATABASE_URL"]
async fn payment_refuses_short_stock_then_commits_once_the_cart_fits() {
    let state = common::app_state().await;
    let app = common::app(state.clone());

    let draft = checkout::validate_address(pickup_form("Hoàng Thu E")).unwrap();
    let token = Uuid::new_v4();
    let product: ProductEntity = {
        let conn = &mut state.db_pool.get().await.expect("pool connection");
        let product = common::seed_product(conn, "Tai nghe chụp tai", dec!(100000), 2).await;
        diesel::insert_into(sessions::table)
            .values(&SaveSessionEntity {
                id: token,
                user_id: Some(9_303),
                role: Some("customer".to_string()),
                cart: None,
                checkout: Some(serde_json::to_value(&draft).expect("draft serializes")),
                expires_at: Utc::now() + Duration::hours(1),
            })
            .execute(conn)
            .await
            .expect("failed to seed session");
        diesel::insert_into(cart_items::table)
            .values(&CreateCartItemEntity {
                user_id: 9_303,
                product_id: product.id,
                quantity: 3,
            })
            .execute(conn)
            .await
            .expect("failed to seed cart line");
        product
    };

    // Three wanted, two on the shelf: the submit bounces and leaves every
    // row as it was.
    let res = app
        .clone()
        .oneshot(checkout_request(&state, token, "/checkout/payment"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    {
        let conn = &mut state.db_pool.get().await.expect("pool connection");
        let stock: i32 = products::table
            .find(product.id)
            .select(products::stock)
            .first(conn)
            .await
            .unwrap();
        assert_eq!(stock, 2);
        let order_count: i64 = orders::table
            .filter(orders::user_id.eq(9_303))
            .count()
            .get_result(conn)
            .await
            .unwrap();
        assert_eq!(order_count, 0);
        let quantity: i32 = cart_items::table
            .find((9_303, product.id))
            .select(cart_items::quantity)
            .first(conn)
            .await
            .unwrap();
        assert_eq!(quantity, 3);

        // Trim the cart down to what the shelf holds and try again.
        diesel::update(cart_items::table.find((9_303, product.id)))
            .set(cart_items::quantity.eq(2))
            .execute(conn)
            .await
            .unwrap();
    }

    let res = app
        .oneshot(checkout_request(&state, token, "/checkout/payment"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let location = res.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    let order_id: i32 = location
        .strip_prefix("/orders/")
        .expect("expected an order confirmation redirect")
        .parse()
        .unwrap();

    let conn = &mut state.db_pool.get().await.expect("pool connection");
    let order: OrderEntity = orders::table.find(order_id).first(conn).await.unwrap();
    let item_count: i64 = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    let stock: i32 = products::table
        .find(product.id)
        .select(products::stock)
        .first(conn)
        .await
        .unwrap();
    let cart_count: i64 = cart_items::table
        .filter(cart_items::user_id.eq(9_303))
        .count()
        .get_result(conn)
        .await
        .unwrap();
    let parked_draft: Option<serde_json::Value> = sessions::table
        .find(token)
        .select(sessions::checkout)
        .first(conn)
        .await
        .unwrap();

    // Scrub the committed fixtures before asserting anything.
    diesel::delete(order_items::table.filter(order_items::order_id.eq(order_id)))
        .execute(conn)
        .await
        .expect("failed to scrub order items");
    diesel::delete(orders::table.find(order_id))
        .execute(conn)
        .await
        .expect("failed to scrub order");
    diesel::delete(categories::table.find(product.category_id))
        .execute(conn)
        .await
        .expect("failed to scrub category");
    diesel::delete(brands::table.find(product.brand_id))
        .execute(conn)
        .await
        .expect("failed to scrub brand");
    drop_session(&state, token).await;

    assert_eq!(order.user_id, Some(9_303));
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_method, "cod");
    assert_eq!(order.total, dec!(200000));
    assert_eq!(item_count, 1);
    assert_eq!(stock, 0);
    assert_eq!(cart_count, 0);
    assert!(parked_draft.is_none());
}
