//! Cart persistence and login merge against `PostgreSQL`.
//!
//! Requires `TEST_DATABASE_URL`. Run with:
//! `cargo test -p shop-online-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use uuid::Uuid;

use shop_online_integration_tests::TestContext;
use shop_online_storefront::db::CartRepository;
use shop_online_storefront::models::{CartOwner, MAX_LINE_QUANTITY};

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_adding_twice_sums_one_line() {
    let ctx = TestContext::new().await;
    let owner = CartOwner::Anonymous(Uuid::new_v4());
    let (_, lamp) = ctx.create_variant("lamp", Decimal::new(1000, 2)).await;
    let carts = CartRepository::new(&ctx.pool);

    assert_eq!(carts.add(owner, lamp, 1).await.unwrap(), Some(1));
    assert_eq!(carts.add(owner, lamp, 1).await.unwrap(), Some(2));

    let lines = carts.lines(owner).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_add_beyond_limit_is_refused() {
    let ctx = TestContext::new().await;
    let owner = CartOwner::Anonymous(Uuid::new_v4());
    let (_, lamp) = ctx.create_variant("lamp", Decimal::new(1000, 2)).await;
    let carts = CartRepository::new(&ctx.pool);

    carts.add(owner, lamp, MAX_LINE_QUANTITY).await.unwrap();
    assert_eq!(carts.add(owner, lamp, 1).await.unwrap(), None);
    assert_eq!(carts.lines(owner).await.unwrap()[0].quantity, MAX_LINE_QUANTITY);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_login_merge_sums_and_reassigns() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("merger").await;
    let token = Uuid::new_v4();
    let (_, lamp) = ctx.create_variant("lamp", Decimal::new(1000, 2)).await;
    let (_, rug) = ctx.create_variant("rug", Decimal::new(2000, 2)).await;
    let carts = CartRepository::new(&ctx.pool);

    carts.add(CartOwner::Anonymous(token), lamp, 2).await.unwrap();
    carts.add(CartOwner::Anonymous(token), rug, 1).await.unwrap();
    carts.add(CartOwner::User(user), lamp, 3).await.unwrap();

    carts.merge_anonymous(token, user).await.unwrap();

    let lines = carts.lines(CartOwner::User(user)).await.unwrap();
    let quantity = |variant| {
        lines
            .iter()
            .find(|line| line.color_variant_id == variant)
            .map(|line| line.quantity)
    };
    assert_eq!(lines.len(), 2);
    assert_eq!(quantity(lamp), Some(5));
    assert_eq!(quantity(rug), Some(1));
    assert!(carts.lines(CartOwner::Anonymous(token)).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_merge_caps_quantity() {
    let ctx = TestContext::new().await;
    let user = ctx.create_user("capped").await;
    let token = Uuid::new_v4();
    let (_, lamp) = ctx.create_variant("lamp", Decimal::new(1000, 2)).await;
    let carts = CartRepository::new(&ctx.pool);

    carts.add(CartOwner::Anonymous(token), lamp, 10).await.unwrap();
    carts
        .add(CartOwner::User(user), lamp, MAX_LINE_QUANTITY - 1)
        .await
        .unwrap();

    carts.merge_anonymous(token, user).await.unwrap();

    let lines = carts.lines(CartOwner::User(user)).await.unwrap();
    assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_other_owners_lines_are_invisible() {
    let ctx = TestContext::new().await;
    let mine = CartOwner::Anonymous(Uuid::new_v4());
    let theirs = CartOwner::Anonymous(Uuid::new_v4());
    let (_, lamp) = ctx.create_variant("lamp", Decimal::new(1000, 2)).await;
    let carts = CartRepository::new(&ctx.pool);

    carts.add(theirs, lamp, 1).await.unwrap();
    let line = carts.lines(theirs).await.unwrap()[0].id;

    assert!(!carts.set_quantity(mine, line, 4).await.unwrap());
    assert!(!carts.remove(mine, line).await.unwrap());
    assert_eq!(carts.lines(theirs).await.unwrap()[0].quantity, 1);
}
