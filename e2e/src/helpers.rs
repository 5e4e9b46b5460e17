use commerce_common::Money;
use log::debug;
use order_engine::{
    db_types::{NewProduct, Product},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path},
    CatalogManagement,
    CheckoutApi,
    PricingConfig,
    SqliteDatabase,
};

/// Creates a fresh, fully migrated database and returns a checkout API over it, using the
/// default pricing configuration (7.5% tax, $500 free-shipping threshold, $20 flat fee).
pub async fn new_checkout_api() -> CheckoutApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to the test database");
    CheckoutApi::new(db, PricingConfig::default(), EventProducers::default())
}

/// Seeds the catalog with `(name, unit price in cents, stock)` triples, returning the created
/// products in the same order.
pub async fn seed_products(api: &CheckoutApi<SqliteDatabase>, products: &[(&str, i64, i64)]) -> Vec<Product> {
    let mut result = Vec::with_capacity(products.len());
    for (name, price_cents, stock) in products {
        let product = api
            .db()
            .insert_product(NewProduct::new(*name, Money::from_cents(*price_cents), *stock))
            .await
            .expect("Error seeding product");
        debug!("Seeded product #{}: {} at {}, {} in stock", product.id, product.name, product.unit_price, product.stock_quantity);
        result.push(product);
    }
    result
}

/// The current stock level of a product, straight from the catalog.
pub async fn stock_of(api: &CheckoutApi<SqliteDatabase>, product_id: i64) -> i64 {
    api.db().fetch_product(product_id).await.expect("Error fetching product").expect("Product missing").stock_quantity
}
