use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Local};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Number, Value};

use dermadesk_core::domain::cart::{
    plan_addition, AdditionPlan, CartLine, CartRejection, CartSummary,
};
use dermadesk_core::domain::product::{Product, ProductId};
use dermadesk_db::repositories::{CartRepository, CatalogRepository};

use crate::tools::{
    optional_i64, required_i64, required_str, RegistryError, SafetyClass, Tool, ToolContext,
    ToolError, ToolRegistry,
};

const RESULT_LIMIT: u32 = 3;
const DELIVERY_DAYS: i64 = 7;

pub const NO_MATCHING_PRODUCTS: &str = "No matching products found.";
pub const NO_RELEVANT_PRODUCTS: &str = "No relevant products found in this category.";
pub const CART_EMPTY: &str = "Cart is empty.";
pub const PRODUCT_NOT_FOUND: &str = "Product not found.";
pub const INSUFFICIENT_STOCK: &str = "Insufficient stock.";
pub const ADDED_TO_CART: &str = "Product added to cart successfully.";
pub const NOT_IN_CART: &str = "Product not found in cart.";
pub const REMOVED_FROM_CART: &str = "Product removed from cart successfully.";

const RETURNS_POLICY: &str = "Our return policy lasts 30 days. If 30 days have gone by since your purchase, unfortunately we can’t offer you a refund or exchange.";
const RETURNS_DETAILS: &str = "To be eligible for a return, your item must be unused and in the same condition that you received it. It must also be in the original packaging.";
const SHIPPING_POLICY: &str = "We offer free shipping on all orders over $50. For orders under $50, a flat rate shipping fee of $5 will be applied.";
const SHIPPING_DETAILS: &str = "Orders are typically processed within 1-2 business days. Once your order has been shipped, you will receive a tracking number via email.";
const PAYMENT_METHODS: [&str; 4] = ["Apple Pay", "Google Pay", "Debit Card", "Credit Card"];

/// Registry holding the eight safe and two sensitive catalog tools.
pub fn catalog_tool_registry(
    catalog: Arc<dyn CatalogRepository>,
    carts: Arc<dyn CartRepository>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(GetProductCategories { catalog: catalog.clone() })?;
    registry.register(SearchProductByName { catalog: catalog.clone() })?;
    registry.register(GetRecommendations { catalog: catalog.clone() })?;
    registry.register(ViewCart { carts: carts.clone() })?;
    registry.register(GetDeliveryTime)?;
    registry.register(GetReturnsPolicy)?;
    registry.register(GetShippingPolicy)?;
    registry.register(GetPaymentMethods)?;
    registry.register(AddToCart { catalog, carts: carts.clone() })?;
    registry.register(RemoveFromCart { carts })?;
    Ok(registry)
}

fn message(text: &str) -> Value {
    json!({ "message": text })
}

/// Prices are exposed to the model as plain JSON numbers.
fn price_json(price: Decimal) -> Value {
    price
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(price.to_string()))
}

fn product_json(product: &Product) -> Value {
    json!({
        "product_id": product.product_id.0,
        "product_name": product.product_name,
        "description": product.description,
        "category": product.category,
        "stock": product.stock,
        "price": price_json(product.price),
    })
}

fn cart_line_json(line: &CartLine) -> Value {
    json!({
        "product_id": line.product_id.0,
        "product_name": line.product_name,
        "price": price_json(line.price),
        "quantity": line.quantity,
    })
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub struct GetProductCategories {
    catalog: Arc<dyn CatalogRepository>,
}

#[async_trait]
impl Tool for GetProductCategories {
    fn name(&self) -> &'static str {
        "get_product_categories"
    }

    fn description(&self) -> &'static str {
        "Fetch all product categories from the database."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, _context: &ToolContext, _input: Value) -> Result<Value, ToolError> {
        Ok(json!(self.catalog.list_categories().await?))
    }
}

pub struct SearchProductByName {
    catalog: Arc<dyn CatalogRepository>,
}

#[async_trait]
impl Tool for SearchProductByName {
    fn name(&self) -> &'static str {
        "search_product_by_name"
    }

    fn description(&self) -> &'static str {
        "Fetch up to 3 products by partial match of their name."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "product_name": {"type": "string", "description": "Full or partial product name"}
            },
            "required": ["product_name"]
        })
    }

    async fn execute(&self, _context: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let product_name = required_str(&input, "product_name")?;
        let mut products = self.catalog.search_by_name(&product_name, RESULT_LIMIT).await?;

        // A single hit is returned as an object, several as a list.
        Ok(match products.len() {
            0 => message(NO_MATCHING_PRODUCTS),
            1 => product_json(&products.remove(0)),
            _ => Value::Array(products.iter().map(product_json).collect()),
        })
    }
}

pub struct GetRecommendations {
    catalog: Arc<dyn CatalogRepository>,
}

#[async_trait]
impl Tool for GetRecommendations {
    fn name(&self) -> &'static str {
        "get_recommendations"
    }

    fn description(&self) -> &'static str {
        "Get up to 3 product recommendations based on category and partial match in description. \
         If no matches are found with the description, fetch products by category only."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "category": {"type": "string", "description": "Product category, e.g. Serum"},
                "description": {"type": "string", "description": "Skin concern or keyword"}
            },
            "required": ["category", "description"]
        })
    }

    async fn execute(&self, _context: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let category = required_str(&input, "category")?;
        let description = required_str(&input, "description")?;

        let mut products =
            self.catalog.find_by_category(&category, Some(&description), RESULT_LIMIT).await?;
        if products.is_empty() {
            products = self.catalog.find_by_category(&category, None, RESULT_LIMIT).await?;
        }
        if products.is_empty() {
            return Ok(message(NO_RELEVANT_PRODUCTS));
        }

        Ok(Value::Array(products.iter().map(product_json).collect()))
    }
}

pub struct AddToCart {
    catalog: Arc<dyn CatalogRepository>,
    carts: Arc<dyn CartRepository>,
}

#[async_trait]
impl Tool for AddToCart {
    fn name(&self) -> &'static str {
        "add_to_cart"
    }

    fn description(&self) -> &'static str {
        "Add a product to the user's cart with the specified quantity."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Sensitive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "product_id": {"type": "integer"},
                "quantity": {"type": "integer", "default": 1, "minimum": 1}
            },
            "required": ["product_id"]
        })
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let owner = context.owner()?;
        let product_id = ProductId(required_i64(&input, "product_id")?);
        let quantity = optional_i64(&input, "quantity")?.unwrap_or(1);
        if quantity < 1 {
            return Err(ToolError::Validation(format!(
                "`quantity` must be at least 1, got {quantity}"
            )));
        }

        let product = self.catalog.find_by_id(&product_id).await?;
        let existing = match product {
            Some(_) => self.carts.find_line(owner, &product_id).await?,
            None => None,
        };

        match plan_addition(product.as_ref(), existing.as_ref(), quantity) {
            AdditionPlan::Reject(CartRejection::ProductNotFound) => Ok(message(PRODUCT_NOT_FOUND)),
            AdditionPlan::Reject(CartRejection::InsufficientStock { .. }) => {
                Ok(message(INSUFFICIENT_STOCK))
            }
            AdditionPlan::Insert(line) | AdditionPlan::Merge(line) => {
                self.carts.upsert_line(owner, line).await?;
                Ok(message(ADDED_TO_CART))
            }
        }
    }
}

pub struct RemoveFromCart {
    carts: Arc<dyn CartRepository>,
}

#[async_trait]
impl Tool for RemoveFromCart {
    fn name(&self) -> &'static str {
        "remove_from_cart"
    }

    fn description(&self) -> &'static str {
        "Remove a product from the user's cart."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Sensitive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"product_id": {"type": "integer"}},
            "required": ["product_id"]
        })
    }

    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let owner = context.owner()?;
        let product_id = ProductId(required_i64(&input, "product_id")?);

        if self.carts.delete_line(owner, &product_id).await? {
            Ok(message(REMOVED_FROM_CART))
        } else {
            Ok(message(NOT_IN_CART))
        }
    }
}

pub struct ViewCart {
    carts: Arc<dyn CartRepository>,
}

#[async_trait]
impl Tool for ViewCart {
    fn name(&self) -> &'static str {
        "view_cart"
    }

    fn description(&self) -> &'static str {
        "View the user's cart and calculate the total price."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, context: &ToolContext, _input: Value) -> Result<Value, ToolError> {
        let owner = context.owner()?;
        let lines = self.carts.list_lines(owner).await?;

        let Some(summary) = CartSummary::from_lines(lines) else {
            return Ok(message(CART_EMPTY));
        };
        Ok(json!({
            "total_price": price_json(summary.total_price),
            "products": summary.products.iter().map(cart_line_json).collect::<Vec<_>>(),
        }))
    }
}

pub struct GetDeliveryTime;

#[async_trait]
impl Tool for GetDeliveryTime {
    fn name(&self) -> &'static str {
        "get_delivery_time"
    }

    fn description(&self) -> &'static str {
        "Return the estimated delivery time."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, _context: &ToolContext, _input: Value) -> Result<Value, ToolError> {
        let delivery = Local::now() + Duration::days(DELIVERY_DAYS);
        Ok(json!({ "expected_delivery_time": delivery.format("%Y-%m-%d %H:%M:%S").to_string() }))
    }
}

pub struct GetReturnsPolicy;

#[async_trait]
impl Tool for GetReturnsPolicy {
    fn name(&self) -> &'static str {
        "get_returns_policy"
    }

    fn description(&self) -> &'static str {
        "Return the return policy details."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, _context: &ToolContext, _input: Value) -> Result<Value, ToolError> {
        Ok(json!({ "policy": RETURNS_POLICY, "details": RETURNS_DETAILS }))
    }
}

pub struct GetShippingPolicy;

#[async_trait]
impl Tool for GetShippingPolicy {
    fn name(&self) -> &'static str {
        "get_shipping_policy"
    }

    fn description(&self) -> &'static str {
        "Return the shipping policy details."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, _context: &ToolContext, _input: Value) -> Result<Value, ToolError> {
        Ok(json!({ "policy": SHIPPING_POLICY, "details": SHIPPING_DETAILS }))
    }
}

pub struct GetPaymentMethods;

#[async_trait]
impl Tool for GetPaymentMethods {
    fn name(&self) -> &'static str {
        "get_payment_methods"
    }

    fn description(&self) -> &'static str {
        "Return a list of available payment methods."
    }

    fn safety(&self) -> SafetyClass {
        SafetyClass::Safe
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, _context: &ToolContext, _input: Value) -> Result<Value, ToolError> {
        Ok(json!(PAYMENT_METHODS))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Local, NaiveDateTime};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use dermadesk_core::domain::product::{Product, ProductId};
    use dermadesk_core::domain::session::SessionId;
    use dermadesk_db::repositories::{InMemoryCartRepository, InMemoryCatalogRepository};

    use super::*;
    use crate::tools::{SafetyClass, ToolContext, ToolError, ToolRegistry};

    fn product(id: i64, name: &str, description: &str, category: &str, stock: i64) -> Product {
        Product {
            product_id: ProductId(id),
            product_name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            stock,
            price: Decimal::new(1250, 2),
        }
    }

    fn registry() -> ToolRegistry {
        let catalog = Arc::new(InMemoryCatalogRepository::with_products(vec![
            product(1, "Gentle Cleanser", "for dry skin", "Cleanser", 10),
            product(2, "Foam Cleanser", "for oily skin", "Cleanser", 10),
            product(3, "Vitamin C Serum", "brightening", "Serum", 5),
            product(4, "Retinol Serum", "anti-aging", "Serum", 0),
        ]));
        catalog_tool_registry(catalog, Arc::new(InMemoryCartRepository::default()))
            .expect("unique tool names")
    }

    async fn run(registry: &ToolRegistry, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = registry.get(name).expect("registered");
        tool.execute(&ToolContext::new(SessionId("shopper".to_string())), input).await
    }

    #[test]
    fn registry_classifies_cart_mutations_as_sensitive() {
        let registry = registry();
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.names(SafetyClass::Sensitive), vec!["add_to_cart", "remove_from_cart"]);
        assert_eq!(registry.names(SafetyClass::Safe).len(), 8);
        assert!(registry.is_sensitive("add_to_cart"));
        assert!(!registry.is_sensitive("view_cart"));
        assert!(!registry.is_sensitive("unknown_tool"));
    }

    #[tokio::test]
    async fn search_shape_depends_on_hit_count() {
        let registry = registry();

        let single = run(&registry, "search_product_by_name", json!({"product_name": "vitamin"}))
            .await
            .expect("search");
        assert_eq!(single["product_id"], 3);
        assert_eq!(single["price"], json!(12.5));

        let several = run(&registry, "search_product_by_name", json!({"product_name": "cleanser"}))
            .await
            .expect("search");
        assert_eq!(several.as_array().map(Vec::len), Some(2));

        let none = run(&registry, "search_product_by_name", json!({"product_name": "lipstick"}))
            .await
            .expect("search");
        assert_eq!(none, json!({"message": NO_MATCHING_PRODUCTS}));
    }

    #[tokio::test]
    async fn recommendations_fall_back_to_category_then_sentinel() {
        let registry = registry();

        let narrowed = run(
            &registry,
            "get_recommendations",
            json!({"category": "cleanser", "description": "oily"}),
        )
        .await
        .expect("narrowed");
        assert_eq!(narrowed.as_array().map(Vec::len), Some(1));

        let fallback = run(
            &registry,
            "get_recommendations",
            json!({"category": "Serum", "description": "sunburn"}),
        )
        .await
        .expect("fallback");
        assert_eq!(fallback.as_array().map(Vec::len), Some(2));

        let sentinel = run(
            &registry,
            "get_recommendations",
            json!({"category": "Perfume", "description": "floral"}),
        )
        .await
        .expect("sentinel");
        assert_eq!(sentinel, json!({"message": NO_RELEVANT_PRODUCTS}));
    }

    #[tokio::test]
    async fn cart_tools_report_structured_outcomes() {
        let registry = registry();

        assert_eq!(
            run(&registry, "view_cart", json!({})).await.expect("empty"),
            json!({"message": CART_EMPTY})
        );
        assert_eq!(
            run(&registry, "add_to_cart", json!({"product_id": 99})).await.expect("unknown"),
            json!({"message": PRODUCT_NOT_FOUND})
        );
        assert_eq!(
            run(&registry, "add_to_cart", json!({"product_id": 4})).await.expect("no stock"),
            json!({"message": INSUFFICIENT_STOCK})
        );
        assert_eq!(
            run(&registry, "add_to_cart", json!({"product_id": "1", "quantity": "2"}))
                .await
                .expect("added"),
            json!({"message": ADDED_TO_CART})
        );

        let cart = run(&registry, "view_cart", json!({})).await.expect("cart");
        assert_eq!(cart["total_price"], json!(25.0));
        assert_eq!(cart["products"][0]["quantity"], 2);

        assert_eq!(
            run(&registry, "remove_from_cart", json!({"product_id": 1})).await.expect("removed"),
            json!({"message": REMOVED_FROM_CART})
        );
        assert_eq!(
            run(&registry, "remove_from_cart", json!({"product_id": 1})).await.expect("absent"),
            json!({"message": NOT_IN_CART})
        );
    }

    #[tokio::test]
    async fn stock_is_checked_per_request_and_never_decremented() {
        let registry = registry();

        for _ in 0..2 {
            let outcome = run(&registry, "add_to_cart", json!({"product_id": 3, "quantity": 3}))
                .await
                .expect("add");
            assert_eq!(outcome, json!({"message": ADDED_TO_CART}));
        }

        let cart = run(&registry, "view_cart", json!({})).await.expect("cart");
        assert_eq!(cart["products"][0]["quantity"], 6);
    }

    #[tokio::test]
    async fn invalid_quantity_and_missing_owner_are_errors() {
        let registry = registry();
        let zero = run(&registry, "add_to_cart", json!({"product_id": 3, "quantity": 0})).await;
        assert!(matches!(zero, Err(ToolError::Validation(_))));

        let tool = registry.get("view_cart").expect("registered");
        let anonymous = tool.execute(&ToolContext::new(SessionId(String::new())), json!({})).await;
        assert!(matches!(anonymous, Err(ToolError::MissingSessionIdentity)));
    }

    #[tokio::test]
    async fn static_tools_return_fixed_content() {
        let registry = registry();

        let methods = run(&registry, "get_payment_methods", json!({})).await.expect("methods");
        assert_eq!(methods, json!(["Apple Pay", "Google Pay", "Debit Card", "Credit Card"]));

        let returns = run(&registry, "get_returns_policy", json!({})).await.expect("returns");
        assert!(returns["policy"].as_str().is_some_and(|text| text.contains("30 days")));
        let shipping = run(&registry, "get_shipping_policy", json!({})).await.expect("shipping");
        assert!(shipping["policy"].as_str().is_some_and(|text| text.contains("$50")));

        let delivery = run(&registry, "get_delivery_time", json!({})).await.expect("delivery");
        let raw = delivery["expected_delivery_time"].as_str().expect("string");
        let parsed = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").expect("format");
        let days_ahead = (parsed - Local::now().naive_local()).num_hours();
        assert!((166..=169).contains(&days_ahead), "delivery {days_ahead}h ahead");
    }
}
