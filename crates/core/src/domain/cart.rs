use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i64,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub total_price: Decimal,
    pub products: Vec<CartLine>,
}

impl CartSummary {
    /// `None` for an empty cart; callers surface that as a sentinel, not an empty list.
    pub fn from_lines(lines: Vec<CartLine>) -> Option<Self> {
        if lines.is_empty() {
            return None;
        }
        let total_price = lines.iter().map(CartLine::line_total).sum();
        Some(Self { total_price, products: lines })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartRejection {
    ProductNotFound,
    InsufficientStock { requested: i64, available: i64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdditionPlan {
    Insert(CartLine),
    Merge(CartLine),
    Reject(CartRejection),
}

/// Decides what an add-to-cart request does to the owner's cart.
///
/// Stock is compared against the requested quantity alone and is never decremented, so
/// repeated additions can accumulate past the listed stock.
pub fn plan_addition(
    product: Option<&Product>,
    existing: Option<&CartLine>,
    quantity: i64,
) -> AdditionPlan {
    let Some(product) = product else {
        return AdditionPlan::Reject(CartRejection::ProductNotFound);
    };
    if product.stock < quantity {
        return AdditionPlan::Reject(CartRejection::InsufficientStock {
            requested: quantity,
            available: product.stock,
        });
    }

    match existing {
        Some(line) => AdditionPlan::Merge(CartLine {
            quantity: line.quantity.saturating_add(quantity),
            ..line.clone()
        }),
        None => AdditionPlan::Insert(CartLine {
            product_id: product.product_id,
            product_name: product.product_name.clone(),
            price: product.price,
            quantity,
        }),
    }
}
