//! Cart snapshot types and the local optimistic math applied to them.
//!
//! The backend is the only place carts are computed. The helpers below
//! predict the effect of a write so the count and total can move before
//! the round-trip completes. `with_added` deliberately touches only
//! `count` and `total`: at add time the client knows a product id and
//! maybe a price, not a full line item, so `products` stays as the server
//! last reported it until the settle refetch replaces the whole snapshot.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::identity::ProductId;

/// Tolerance used when checking money invariants on server snapshots.
const MONEY_EPSILON: f64 = 0.005;

/// Counter badges stop growing past this value.
const BADGE_LIMIT: u32 = 99;

/// One product line in the cart, in the backend's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: f64,
    #[serde(default)]
    pub sale_price: Option<f64>,
    #[serde(default)]
    pub is_sale: bool,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    #[serde(rename = "total_price")]
    pub line_total: f64,
}

impl CartLineItem {
    /// Price actually charged per unit.
    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.unit_price)
    }

    /// `quantity × effective_price`.
    pub fn expected_total(&self) -> f64 {
        self.effective_price() * f64::from(self.quantity)
    }
}

/// Server-derived view of the cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    #[serde(default)]
    pub products: Vec<CartLineItem>,
    pub total: f64,
    pub count: u32,
}

impl CartSnapshot {
    pub fn line(&self, product_id: ProductId) -> Option<&CartLineItem> {
        self.products.iter().find(|line| line.product_id == product_id)
    }

    /// Predicted snapshot after adding `quantity` units at `unit_price`.
    ///
    /// A missing price leaves `total` unchanged.
    pub fn with_added(mut self, quantity: u32, unit_price: Option<f64>) -> Self {
        self.count = self.count.saturating_add(quantity);
        if let Some(price) = unit_price {
            self.total += price * f64::from(quantity);
        }
        self
    }

    /// Predicted snapshot after removing a product. Unknown products are a no-op.
    pub fn with_removed(mut self, product_id: ProductId) -> Self {
        let Some(index) = self
            .products
            .iter()
            .position(|line| line.product_id == product_id)
        else {
            return self;
        };
        let line = self.products.remove(index);
        self.count = self.count.saturating_sub(line.quantity);
        self.total = (self.total - line.line_total).max(0.0);
        self
    }

    /// Predicted snapshot after setting a product's quantity. Unknown products
    /// are a no-op; a quantity of 0 drops the line.
    pub fn with_quantity(mut self, product_id: ProductId, quantity: u32) -> Self {
        if quantity == 0 {
            return self.with_removed(product_id);
        }
        let Some(line) = self
            .products
            .iter_mut()
            .find(|line| line.product_id == product_id)
        else {
            return self;
        };
        let previous_total = line.line_total;
        let previous_quantity = line.quantity;
        line.quantity = quantity;
        line.line_total = line.expected_total();

        self.count = self
            .count
            .saturating_sub(previous_quantity)
            .saturating_add(quantity);
        self.total = (self.total - previous_total + line.line_total).max(0.0);
        self
    }

    /// Navbar badge text: hidden when empty, capped at "99+".
    pub fn badge(&self) -> Option<String> {
        match self.count {
            0 => None,
            n if n > BADGE_LIMIT => Some(format!("{}+", BADGE_LIMIT)),
            n => Some(n.to_string()),
        }
    }

    /// Check the money invariants a confirmed snapshot must satisfy.
    ///
    /// Optimistic snapshots are not expected to pass this.
    pub fn validate(&self) -> CoreResult<()> {
        if self.total < 0.0 {
            return Err(CoreError::InvalidValue {
                field: "total",
                reason: "must be >= 0".to_string(),
            });
        }
        for line in &self.products {
            if line.quantity == 0 {
                return Err(CoreError::InvalidValue {
                    field: "products.quantity",
                    reason: format!("product {} has quantity 0", line.product_id),
                });
            }
            if (line.line_total - line.expected_total()).abs() > MONEY_EPSILON {
                return Err(CoreError::InvalidValue {
                    field: "products.total_price",
                    reason: format!(
                        "product {} total {} != {} x {}",
                        line.product_id,
                        line.line_total,
                        line.quantity,
                        line.effective_price()
                    ),
                });
            }
        }
        let sum: f64 = self.products.iter().map(|line| line.line_total).sum();
        if (sum - self.total).abs() > MONEY_EPSILON {
            return Err(CoreError::InvalidValue {
                field: "total",
                reason: format!("total {} != sum of lines {}", self.total, sum),
            });
        }
        Ok(())
    }
}
