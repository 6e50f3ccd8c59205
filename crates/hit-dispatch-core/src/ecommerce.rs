// crates/hit-dispatch-core/src/ecommerce.rs
// ============================================================================
// Module: E-Commerce Values
// Description: Product, promotion, and action descriptors for hits.
// Purpose: Describe enhanced e-commerce data attached through the builder.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Plain data describing products, promotions, and the actions applied to them.
//! [`crate::HitBuilder`] flattens these values into indexed hit parameters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Products
// ============================================================================

/// Product details attached to a hit or impression list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product SKU.
    pub id: Option<String>,
    /// Product name.
    pub name: Option<String>,
    /// Product brand.
    pub brand: Option<String>,
    /// Product category.
    pub category: Option<String>,
    /// Product variant.
    pub variant: Option<String>,
    /// Unit price.
    pub price: Option<f64>,
    /// Quantity.
    pub quantity: Option<i64>,
    /// Coupon code applied to the product.
    pub coupon_code: Option<String>,
    /// Position within a list.
    pub position: Option<i64>,
    /// Product-scoped custom dimensions keyed by slot index.
    pub custom_dimensions: BTreeMap<u32, String>,
    /// Product-scoped custom metrics keyed by slot index.
    pub custom_metrics: BTreeMap<u32, i64>,
}

// ============================================================================
// SECTION: Product Actions
// ============================================================================

/// Kind of product action carried by a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductActionKind {
    /// Product detail view.
    Detail,
    /// Product click.
    Click,
    /// Added to cart.
    Add,
    /// Removed from cart.
    Remove,
    /// Checkout step.
    Checkout,
    /// Checkout option selection.
    CheckoutOption,
    /// Completed purchase.
    Purchase,
    /// Refund.
    Refund,
}

impl ProductActionKind {
    /// Returns the wire label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Click => "click",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Checkout => "checkout",
            Self::CheckoutOption => "checkout_option",
            Self::Purchase => "purchase",
            Self::Refund => "refund",
        }
    }
}

/// Product action and its transaction details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAction {
    /// Action applied to the products in the hit.
    pub action: ProductActionKind,
    /// Transaction identifier.
    pub transaction_id: Option<String>,
    /// Store or affiliation.
    pub transaction_affiliation: Option<String>,
    /// Total revenue.
    pub transaction_revenue: Option<f64>,
    /// Total tax.
    pub transaction_tax: Option<f64>,
    /// Shipping cost.
    pub transaction_shipping: Option<f64>,
    /// Transaction-level coupon code.
    pub transaction_coupon_code: Option<String>,
    /// List the products were acted on from.
    pub product_action_list: Option<String>,
    /// Checkout step number.
    pub checkout_step: Option<i64>,
    /// Checkout step option.
    pub checkout_options: Option<String>,
}

impl ProductAction {
    /// Creates an action with no transaction details.
    #[must_use]
    pub const fn new(action: ProductActionKind) -> Self {
        Self {
            action,
            transaction_id: None,
            transaction_affiliation: None,
            transaction_revenue: None,
            transaction_tax: None,
            transaction_shipping: None,
            transaction_coupon_code: None,
            product_action_list: None,
            checkout_step: None,
            checkout_options: None,
        }
    }
}

// ============================================================================
// SECTION: Promotions
// ============================================================================

/// Internal promotion details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    /// Promotion identifier.
    pub id: Option<String>,
    /// Promotion name.
    pub name: Option<String>,
    /// Creative associated with the promotion.
    pub creative: Option<String>,
    /// Position of the creative.
    pub position: Option<String>,
}

/// Action applied to the promotions in a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionAction {
    /// Promotion was shown.
    View,
    /// Promotion was clicked.
    Click,
}

impl PromotionAction {
    /// Returns the wire label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Click => "promo_click",
        }
    }
}
