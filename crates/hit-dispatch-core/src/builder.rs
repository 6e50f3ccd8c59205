// crates/hit-dispatch-core/src/builder.rs
// ============================================================================
// Module: Hit Builder
// Description: Immutable lineage-based builder for hit parameters.
// Purpose: Construct hit parameter sets for every supported hit type.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`HitBuilder`] is a persistent linked list of parameter patches. Every
//! setter returns a new builder layered over its ancestors, leaving the
//! receiver untouched, so a partially configured builder can be shared and
//! extended in several directions. [`HitBuilder::build`] flattens the lineage
//! root-first so later writes override earlier ones for the same key.
//! Invariants:
//! - Builders are immutable; cloning is cheap (shared lineage).
//! - Product, promotion, and impression indices carry forward through every
//!   derived builder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::ecommerce::Product;
use crate::ecommerce::ProductAction;
use crate::ecommerce::Promotion;
use crate::ecommerce::PromotionAction;
use crate::params::HitParams;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hit type parameter name.
pub const HIT_TYPE_KEY: &str = "t";
/// Screen view hit type.
const HIT_TYPE_SCREENVIEW: &str = "screenview";
/// Page view hit type.
const HIT_TYPE_PAGEVIEW: &str = "pageview";
/// Event hit type.
const HIT_TYPE_EVENT: &str = "event";
/// Exception hit type.
const HIT_TYPE_EXCEPTION: &str = "exception";
/// Social interaction hit type.
const HIT_TYPE_SOCIAL: &str = "social";
/// User timing hit type.
const HIT_TYPE_TIMING: &str = "timing";

// ============================================================================
// SECTION: Lineage
// ============================================================================

/// One layer of parameters in a builder lineage.
#[derive(Debug)]
struct Patch {
    /// Ancestor layer, applied before this one.
    parent: Option<Arc<Patch>>,
    /// Parameters introduced by this layer.
    data: HitParams,
}

// ============================================================================
// SECTION: Hit Builder
// ============================================================================

/// Immutable builder for hit parameters.
#[derive(Debug, Clone)]
pub struct HitBuilder {
    /// Most recent lineage layer.
    head: Arc<Patch>,
    /// Number of products added so far.
    product_count: u32,
    /// Number of promotions added so far.
    promotion_count: u32,
    /// Impression lists in first-use order with their product counts.
    impressions: Vec<(String, u32)>,
}

impl HitBuilder {
    /// Creates a root builder holding `data`.
    fn root(data: HitParams) -> Self {
        Self {
            head: Arc::new(Patch {
                parent: None,
                data,
            }),
            product_count: 0,
            promotion_count: 0,
            impressions: Vec::new(),
        }
    }

    /// Returns a new builder with `data` layered over this lineage.
    fn layer(&self, data: HitParams) -> Self {
        Self {
            head: Arc::new(Patch {
                parent: Some(Arc::clone(&self.head)),
                data,
            }),
            product_count: self.product_count,
            promotion_count: self.promotion_count,
            impressions: self.impressions.clone(),
        }
    }

    /// Returns a new builder layering a single parameter.
    fn layer_one(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut data = HitParams::new();
        data.insert(key, value);
        self.layer(data)
    }

    // ------------------------------------------------------------------------
    // Factories
    // ------------------------------------------------------------------------

    /// Creates an empty builder with no hit type.
    #[must_use]
    pub fn empty() -> Self {
        Self::root(HitParams::new())
    }

    /// Creates a screen view hit, optionally naming the screen.
    #[must_use]
    pub fn screen_view(screen_name: Option<&str>) -> Self {
        let mut data = HitParams::new();
        data.insert(HIT_TYPE_KEY, HIT_TYPE_SCREENVIEW);
        data.insert_opt("cd", screen_name);
        Self::root(data)
    }

    /// Creates a page view hit with optional page path and title.
    #[must_use]
    pub fn page_view(page: Option<&str>, title: Option<&str>) -> Self {
        let mut data = HitParams::new();
        data.insert(HIT_TYPE_KEY, HIT_TYPE_PAGEVIEW);
        data.insert_opt("dp", page);
        data.insert_opt("dt", title);
        Self::root(data)
    }

    /// Creates a custom event hit. A zero `value` is omitted.
    #[must_use]
    pub fn custom_event(category: &str, action: &str, label: Option<&str>, value: i64) -> Self {
        let mut data = HitParams::new();
        data.insert(HIT_TYPE_KEY, HIT_TYPE_EVENT);
        data.insert("ec", category);
        data.insert("ea", action);
        data.insert_opt("el", label);
        if value != 0 {
            data.insert("ev", value.to_string());
        }
        Self::root(data)
    }

    /// Creates an exception hit.
    #[must_use]
    pub fn exception(description: &str, is_fatal: bool) -> Self {
        let mut data = HitParams::new();
        data.insert(HIT_TYPE_KEY, HIT_TYPE_EXCEPTION);
        data.insert("exd", description);
        if !is_fatal {
            data.insert("exf", "0");
        }
        Self::root(data)
    }

    /// Creates a social interaction hit.
    #[must_use]
    pub fn social_interaction(network: &str, action: &str, target: &str) -> Self {
        let mut data = HitParams::new();
        data.insert(HIT_TYPE_KEY, HIT_TYPE_SOCIAL);
        data.insert("sn", network);
        data.insert("sa", action);
        data.insert("st", target);
        Self::root(data)
    }

    /// Creates a user timing hit. The timing value is sent in whole
    /// milliseconds, rounding half to even.
    #[must_use]
    pub fn timing(
        category: Option<&str>,
        variable: Option<&str>,
        value: Option<Duration>,
        label: Option<&str>,
    ) -> Self {
        let mut data = HitParams::new();
        data.insert(HIT_TYPE_KEY, HIT_TYPE_TIMING);
        data.insert_opt("utc", category);
        data.insert_opt("utv", variable);
        if let Some(value) = value {
            data.insert("utt", rounded_millis(value).to_string());
        }
        data.insert_opt("utl", label);
        Self::root(data)
    }

    // ------------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------------

    /// Sets an arbitrary parameter.
    #[must_use]
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.layer_one(key, value)
    }

    /// Sets every parameter in `params`.
    #[must_use]
    pub fn set_all(&self, params: &HitParams) -> Self {
        self.layer(params.clone())
    }

    /// Sets the custom dimension in slot `index`.
    #[must_use]
    pub fn custom_dimension(&self, index: u32, dimension: impl Into<String>) -> Self {
        self.layer_one(format!("cd{index}"), dimension)
    }

    /// Sets the custom metric in slot `index`.
    #[must_use]
    pub fn custom_metric(&self, index: u32, metric: f32) -> Self {
        self.layer_one(format!("cm{index}"), metric.to_string())
    }

    /// Forces a new session to start with this hit.
    #[must_use]
    pub fn new_session(&self) -> Self {
        self.layer_one("sc", "start")
    }

    /// Marks the hit as not caused by user interaction.
    #[must_use]
    pub fn non_interaction(&self) -> Self {
        self.layer_one("ni", "1")
    }

    /// Adds a product to the hit.
    #[must_use]
    pub fn add_product(&self, product: &Product) -> Self {
        let index = self.product_count + 1;
        let data = product_params(&format!("pr{index}"), product, true);
        let mut next = self.layer(data);
        next.product_count = index;
        next
    }

    /// Adds a product impression, optionally grouped in a named list.
    #[must_use]
    pub fn add_impression(&self, product: &Product, list: Option<&str>) -> Self {
        let list = list.unwrap_or_default();
        let mut impressions = self.impressions.clone();
        let existing = impressions.iter_mut().enumerate().find(|(_, (name, _))| name.as_str() == list);
        let (list_index, product_index) = match existing {
            Some((position, (_, count))) => {
                *count += 1;
                (position + 1, *count)
            }
            None => {
                impressions.push((list.to_string(), 1));
                (impressions.len(), 1)
            }
        };
        let mut data = HitParams::new();
        if !list.is_empty() {
            data.insert(format!("il{list_index}nm"), list);
        }
        data.merge(&product_params(&format!("il{list_index}pi{product_index}"), product, false));
        let mut next = self.layer(data);
        next.impressions = impressions;
        next
    }

    /// Adds a promotion to the hit.
    #[must_use]
    pub fn add_promotion(&self, promotion: &Promotion) -> Self {
        let index = self.promotion_count + 1;
        let prefix = format!("promo{index}");
        let mut data = HitParams::new();
        data.insert_opt(format!("{prefix}id"), promotion.id.as_deref());
        data.insert_opt(format!("{prefix}nm"), promotion.name.as_deref());
        data.insert_opt(format!("{prefix}cr"), promotion.creative.as_deref());
        data.insert_opt(format!("{prefix}ps"), promotion.position.as_deref());
        let mut next = self.layer(data);
        next.promotion_count = index;
        next
    }

    /// Sets the product action for every product in the hit.
    #[must_use]
    pub fn product_action(&self, action: &ProductAction) -> Self {
        let mut data = HitParams::new();
        data.insert("pa", action.action.as_str());
        data.insert_opt("ti", action.transaction_id.as_deref());
        data.insert_opt("ta", action.transaction_affiliation.as_deref());
        data.insert_opt("tr", action.transaction_revenue.map(|value| value.to_string()));
        data.insert_opt("tt", action.transaction_tax.map(|value| value.to_string()));
        data.insert_opt("ts", action.transaction_shipping.map(|value| value.to_string()));
        data.insert_opt("tcc", action.transaction_coupon_code.as_deref());
        data.insert_opt("pal", action.product_action_list.as_deref());
        data.insert_opt("cos", action.checkout_step.map(|value| value.to_string()));
        data.insert_opt("col", action.checkout_options.as_deref());
        self.layer(data)
    }

    /// Sets the action applied to the promotions in the hit.
    #[must_use]
    pub fn promotion_action(&self, action: PromotionAction) -> Self {
        self.layer_one("pa", action.as_str())
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Returns the effective value of `key` across the whole lineage.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let mut node = Some(&self.head);
        while let Some(patch) = node {
            if let Some(value) = patch.data.get(key) {
                return Some(value.to_string());
            }
            node = patch.parent.as_ref();
        }
        None
    }

    /// Flattens the lineage into a parameter map, ancestors first.
    #[must_use]
    pub fn build(&self) -> HitParams {
        let mut layers = Vec::new();
        let mut node = Some(&self.head);
        while let Some(patch) = node {
            layers.push(&patch.data);
            node = patch.parent.as_ref();
        }
        let mut params = HitParams::new();
        for data in layers.into_iter().rev() {
            params.merge(data);
        }
        params
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a duration to whole milliseconds, rounding half to even.
fn rounded_millis(value: Duration) -> u128 {
    const NANOS_PER_MILLI: u128 = 1_000_000;
    let nanos = value.as_nanos();
    let whole = nanos / NANOS_PER_MILLI;
    let remainder = nanos % NANOS_PER_MILLI;
    let half = NANOS_PER_MILLI / 2;
    if remainder > half || (remainder == half && whole % 2 == 1) {
        whole + 1
    } else {
        whole
    }
}

/// Flattens product fields under `prefix`.
fn product_params(prefix: &str, product: &Product, include_cart_fields: bool) -> HitParams {
    let mut data = HitParams::new();
    data.insert_opt(format!("{prefix}id"), product.id.as_deref());
    data.insert_opt(format!("{prefix}nm"), product.name.as_deref());
    data.insert_opt(format!("{prefix}br"), product.brand.as_deref());
    data.insert_opt(format!("{prefix}ca"), product.category.as_deref());
    data.insert_opt(format!("{prefix}va"), product.variant.as_deref());
    data.insert_opt(format!("{prefix}pr"), product.price.map(|value| value.to_string()));
    if include_cart_fields {
        data.insert_opt(format!("{prefix}qt"), product.quantity.map(|value| value.to_string()));
        data.insert_opt(format!("{prefix}cc"), product.coupon_code.as_deref());
    }
    data.insert_opt(format!("{prefix}ps"), product.position.map(|value| value.to_string()));
    for (slot, value) in &product.custom_dimensions {
        data.insert(format!("{prefix}cd{slot}"), value.as_str());
    }
    for (slot, value) in &product.custom_metrics {
        data.insert(format!("{prefix}cm{slot}"), value.to_string());
    }
    data
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::HitBuilder;
    use crate::ecommerce::Product;
    use crate::ecommerce::ProductAction;
    use crate::ecommerce::ProductActionKind;
    use crate::ecommerce::Promotion;
    use crate::ecommerce::PromotionAction;

    fn product(index: u32) -> Product {
        Product {
            id: Some(format!("{index:03}")),
            name: Some(format!("Product{index:03}")),
            category: Some(format!("Category{index:03}")),
            price: Some(0.99 + f64::from(index - 1)),
            quantity: Some(i64::from(index)),
            ..Product::default()
        }
    }

    #[test]
    fn later_layers_override_ancestors() {
        let base = HitBuilder::screen_view(Some("home")).custom_dimension(1, "a");
        let built = base.custom_dimension(1, "b").set("cd", "detail").build();
        assert_eq!(built.get("t"), Some("screenview"));
        assert_eq!(built.get("cd1"), Some("b"));
        assert_eq!(built.get("cd"), Some("detail"));
        let keys: Vec<&str> = built.keys().collect();
        assert_eq!(keys, vec!["t", "cd", "cd1"]);
    }

    #[test]
    fn branches_do_not_affect_each_other() {
        let base = HitBuilder::custom_event("video", "play", None, 0);
        let left = base.set("el", "left").build();
        let right = base.non_interaction().build();
        assert_eq!(left.get("el"), Some("left"));
        assert_eq!(left.get("ni"), None);
        assert_eq!(right.get("ni"), Some("1"));
        assert_eq!(base.build().len(), 3);
    }

    #[test]
    fn event_omits_zero_value_and_missing_label() {
        let params = HitBuilder::custom_event("cat", "act", None, 0).build();
        assert!(!params.contains_key("el"));
        assert!(!params.contains_key("ev"));
        let params = HitBuilder::custom_event("cat", "act", Some("lbl"), 42).build();
        assert_eq!(params.get("el"), Some("lbl"));
        assert_eq!(params.get("ev"), Some("42"));
    }

    #[test]
    fn exception_marks_non_fatal() {
        let params = HitBuilder::exception("oops", false).build();
        assert_eq!(params.get("exd"), Some("oops"));
        assert_eq!(params.get("exf"), Some("0"));
        assert!(!HitBuilder::exception("boom", true).build().contains_key("exf"));
    }

    #[test]
    fn page_view_uses_title_for_dt() {
        let params = HitBuilder::page_view(Some("/home"), Some("Home")).build();
        assert_eq!(params.get("dp"), Some("/home"));
        assert_eq!(params.get("dt"), Some("Home"));
    }

    #[test]
    fn timing_rounds_half_milliseconds_to_even() {
        let utt = |micros: u64| {
            HitBuilder::timing(None, None, Some(Duration::from_micros(micros)), None)
                .build()
                .get("utt")
                .unwrap_or_default()
                .to_string()
        };
        assert_eq!(utt(501_500), "502");
        assert_eq!(utt(502_500), "502");
        assert_eq!(utt(503_500), "504");
        assert_eq!(utt(500), "0");
        assert_eq!(utt(1_500), "2");
        assert_eq!(utt(502_501), "503");
        assert_eq!(utt(502_499), "502");
    }

    #[test]
    fn timing_rounds_milliseconds() {
        let params = HitBuilder::timing(
            Some("load"),
            Some("startup"),
            Some(Duration::from_micros(2_000_600)),
            None,
        )
        .build();
        assert_eq!(params.get("utt"), Some("2001"));
        assert!(!params.contains_key("utl"));
    }

    #[test]
    fn product_indices_carry_through_other_setters() {
        let params = HitBuilder::screen_view(None)
            .add_product(&product(1))
            .set("cu", "USD")
            .add_product(&product(2))
            .product_action(&ProductAction {
                transaction_id: Some("T1".to_string()),
                transaction_revenue: Some(1.98),
                ..ProductAction::new(ProductActionKind::Purchase)
            })
            .build();
        assert_eq!(params.get("pr1id"), Some("001"));
        assert_eq!(params.get("pr2id"), Some("002"));
        assert_eq!(params.get("pr2pr"), Some("1.99"));
        assert_eq!(params.get("pr2qt"), Some("2"));
        assert_eq!(params.get("pa"), Some("purchase"));
        assert_eq!(params.get("ti"), Some("T1"));
        assert_eq!(params.get("tr"), Some("1.98"));
    }

    #[test]
    fn impressions_index_lists_and_products() {
        let params = HitBuilder::screen_view(None)
            .add_impression(&product(1), Some("search"))
            .add_impression(&product(2), Some("search"))
            .add_impression(&product(3), Some("related"))
            .add_impression(&product(4), None)
            .build();
        assert_eq!(params.get("il1nm"), Some("search"));
        assert_eq!(params.get("il1pi1id"), Some("001"));
        assert_eq!(params.get("il1pi2id"), Some("002"));
        assert_eq!(params.get("il2nm"), Some("related"));
        assert_eq!(params.get("il2pi1id"), Some("003"));
        assert_eq!(params.get("il3pi1id"), Some("004"));
        assert!(!params.contains_key("il3nm"));
        assert!(!params.contains_key("il1pi1qt"));
    }

    #[test]
    fn promotions_are_numbered() {
        let promo = Promotion {
            id: Some("P1".to_string()),
            name: Some("Summer".to_string()),
            ..Promotion::default()
        };
        let params = HitBuilder::screen_view(None)
            .add_promotion(&promo)
            .add_promotion(&promo)
            .promotion_action(PromotionAction::Click)
            .build();
        assert_eq!(params.get("promo1id"), Some("P1"));
        assert_eq!(params.get("promo2nm"), Some("Summer"));
        assert_eq!(params.get("pa"), Some("promo_click"));
    }

    #[test]
    fn get_reads_through_lineage() {
        let builder = HitBuilder::social_interaction("net", "share", "url").new_session();
        assert_eq!(builder.get("sn").as_deref(), Some("net"));
        assert_eq!(builder.get("sc").as_deref(), Some("start"));
        assert_eq!(builder.get("missing"), None);
    }
}
