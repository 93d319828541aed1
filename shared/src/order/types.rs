//! Order building blocks and checkout input records

use serde::{Deserialize, Serialize};

/// Pizza size; the multiplier applied to the base price lives in the
/// pricing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Size {
    Small,
    Medium,
    Large,
}

/// Crust selection snapshot. Standard crusts carry a zero surcharge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crust {
    pub name: String,
    pub surcharge: f64,
}

/// A topping/extra in selection order. `price` is the listed per-unit
/// charge; unpriced add-ons fall back to the engine's flat default when
/// they land past the free allotment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Line item snapshot as persisted on the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub size: Size,
    pub crust: Crust,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
    /// Computed by the pricing engine at creation.
    pub unit_price: f64,
    pub quantity: i32,
    pub line_total: f64,
}

/// Line item as submitted from checkout, before pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemInput {
    pub product_id: String,
    pub name: String,
    pub base_price: f64,
    pub size: Size,
    pub crust: Crust,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
    pub quantity: i32,
}

/// Delivery address snapshot, immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
}

/// Payment outcome as reported by the external gateway collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub paid: bool,
}

/// Delivery timing preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryTiming {
    Asap,
    Scheduled { at: i64 },
}

impl Default for DeliveryTiming {
    fn default() -> Self {
        DeliveryTiming::Asap
    }
}
