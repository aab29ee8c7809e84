//! Core domain model for Phone Deal Watch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CRATE_NAME: &str = "pdw-core";

/// Stock availability as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stock {
    OutOfStock,
    InStock,
    PreOrder,
}

impl Stock {
    /// The catalog's wire spelling, also used as the storage column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stock::OutOfStock => "OutOfStock",
            Stock::InStock => "InStock",
            Stock::PreOrder => "PreOrder",
        }
    }

    pub fn from_catalog(value: &str) -> Option<Self> {
        match value {
            "OutOfStock" => Some(Stock::OutOfStock),
            "InStock" => Some(Stock::InStock),
            "PreOrder" => Some(Stock::PreOrder),
            _ => None,
        }
    }
}

/// One catalog listing tile: the identity shared by all of its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub brand: String,
    pub model: String,
    pub condition: String,
    pub link: String,
}

/// One spec/colour combination of a product, before it is stamped with
/// the product identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub spec: String,
    pub color: String,
    pub stock: Stock,
    /// One-off cash price in minor currency units.
    pub cash_price: i64,
    /// Recommended retail price in minor currency units. May sit below
    /// `cash_price` for like-new listings.
    pub rrp: i64,
}

/// A variant stamped with its product identity; the atomic unit the
/// ranking engine and the snapshot operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub brand: String,
    pub model: String,
    pub spec: String,
    pub color: String,
    pub condition: String,
    pub stock: Stock,
    pub cash_price: i64,
    pub rrp: i64,
    pub link: String,
}

impl ProductVariant {
    pub fn from_parts(product: &Product, variant: Variant) -> Self {
        Self {
            brand: product.brand.clone(),
            model: product.model.clone(),
            spec: variant.spec,
            color: variant.color,
            condition: product.condition.clone(),
            stock: variant.stock,
            cash_price: variant.cash_price,
            rrp: variant.rrp,
            link: product.link.clone(),
        }
    }

    /// Grouping key for the shared reference price: conditions and
    /// colours of the same model/spec all borrow one rrp anchor.
    pub fn model_key(&self) -> ModelKey {
        ModelKey {
            brand: self.brand.clone(),
            model: self.model.clone(),
            spec: self.spec.clone(),
        }
    }

    /// Price-level identity: one reportable offer regardless of colour.
    pub fn deal_key(&self) -> DealKey {
        DealKey {
            brand: self.brand.clone(),
            model: self.model.clone(),
            spec: self.spec.clone(),
            condition: self.condition.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub brand: String,
    pub model: String,
    pub spec: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealKey {
    pub brand: String,
    pub model: String,
    pub spec: String,
    pub condition: String,
}

/// Persisted view of previously reported offers, keyed by deal identity.
pub type Snapshot = HashMap<DealKey, ProductVariant>;
