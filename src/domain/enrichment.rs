use std::collections::HashMap;

use serde::Deserialize;

use super::order::{BuyerDetails, Order, ProductDetails};

/// Customer record as served by the user service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CustomerProfile {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl From<&CustomerProfile> for BuyerDetails {
    fn from(p: &CustomerProfile) -> Self {
        BuyerDetails {
            name: p.name.clone(),
            email: p.email.clone(),
            phone: p.phone.clone(),
            address: p.address.clone(),
        }
    }
}

/// Product record as served by the product catalog.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductSummary {
    pub id: i64,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_image: String,
    #[serde(default)]
    pub sale_price: i64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub unit: String,
}

impl From<&ProductSummary> for ProductDetails {
    fn from(p: &ProductSummary) -> Self {
        ProductDetails {
            name: p.product_name.clone(),
            image: p.product_image.clone(),
            unit_price: p.sale_price,
            weight: p.weight,
            unit: p.unit.clone(),
        }
    }
}

/// Lookup tables for one request. Never shared or cached.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentMaps {
    pub buyers: HashMap<i64, CustomerProfile>,
    pub products: HashMap<i64, ProductSummary>,
}

impl EnrichmentMaps {
    /// Copy display fields onto the order and its items. Ids missing from the
    /// maps leave the corresponding fields untouched.
    pub fn apply(&self, order: &mut Order) {
        if let Some(profile) = self.buyers.get(&order.buyer_id) {
            order.buyer = profile.into();
        }
        for item in &mut order.items {
            if let Some(product) = self.products.get(&item.product_id) {
                item.product = product.into();
            }
        }
    }
}
