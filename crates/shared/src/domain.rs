use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(ShipmentId);
id_newtype!(StatusId);
id_newtype!(ProductId);
id_newtype!(OrderId);
id_newtype!(FacilityId);

/// Status a shipment is moved to once every item has been received.
pub const SHIPMENT_RECEIVED_STATUS: &str = "PURCH_SHIP_RECEIVED";

/// Shipment summary as listed on the receiving screen.
///
/// `status_desc` and `item_count` are not part of the list payload; they are
/// filled in from the status cache and the per-shipment item count lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub shipment_id: ShipmentId,
    pub status_id: StatusId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_desc: Option<String>,
    #[serde(default, rename = "noOfItem", deserialize_with = "deserialize_quantity")]
    pub item_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_facility_id: Option<FacilityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_seq_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentItem {
    #[serde(alias = "shipmentItemSeqId")]
    pub item_seq_id: String,
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_item_seq_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub quantity_ordered: u32,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub quantity_accepted: u32,
}

impl ShipmentItem {
    pub fn matches_sku(&self, sku: &str) -> bool {
        self.sku.as_deref() == Some(sku)
    }
}

/// Full shipment record, including its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetail {
    pub shipment_id: ShipmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<StatusId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_seq_id: Option<String>,
    pub items: Vec<ShipmentItem>,
}

impl ShipmentDetail {
    /// Product ids referenced by the items, first occurrence order, no repeats.
    pub fn distinct_product_ids(&self) -> Vec<ProductId> {
        let mut seen = std::collections::HashSet::new();
        self.items
            .iter()
            .filter(|item| seen.insert(item.product_id.clone()))
            .map(|item| item.product_id.clone())
            .collect()
    }
}

/// Quantities arrive as integers, floats or numeric strings depending on the
/// backing entity. Fractions are truncated and negatives clamp to zero.
pub fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    parse_quantity(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid quantity: {value}")))
}

pub fn parse_quantity(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Null => Some(0),
        serde_json::Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                Some(u32::try_from(n).unwrap_or(u32::MAX))
            } else if number.as_i64().is_some() {
                Some(0)
            } else {
                number.as_f64().map(clamp_float)
            }
        }
        serde_json::Value::String(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Some(0);
            }
            raw.parse::<f64>().ok().map(clamp_float)
        }
        _ => None,
    }
}

fn clamp_float(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= u32::MAX as f64 {
        u32::MAX
    } else {
        value.trunc() as u32
    }
}
