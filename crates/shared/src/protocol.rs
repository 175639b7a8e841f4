use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    domain::{
        deserialize_quantity, FacilityId, OrderId, ProductId, ShipmentId, StatusId,
        SHIPMENT_RECEIVED_STATUS,
    },
    error::{error_message, has_error, ServiceFault},
};

/// Largest page the status lookup asks for in one find.
pub const STATUS_LOOKUP_VIEW_SIZE: u32 = 100;

/// Status code and JSON body of a service call, as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: u16,
    pub data: Value,
}

impl ServiceResponse {
    pub fn new(status: u16, data: Value) -> Self {
        Self { status, data }
    }

    pub fn ok(data: Value) -> Self {
        Self::new(200, data)
    }

    pub fn is_success(&self) -> bool {
        self.status == 200 && !has_error(&self.data)
    }

    pub fn error_message(&self) -> Option<String> {
        error_message(&self.data)
    }

    pub fn fault(&self) -> ServiceFault {
        ServiceFault {
            status: self.status,
            message: self.error_message(),
        }
    }

    /// `count` field of an entity find, zero when absent.
    pub fn count(&self) -> u32 {
        self.data
            .get("count")
            .and_then(crate::domain::parse_quantity)
            .unwrap_or(0)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Paging cursor plus free-form filters for the shipment list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentQuery {
    pub view_index: u32,
    pub view_size: u32,
    #[serde(flatten)]
    pub filters: Map<String, Value>,
}

impl ShipmentQuery {
    pub fn page(view_index: u32, view_size: u32) -> Self {
        Self {
            view_index,
            view_size,
            filters: Map::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn is_first_page(&self) -> bool {
        self.view_index == 0
    }
}

/// Generic entity find accepted by the `performFind` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFind {
    pub entity_name: String,
    pub no_condition_find: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_size: Option<u32>,
    pub input_fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_list: Vec<String>,
}

impl EntityFind {
    pub fn status_descriptions(status_ids: &[StatusId]) -> Self {
        let mut input_fields = Map::new();
        input_fields.insert("statusId".into(), json!(status_ids));
        input_fields.insert("statusId_op".into(), json!("in"));
        Self {
            entity_name: "StatusItem".into(),
            no_condition_find: "Y".into(),
            distinct: Some("Y".into()),
            view_size: Some(STATUS_LOOKUP_VIEW_SIZE),
            input_fields,
            field_list: vec!["statusId".into(), "description".into()],
        }
    }

    pub fn shipment_item_count(shipment_id: &ShipmentId) -> Self {
        let mut input_fields = Map::new();
        input_fields.insert("shipmentId".into(), json!(shipment_id));
        Self {
            entity_name: "ShipmentItem".into(),
            no_condition_find: "Y".into(),
            distinct: None,
            view_size: None,
            input_fields,
            field_list: Vec::new(),
        }
    }
}

/// Body shape shared by list and find responses.
#[derive(Debug, Clone, Deserialize)]
pub struct FindResponse<T> {
    #[serde(default = "Vec::new")]
    pub docs: Vec<T>,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusItem {
    pub status_id: StatusId,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetailQuery {
    pub shipment_id: ShipmentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddShipmentItemParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub product_id: ProductId,
    pub quantity: u32,
    pub shipment_id: ShipmentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_item_seq_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddShipmentItemResponse {
    pub shipment_id: ShipmentId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveShipmentItemParams {
    pub shipment_id: ShipmentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_seq_id: Option<String>,
    pub facility_id: FacilityId,
    pub shipment_item_seq_id: String,
    pub product_id: ProductId,
    pub quantity_accepted: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_item_seq_id: Option<String>,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShipmentParams {
    pub shipment_id: ShipmentId,
    pub status_id: StatusId,
}

impl UpdateShipmentParams {
    pub fn received(shipment_id: ShipmentId) -> Self {
        Self {
            shipment_id,
            status_id: StatusId::from(SHIPMENT_RECEIVED_STATUS),
        }
    }
}
