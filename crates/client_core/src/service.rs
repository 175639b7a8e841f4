use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use shared::protocol::{
    AddShipmentItemParams, EntityFind, ReceiveShipmentItemParams, ServiceResponse,
    ShipmentDetailQuery, ShipmentQuery, UpdateShipmentParams,
};
use tracing::debug;
use url::Url;

const PERFORM_FIND_ROUTE: &str = "performFind";
const SHIPMENT_DETAIL_ROUTE: &str = "shipment-detail";
const ADD_SHIPMENT_ITEM_ROUTE: &str = "addShipmentItem";
const RECEIVE_SHIPMENT_ITEM_ROUTE: &str = "receiveShipmentItem";
const UPDATE_SHIPMENT_ROUTE: &str = "updateShipment";

/// Remote operations the receiving actions depend on.
///
/// `Err` means the call itself failed. A reply the server flagged as an error
/// still comes back as `Ok`; check [`ServiceResponse::is_success`].
#[async_trait]
pub trait ShipmentService: Send + Sync {
    async fn fetch_shipments(&self, query: &ShipmentQuery) -> Result<ServiceResponse>;
    async fn fetch_status(&self, find: &EntityFind) -> Result<ServiceResponse>;
    async fn fetch_item_count(&self, find: &EntityFind) -> Result<ServiceResponse>;
    async fn get_shipment_detail(&self, query: &ShipmentDetailQuery) -> Result<ServiceResponse>;
    async fn add_shipment_item(&self, params: &AddShipmentItemParams) -> Result<ServiceResponse>;
    async fn receive_shipment_item(
        &self,
        params: &ReceiveShipmentItemParams,
    ) -> Result<ServiceResponse>;
    async fn receive_shipment(&self, params: &UpdateShipmentParams) -> Result<ServiceResponse>;
}

pub struct HttpShipmentService {
    http: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpShipmentService {
    pub fn new(server_url: &str, api_token: Option<String>) -> Result<Self> {
        let mut base_url = Url::parse(server_url)
            .with_context(|| format!("invalid service url: {server_url}"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            api_token,
        })
    }

    fn endpoint(&self, route: &str) -> Result<Url> {
        self.base_url
            .join(route)
            .with_context(|| format!("failed to build url for route {route}"))
    }

    async fn send(&self, route: &str, request: RequestBuilder) -> Result<ServiceResponse> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {route} failed"))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read {route} response body"))?;
        debug!(route, status, bytes = body.len(), "shipment service responded");

        let data = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };
        Ok(ServiceResponse::new(status, data))
    }

    async fn post_json<T: serde::Serialize + Sync>(
        &self,
        route: &str,
        body: &T,
    ) -> Result<ServiceResponse> {
        let url = self.endpoint(route)?;
        self.send(route, self.http.post(url).json(body)).await
    }
}

#[async_trait]
impl ShipmentService for HttpShipmentService {
    async fn fetch_shipments(&self, query: &ShipmentQuery) -> Result<ServiceResponse> {
        self.post_json(PERFORM_FIND_ROUTE, query).await
    }

    async fn fetch_status(&self, find: &EntityFind) -> Result<ServiceResponse> {
        self.post_json(PERFORM_FIND_ROUTE, find).await
    }

    async fn fetch_item_count(&self, find: &EntityFind) -> Result<ServiceResponse> {
        self.post_json(PERFORM_FIND_ROUTE, find).await
    }

    async fn get_shipment_detail(&self, query: &ShipmentDetailQuery) -> Result<ServiceResponse> {
        let url = self.endpoint(SHIPMENT_DETAIL_ROUTE)?;
        self.send(SHIPMENT_DETAIL_ROUTE, self.http.get(url).query(query))
            .await
    }

    async fn add_shipment_item(&self, params: &AddShipmentItemParams) -> Result<ServiceResponse> {
        self.post_json(ADD_SHIPMENT_ITEM_ROUTE, params).await
    }

    async fn receive_shipment_item(
        &self,
        params: &ReceiveShipmentItemParams,
    ) -> Result<ServiceResponse> {
        self.post_json(RECEIVE_SHIPMENT_ITEM_ROUTE, params).await
    }

    async fn receive_shipment(&self, params: &UpdateShipmentParams) -> Result<ServiceResponse> {
        self.post_json(UPDATE_SHIPMENT_ROUTE, params).await
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
