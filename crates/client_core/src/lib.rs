use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use shared::{
    domain::{
        FacilityId, OrderId, ProductId, Shipment, ShipmentDetail, ShipmentId, ShipmentItem,
        StatusId,
    },
    protocol::{
        AddShipmentItemParams, AddShipmentItemResponse, EntityFind, FindResponse,
        ReceiveShipmentItemParams, ServiceResponse, ShipmentDetailQuery, ShipmentQuery,
        StatusItem, UpdateShipmentParams, STATUS_LOOKUP_VIEW_SIZE,
    },
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub mod error;
pub mod service;
pub mod store;

pub use error::ReceivingError;
pub use service::{HttpShipmentService, ShipmentService};
pub use store::{FetchToken, Mutation, MutationKind, ShipmentState, ShipmentStore};

pub const SHIPMENTS_NOT_FOUND: &str = "Shipments not found";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong";
pub const SHIPMENT_RECEIVED: &str = "Shipment Received Successfully";

/// Signals for whoever renders the receiving screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    PresentLoader,
    DismissLoader,
    Toast(String),
    StoreUpdated(MutationKind),
}

/// Looks up the display text for a fixed English message.
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

pub struct PassthroughTranslator;

impl Translator for PassthroughTranslator {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Product details live in their own store; the receiving actions only ask
/// it to load the products a shipment references.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn fetch_products(&self, product_ids: Vec<ProductId>) -> Result<()>;
}

pub struct MissingProductCatalog;

#[async_trait]
impl ProductCatalog for MissingProductCatalog {
    async fn fetch_products(&self, product_ids: Vec<ProductId>) -> Result<()> {
        Err(anyhow!(
            "product catalog is unavailable ({} products requested)",
            product_ids.len()
        ))
    }
}

/// Session values the receiving calls need beyond the shipment itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivingContext {
    pub facility_id: FacilityId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub shipment_id: ShipmentId,
    pub location_seq_id: Option<String>,
    pub items: Vec<ShipmentItem>,
}

impl ReceiveRequest {
    pub fn from_detail(detail: &ShipmentDetail) -> Self {
        Self {
            shipment_id: detail.shipment_id.clone(),
            location_seq_id: detail.location_seq_id.clone(),
            items: detail.items.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItemRequest {
    /// `None` targets the current shipment and also adds the item to it.
    pub shipment_id: Option<ShipmentId>,
    pub order_id: Option<OrderId>,
    pub shipment_item_seq_id: Option<String>,
    pub item: ShipmentItem,
}

pub struct ReceivingClient {
    service: Arc<dyn ShipmentService>,
    products: Arc<dyn ProductCatalog>,
    translator: Arc<dyn Translator>,
    context: ReceivingContext,
    store: ShipmentStore,
    events: broadcast::Sender<ClientEvent>,
}

impl ReceivingClient {
    pub fn new(service: Arc<dyn ShipmentService>, context: ReceivingContext) -> Arc<Self> {
        Self::new_with_dependencies(
            service,
            Arc::new(MissingProductCatalog),
            Arc::new(PassthroughTranslator),
            context,
        )
    }

    pub fn new_with_dependencies(
        service: Arc<dyn ShipmentService>,
        products: Arc<dyn ProductCatalog>,
        translator: Arc<dyn Translator>,
        context: ReceivingContext,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            service,
            products,
            translator,
            context,
            store: ShipmentStore::new(),
            events,
        })
    }

    pub fn store(&self) -> &ShipmentStore {
        &self.store
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn toast(&self, key: &str) {
        self.emit(ClientEvent::Toast(self.translator.translate(key)));
    }

    async fn commit(&self, mutation: Mutation) -> bool {
        let kind = mutation.kind();
        let applied = self.store.commit(mutation).await;
        if applied {
            self.emit(ClientEvent::StoreUpdated(kind));
        }
        applied
    }

    /// Loads one page of shipments, annotated with status description and
    /// item count. The first page replaces the list, later pages append.
    ///
    /// Failures are reported through toasts; the returned page is empty then.
    pub async fn find_shipments(&self, query: &ShipmentQuery) -> Vec<Shipment> {
        let first_page = query.is_first_page();
        let token = self.store.begin_list_fetch(first_page).await;

        let page = match self.service.fetch_shipments(query).await {
            Ok(response) => match shipments_from_response(&response) {
                Ok(Some(shipments)) => Some(shipments),
                Ok(None) => {
                    warn!(
                        view_index = query.view_index,
                        status = response.status,
                        "shipments: no shipments found"
                    );
                    self.toast(SHIPMENTS_NOT_FOUND);
                    None
                }
                Err(err) => {
                    error!(view_index = query.view_index, "shipments: {err}");
                    self.toast(SOMETHING_WENT_WRONG);
                    None
                }
            },
            Err(err) => {
                error!(view_index = query.view_index, "shipments: fetch failed: {err:#}");
                self.toast(SOMETHING_WENT_WRONG);
                None
            }
        };

        let annotated = match page {
            Some(shipments) => {
                let annotated = self.annotate_shipments(shipments).await;
                let mutation = if first_page {
                    Mutation::ListReplaced {
                        shipments: annotated.clone(),
                        token: Some(token),
                    }
                } else {
                    Mutation::ListAppended {
                        shipments: annotated.clone(),
                        token,
                    }
                };
                if self.commit(mutation).await {
                    info!(
                        view_index = query.view_index,
                        count = annotated.len(),
                        "shipments: page committed"
                    );
                } else {
                    debug!(
                        view_index = query.view_index,
                        "shipments: dropping page from an outdated fetch"
                    );
                }
                annotated
            }
            None => Vec::new(),
        };

        if first_page {
            self.emit(ClientEvent::DismissLoader);
        }
        annotated
    }

    async fn annotate_shipments(&self, shipments: Vec<Shipment>) -> Vec<Shipment> {
        let status_ids = shipments
            .iter()
            .map(|shipment| shipment.status_id.clone())
            .collect::<Vec<_>>();
        let statuses = self.fetch_status(&status_ids).await;
        let counts = join_all(
            shipments
                .iter()
                .map(|shipment| self.fetch_item_count(&shipment.shipment_id)),
        )
        .await;

        shipments
            .into_iter()
            .zip(counts)
            .map(|(mut shipment, item_count)| {
                shipment.status_desc = statuses.get(&shipment.status_id).cloned();
                shipment.item_count = item_count;
                shipment
            })
            .collect()
    }

    /// Resolves descriptions for `status_ids`, asking the service only for ids
    /// not cached yet. Returns the whole cache; lookups that fail leave their
    /// ids out.
    pub async fn fetch_status(&self, status_ids: &[StatusId]) -> HashMap<StatusId, String> {
        let cached = self.store.status_cache().await;
        let mut missing: Vec<StatusId> = Vec::new();
        for status_id in status_ids {
            if !cached.contains_key(status_id) && !missing.contains(status_id) {
                missing.push(status_id.clone());
            }
        }
        if missing.is_empty() {
            return cached;
        }

        let mut fetched = HashMap::new();
        for batch in missing.chunks(STATUS_LOOKUP_VIEW_SIZE as usize) {
            let find = EntityFind::status_descriptions(batch);
            match self.service.fetch_status(&find).await {
                Ok(response) if response.is_success() && response.count() > 0 => {
                    match response.decode::<FindResponse<StatusItem>>() {
                        Ok(body) => fetched.extend(
                            body.docs
                                .into_iter()
                                .map(|status| (status.status_id, status.description)),
                        ),
                        Err(err) => error!(missing = batch.len(), "status: invalid payload: {err}"),
                    }
                }
                Ok(response) => error!(
                    status = response.status,
                    missing = batch.len(),
                    message = %response.error_message().unwrap_or_default(),
                    "status: lookup returned nothing"
                ),
                Err(err) => error!(
                    missing = batch.len(),
                    "status: something went wrong while fetching status: {err:#}"
                ),
            }
        }

        if !fetched.is_empty() {
            self.commit(Mutation::StatusCached(fetched)).await;
        }
        self.store.status_cache().await
    }

    /// Number of items on a shipment; 0 when the lookup fails.
    pub async fn fetch_item_count(&self, shipment_id: &ShipmentId) -> u32 {
        match self
            .service
            .fetch_item_count(&EntityFind::shipment_item_count(shipment_id))
            .await
        {
            Ok(response) if response.is_success() => response.count(),
            Ok(response) => {
                warn!(
                    shipment_id = %shipment_id,
                    status = response.status,
                    "item count: lookup failed"
                );
                0
            }
            Err(err) => {
                warn!(shipment_id = %shipment_id, "item count: lookup failed: {err:#}");
                0
            }
        }
    }

    /// Loads a shipment with its items and makes it the current shipment.
    pub async fn set_current(
        &self,
        shipment_id: &ShipmentId,
    ) -> Result<ShipmentDetail, ReceivingError> {
        let token = self.store.begin_detail_fetch().await;
        let query = ShipmentDetailQuery {
            shipment_id: shipment_id.clone(),
        };

        let detail = match self.service.get_shipment_detail(&query).await {
            Ok(response) => detail_from_response(&response),
            Err(err) => Err(ReceivingError::from(err)),
        };
        let detail = match detail {
            Ok(detail) => detail,
            Err(err) => {
                self.toast(SOMETHING_WENT_WRONG);
                error!(shipment_id = %shipment_id, "shipment detail: {err}");
                return Err(err);
            }
        };

        let applied = self
            .commit(Mutation::CurrentReplaced {
                current: Some(detail.clone()),
                token: Some(token),
            })
            .await;
        if !applied {
            debug!(
                shipment_id = %shipment_id,
                "shipment detail: superseded by a newer fetch, skipping product enrichment"
            );
            return Ok(detail);
        }

        let product_ids = detail.distinct_product_ids();
        if !product_ids.is_empty() {
            let products = Arc::clone(&self.products);
            let shipment_id = shipment_id.clone();
            tokio::spawn(async move {
                if let Err(err) = products.fetch_products(product_ids).await {
                    warn!(shipment_id = %shipment_id, "products: enrichment failed: {err:#}");
                }
            });
        }

        Ok(detail)
    }

    /// Posts one receipt per item, concurrently. Each outcome is returned in
    /// item order; one item failing does not stop the others.
    pub async fn receive_shipment_items(
        &self,
        request: &ReceiveRequest,
    ) -> Vec<Result<ServiceResponse, ReceivingError>> {
        join_all(request.items.iter().map(|item| async move {
            let params = ReceiveShipmentItemParams {
                shipment_id: request.shipment_id.clone(),
                location_seq_id: request.location_seq_id.clone(),
                facility_id: self.context.facility_id.clone(),
                shipment_item_seq_id: item.item_seq_id.clone(),
                product_id: item.product_id.clone(),
                quantity_accepted: item.quantity_accepted,
                order_id: item.order_id.clone(),
                order_item_seq_id: item.order_item_seq_id.clone(),
                unit_cost: 0.0,
            };
            let outcome = match self.service.receive_shipment_item(&params).await {
                Ok(response) if response.is_success() => Ok(response),
                Ok(response) => Err(ReceivingError::from(response.fault())),
                Err(err) => Err(ReceivingError::from(err)),
            };
            if let Err(err) = &outcome {
                warn!(
                    shipment_id = %request.shipment_id,
                    item_seq_id = %item.item_seq_id,
                    "receive: item receipt failed: {err}"
                );
            }
            outcome
        }))
        .await
    }

    /// Receives every item, then moves the shipment to the received status.
    /// The status change is attempted whatever happened to the items and
    /// item receipts are not undone if it fails.
    pub async fn receive_shipment(
        &self,
        request: &ReceiveRequest,
    ) -> Result<ServiceResponse, ReceivingError> {
        self.emit(ClientEvent::PresentLoader);

        let item_outcomes = self.receive_shipment_items(request).await;
        let failed_items = item_outcomes.iter().filter(|o| o.is_err()).count();

        let params = UpdateShipmentParams::received(request.shipment_id.clone());
        let result = match self.service.receive_shipment(&params).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(ReceivingError::from(response.fault())),
            Err(err) => Err(ReceivingError::from(err)),
        };

        match &result {
            Ok(_) => {
                info!(
                    shipment_id = %request.shipment_id,
                    items = item_outcomes.len(),
                    failed_items,
                    "receive: shipment received"
                );
                self.emit(ClientEvent::Toast(format!(
                    "{} {}",
                    self.translator.translate(SHIPMENT_RECEIVED),
                    request.shipment_id
                )));
            }
            Err(err) => {
                error!(
                    shipment_id = %request.shipment_id,
                    failed_items,
                    "receive: status update failed: {err}"
                );
                self.toast(SOMETHING_WENT_WRONG);
            }
        }

        self.emit(ClientEvent::DismissLoader);
        result
    }

    /// Adds a product to a shipment with zero quantities.
    pub async fn add_shipment_item(
        &self,
        request: AddItemRequest,
    ) -> Result<ServiceResponse, ReceivingError> {
        let targets_current = request.shipment_id.is_none();
        let shipment_id = match request.shipment_id {
            Some(shipment_id) => shipment_id,
            None => match self.store.current().await {
                Some(current) => current.shipment_id,
                None => return Err(ReceivingError::NoCurrentShipment),
            },
        };

        let product = ShipmentItem {
            quantity_accepted: 0,
            quantity_ordered: 0,
            ..request.item
        };
        let params = AddShipmentItemParams {
            order_id: request.order_id.or_else(|| product.order_id.clone()),
            product_id: product.product_id.clone(),
            quantity: 0,
            shipment_id: shipment_id.clone(),
            shipment_item_seq_id: request.shipment_item_seq_id,
        };

        let result = match self.service.add_shipment_item(&params).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(ReceivingError::from(response.fault())),
            Err(err) => Err(ReceivingError::from(err)),
        };
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.toast(SOMETHING_WENT_WRONG);
                error!(shipment_id = %shipment_id, "add item: {err}");
                return Err(err);
            }
        };

        let counted_shipment = response
            .decode::<AddShipmentItemResponse>()
            .map(|body| body.shipment_id)
            .unwrap_or_else(|_| shipment_id.clone());
        self.update_product_count(&counted_shipment).await;
        if targets_current
            && !self
                .commit(Mutation::CurrentProductAdded {
                    shipment_id: shipment_id.clone(),
                    item: product,
                })
                .await
        {
            warn!(
                shipment_id = %shipment_id,
                "add item: shipment is no longer current, item not added locally"
            );
        }
        info!(shipment_id = %shipment_id, "add item: product added");
        Ok(response)
    }

    /// Counts one more accepted unit for the current shipment's item with
    /// this product code. Returns false if no item matched.
    pub async fn update_shipment_product_count(&self, sku: &str) -> bool {
        self.commit(Mutation::AcceptedIncremented {
            sku: sku.to_string(),
        })
        .await
    }

    /// Counts one more item on a listed shipment.
    pub async fn update_product_count(&self, shipment_id: &ShipmentId) -> bool {
        self.commit(Mutation::ItemCountIncremented {
            shipment_id: shipment_id.clone(),
        })
        .await
    }

    pub async fn clear_shipments(&self) {
        self.store.invalidate_fetches().await;
        self.commit(Mutation::ListReplaced {
            shipments: Vec::new(),
            token: None,
        })
        .await;
        self.commit(Mutation::CurrentReplaced {
            current: None,
            token: None,
        })
        .await;
    }
}

fn shipments_from_response(
    response: &ServiceResponse,
) -> Result<Option<Vec<Shipment>>, ReceivingError> {
    if !response.is_success() {
        return Ok(None);
    }
    let body = response
        .decode::<FindResponse<Shipment>>()
        .map_err(|err| ReceivingError::Decode(err.to_string()))?;
    Ok((!body.docs.is_empty()).then_some(body.docs))
}

fn detail_from_response(response: &ServiceResponse) -> Result<ShipmentDetail, ReceivingError> {
    if !response.is_success() {
        return Err(response.fault().into());
    }
    if !response.data.get("items").is_some_and(Value::is_array) {
        return Err(ReceivingError::MissingItems);
    }
    response
        .decode::<ShipmentDetail>()
        .map_err(|err| ReceivingError::Decode(err.to_string()))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
