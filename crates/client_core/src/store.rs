//! Client-side shipment store. State only changes through [`Mutation`]s
//! applied by [`ShipmentStore::commit`].

use std::collections::{HashMap, HashSet};

use shared::domain::{Shipment, ShipmentDetail, ShipmentId, ShipmentItem, StatusId};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentState {
    pub shipments: Vec<Shipment>,
    pub current: Option<ShipmentDetail>,
    pub status: HashMap<StatusId, String>,
}

/// Generation a fetch was started under. Commits carrying an outdated token
/// are dropped so a slow response cannot overwrite a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    ShipmentListUpdated,
    ShipmentStatusUpdated,
    ShipmentCurrentUpdated,
    ShipmentCurrentProductAdded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ListReplaced {
        shipments: Vec<Shipment>,
        token: Option<FetchToken>,
    },
    ListAppended {
        shipments: Vec<Shipment>,
        token: FetchToken,
    },
    ItemCountIncremented {
        shipment_id: ShipmentId,
    },
    StatusCached(HashMap<StatusId, String>),
    CurrentReplaced {
        current: Option<ShipmentDetail>,
        token: Option<FetchToken>,
    },
    AcceptedIncremented {
        sku: String,
    },
    /// Only lands if `shipment_id` is still the current shipment.
    CurrentProductAdded {
        shipment_id: ShipmentId,
        item: ShipmentItem,
    },
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::ListReplaced { .. }
            | Mutation::ListAppended { .. }
            | Mutation::ItemCountIncremented { .. } => MutationKind::ShipmentListUpdated,
            Mutation::StatusCached(_) => MutationKind::ShipmentStatusUpdated,
            Mutation::CurrentReplaced { .. } | Mutation::AcceptedIncremented { .. } => {
                MutationKind::ShipmentCurrentUpdated
            }
            Mutation::CurrentProductAdded { .. } => MutationKind::ShipmentCurrentProductAdded,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    state: ShipmentState,
    /// Last token handed to a first-page fetch or an invalidation.
    list_requested: u64,
    /// Generation of the list currently held; later pages must match it.
    list_generation: u64,
    detail_requested: u64,
    detail_generation: u64,
}

#[derive(Default)]
pub struct ShipmentStore {
    inner: RwLock<StoreInner>,
}

impl ShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> ShipmentState {
        self.inner.read().await.state.clone()
    }

    pub async fn shipments(&self) -> Vec<Shipment> {
        self.inner.read().await.state.shipments.clone()
    }

    pub async fn current(&self) -> Option<ShipmentDetail> {
        self.inner.read().await.state.current.clone()
    }

    pub async fn status_cache(&self) -> HashMap<StatusId, String> {
        self.inner.read().await.state.status.clone()
    }

    /// A first-page fetch gets a fresh token and only moves the list to a new
    /// generation once it commits. Later pages join the generation on screen.
    pub async fn begin_list_fetch(&self, first_page: bool) -> FetchToken {
        let mut guard = self.inner.write().await;
        if first_page {
            guard.list_requested += 1;
            FetchToken(guard.list_requested)
        } else {
            FetchToken(guard.list_generation)
        }
    }

    pub async fn begin_detail_fetch(&self) -> FetchToken {
        let mut guard = self.inner.write().await;
        guard.detail_requested += 1;
        FetchToken(guard.detail_requested)
    }

    /// Outdates every fetch still in flight.
    pub async fn invalidate_fetches(&self) {
        let mut guard = self.inner.write().await;
        guard.list_requested += 1;
        guard.list_generation = guard.list_requested;
        guard.detail_requested += 1;
        guard.detail_generation = guard.detail_requested;
    }

    /// Applies `mutation`; returns false when it was stale or matched nothing.
    pub async fn commit(&self, mutation: Mutation) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let state = &mut inner.state;

        match mutation {
            Mutation::ListReplaced { shipments, token } => {
                if let Some(token) = token {
                    if token.0 <= inner.list_generation {
                        return false;
                    }
                    inner.list_generation = token.0;
                }
                state.shipments = shipments;
                true
            }
            Mutation::ListAppended { shipments, token } => {
                if token.0 != inner.list_generation {
                    return false;
                }
                let mut known: HashSet<ShipmentId> = state
                    .shipments
                    .iter()
                    .map(|shipment| shipment.shipment_id.clone())
                    .collect();
                state.shipments.extend(
                    shipments
                        .into_iter()
                        .filter(|shipment| known.insert(shipment.shipment_id.clone())),
                );
                true
            }
            Mutation::ItemCountIncremented { shipment_id } => {
                match state
                    .shipments
                    .iter_mut()
                    .find(|shipment| shipment.shipment_id == shipment_id)
                {
                    Some(shipment) => {
                        shipment.item_count = shipment.item_count.saturating_add(1);
                        true
                    }
                    None => false,
                }
            }
            Mutation::StatusCached(statuses) => {
                for (status_id, description) in statuses {
                    state.status.entry(status_id).or_insert(description);
                }
                true
            }
            Mutation::CurrentReplaced { current, token } => {
                if let Some(token) = token {
                    if token.0 <= inner.detail_generation {
                        return false;
                    }
                    inner.detail_generation = token.0;
                }
                state.current = current;
                true
            }
            Mutation::AcceptedIncremented { sku } => {
                let Some(current) = state.current.as_mut() else {
                    return false;
                };
                match current.items.iter_mut().find(|item| item.matches_sku(&sku)) {
                    Some(item) => {
                        item.quantity_accepted = item.quantity_accepted.saturating_add(1);
                        true
                    }
                    None => false,
                }
            }
            Mutation::CurrentProductAdded { shipment_id, item } => {
                match state.current.as_mut() {
                    Some(current) if current.shipment_id == shipment_id => {
                        current.items.push(item);
                        true
                    }
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
