use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    AddItemRequest, ClientEvent, HttpShipmentService, ReceiveRequest, ReceivingClient,
    ReceivingContext,
};
use serde_json::json;
use shared::{
    domain::{FacilityId, OrderId, ProductId, ShipmentId, ShipmentItem},
    protocol::ShipmentQuery,
};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(about = "Receive inbound shipments against the order management service")]
struct Cli {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    facility_id: Option<String>,
    #[arg(long)]
    api_token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List shipments bound for the facility, one page at a time.
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long)]
        size: Option<u32>,
        #[arg(long, default_value = "PURCH_SHIP_SHIPPED")]
        status: String,
    },
    /// Load a shipment and print its items.
    Show {
        shipment_id: String,
    },
    /// Scan products into a shipment and receive it.
    Receive {
        shipment_id: String,
        /// Product code scanned once per occurrence.
        #[arg(long = "scan")]
        scans: Vec<String>,
        /// Accept the ordered quantity of every item without scanning.
        #[arg(long)]
        accept_all: bool,
    },
    /// Add a product to a shipment with zero ordered and accepted quantities.
    AddItem {
        shipment_id: String,
        product_id: String,
        /// Product code used when scanning this item.
        #[arg(long)]
        sku: Option<String>,
        /// Purchase order the item belongs to.
        #[arg(long)]
        order_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings();
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    if let Some(facility_id) = cli.facility_id {
        settings.facility_id = facility_id;
    }
    if cli.api_token.is_some() {
        settings.api_token = cli.api_token;
    }
    settings.validate()?;

    let service = HttpShipmentService::new(&settings.server_url, settings.api_token.clone())?;
    let client = ReceivingClient::new(
        Arc::new(service),
        ReceivingContext {
            facility_id: FacilityId::new(settings.facility_id.clone()),
        },
    );
    let mut events = client.subscribe_events();

    let outcome = run(&client, &settings, cli.command).await;
    print_events(&mut events);
    outcome
}

async fn run(
    client: &ReceivingClient,
    settings: &config::Settings,
    command: Command,
) -> Result<()> {
    match command {
        Command::List { page, size, status } => {
            let mut query = ShipmentQuery::page(page, size.unwrap_or(settings.view_size))
                .with_filter("entityName", "Shipment")
                .with_filter("noConditionFind", "Y")
                .with_filter("orderBy", "estimatedArrivalDate ASC");
            let mut input_fields = serde_json::Map::new();
            input_fields.insert("statusId".into(), json!(status));
            if !settings.facility_id.is_empty() {
                input_fields.insert("destinationFacilityId".into(), json!(settings.facility_id));
            }
            query = query.with_filter("inputFields", input_fields);

            for shipment in client.find_shipments(&query).await {
                println!(
                    "{}\t{}\t{} items",
                    shipment.shipment_id,
                    shipment
                        .status_desc
                        .as_deref()
                        .unwrap_or(shipment.status_id.as_str()),
                    shipment.item_count
                );
            }
        }
        Command::Show { shipment_id } => {
            let detail = client.set_current(&ShipmentId::new(shipment_id)).await?;
            print_items(&detail.items);
        }
        Command::Receive {
            shipment_id,
            scans,
            accept_all,
        } => {
            if settings.facility_id.is_empty() {
                bail!("facility_id is required to receive a shipment");
            }
            client.set_current(&ShipmentId::new(shipment_id)).await?;
            for sku in &scans {
                if !client.update_shipment_product_count(sku).await {
                    tracing::warn!(sku = %sku, "scanned product is not on this shipment");
                }
            }
            let Some(mut current) = client.store().current().await else {
                bail!("shipment detail was replaced before receiving");
            };
            if accept_all {
                for item in &mut current.items {
                    item.quantity_accepted = item.quantity_ordered;
                }
            }
            print_items(&current.items);
            client
                .receive_shipment(&ReceiveRequest::from_detail(&current))
                .await?;
        }
        Command::AddItem {
            shipment_id,
            product_id,
            sku,
            order_id,
        } => {
            client.set_current(&ShipmentId::new(shipment_id)).await?;
            client
                .add_shipment_item(AddItemRequest {
                    shipment_id: None,
                    order_id: order_id.map(OrderId::new),
                    shipment_item_seq_id: None,
                    item: ShipmentItem {
                        item_seq_id: String::new(),
                        product_id: ProductId::new(product_id),
                        sku,
                        order_id: None,
                        order_item_seq_id: None,
                        quantity_ordered: 0,
                        quantity_accepted: 0,
                    },
                })
                .await?;
            if let Some(current) = client.store().current().await {
                print_items(&current.items);
            }
        }
    }
    Ok(())
}

fn print_items(items: &[ShipmentItem]) {
    for item in items {
        println!(
            "{}\t{}\t{}\taccepted {}/{}",
            item.item_seq_id,
            item.product_id,
            item.sku.as_deref().unwrap_or("-"),
            item.quantity_accepted,
            item.quantity_ordered
        );
    }
}

fn print_events(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::Toast(message) => println!("{message}"),
            ClientEvent::PresentLoader | ClientEvent::DismissLoader => {
                tracing::debug!(?event, "loader")
            }
            ClientEvent::StoreUpdated(kind) => tracing::debug!(?kind, "store updated"),
        }
    }
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
