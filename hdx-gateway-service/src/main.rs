/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod auth;
mod config;
mod routes;

use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hdx_gateway::clients::facility::HttpFacilityDirectory;
use hdx_gateway::clients::identity_admin::HttpIdentityAdmin;
use hdx_gateway::{
    CallbackKind, CorrelationMap, DispatchPool, ExchangeKind, HttpDispatcher, PgRegistryStore,
    RegistryService, RegistryStore, RequestOrchestrator, ResponseOrchestrator, RoutingResolver,
};

use crate::auth::Authenticator;
use crate::config::Config;
use crate::routes::AppState;

#[derive(Parser)]
#[command()]
struct GatewayArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = GatewayArgs::parse();

    let mut file = File::open(&args.config)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let config: Config = json5::from_str(&contents)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_config.max_connections)
        .connect(&config.database_config.url)
        .await?;
    let store: Arc<dyn RegistryStore> = Arc::new(PgRegistryStore::connect(pool).await?);

    let routing = Arc::new(RoutingResolver::new(
        store.clone(),
        Duration::from_secs(config.gateway_config.routing_cache_ttl_secs),
    ));
    let correlations = Arc::new(CorrelationMap::new(Duration::from_secs(
        config.gateway_config.correlation_ttl_secs,
    )));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.gateway_config.dispatch_timeout_secs))
        .build()?;
    let dispatcher = Arc::new(HttpDispatcher::with_client(http.clone()));
    let dispatch_pool = DispatchPool::new(
        dispatcher.clone(),
        config.gateway_config.dispatch_workers,
        config.gateway_config.dispatch_queue_size,
    );

    let identity = Arc::new(HttpIdentityAdmin::new(
        http.clone(),
        config.identity_config.base_url.clone(),
        config.identity_config.realm.clone(),
        config.identity_config.admin_client_id.clone(),
        config.identity_config.admin_client_secret.clone(),
    ));
    let facility = Arc::new(HttpFacilityDirectory::new(
        http.clone(),
        config.facility_config.base_url.clone(),
    ));
    let registry = Arc::new(RegistryService::new(
        store,
        routing.clone(),
        identity,
        facility,
    ));

    let authenticator = Arc::new(Authenticator::new(
        http,
        &config.identity_config.base_url,
        &config.identity_config.realm,
        config.identity_config.admin_client_id.clone(),
        config.identity_config.admin_client_secret.clone(),
    ));

    let gateway_id = config.gateway_config.gateway_id.clone();
    let state = AppState {
        authenticator,
        registry,
        discover_requests: Arc::new(RequestOrchestrator::new(
            ExchangeKind::care_contexts_discover(),
            gateway_id.clone(),
            routing.clone(),
            correlations.clone(),
            dispatch_pool.clone(),
        )),
        discover_callbacks: Arc::new(ResponseOrchestrator::new(
            CallbackKind::on_discover(),
            gateway_id.clone(),
            routing.clone(),
            correlations.clone(),
            dispatcher.clone(),
        )),
        link_requests: Arc::new(RequestOrchestrator::new(
            ExchangeKind::link_init(),
            gateway_id.clone(),
            routing.clone(),
            correlations.clone(),
            dispatch_pool,
        )),
        link_callbacks: Arc::new(ResponseOrchestrator::new(
            CallbackKind::on_link_init(),
            gateway_id,
            routing,
            correlations,
            dispatcher,
        )),
    };

    let listener = tokio::net::TcpListener::bind((
        config.server_config.host.as_str(),
        config.server_config.port,
    ))
    .await?;
    info!(
        host = config.server_config.host.as_str(),
        port = config.server_config.port,
        "hdx-gateway-service listening"
    );

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
