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

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub(crate) gateway_config: GatewayConfig,
    pub(crate) server_config: ServerConfig,
    pub(crate) database_config: DatabaseConfig,
    pub(crate) identity_config: IdentityConfig,
    pub(crate) facility_config: FacilityConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Identity this gateway writes into the `X-GATEWAY-ID` header.
    pub(crate) gateway_id: String,
    #[serde(default = "default_routing_cache_ttl_secs")]
    pub(crate) routing_cache_ttl_secs: u64,
    #[serde(default = "default_correlation_ttl_secs")]
    pub(crate) correlation_ttl_secs: u64,
    #[serde(default = "default_dispatch_timeout_secs")]
    pub(crate) dispatch_timeout_secs: u64,
    #[serde(default = "default_dispatch_workers")]
    pub(crate) dispatch_workers: usize,
    #[serde(default = "default_dispatch_queue_size")]
    pub(crate) dispatch_queue_size: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub(crate) url: String,
    #[serde(default = "default_max_connections")]
    pub(crate) max_connections: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    pub(crate) base_url: String,
    pub(crate) realm: String,
    pub(crate) admin_client_id: String,
    pub(crate) admin_client_secret: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FacilityConfig {
    pub(crate) base_url: String,
}

fn default_routing_cache_ttl_secs() -> u64 {
    600
}

fn default_correlation_ttl_secs() -> u64 {
    300
}

fn default_dispatch_timeout_secs() -> u64 {
    10
}

fn default_dispatch_workers() -> usize {
    8
}

fn default_dispatch_queue_size() -> usize {
    256
}

fn default_max_connections() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = json5::from_str(
            r#"{
                gateway_config: { gateway_id: "hdx-gateway" },
                server_config: { host: "0.0.0.0", port: 8000 },
                database_config: { url: "postgres://gateway@localhost/registry" },
                identity_config: {
                    base_url: "https://iam.example",
                    realm: "gateway",
                    admin_client_id: "gateway-admin",
                    admin_client_secret: "secret",
                },
                facility_config: { base_url: "https://hfr.example/api" },
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.gateway_config.routing_cache_ttl_secs, 600);
        assert_eq!(config.gateway_config.correlation_ttl_secs, 300);
        assert_eq!(config.gateway_config.dispatch_workers, 8);
        assert_eq!(config.database_config.max_connections, 10);
    }
}
