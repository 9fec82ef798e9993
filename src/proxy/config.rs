// ABOUTME: Generated traefik static configuration and user override merging.
// ABOUTME: Log level, entrypoints, docker provider and the ACME resolver.

use crate::config::ServerConfig;
use crate::launch::routing::CERT_RESOLVER;
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

pub const DOCKER_ENDPOINT: &str = "unix:///var/run/docker.sock";
pub const ACME_STORAGE: &str = "/var/acme/acme.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TraefikConfig {
    log: LogSection,
    entry_points: BTreeMap<&'static str, EntryPoint>,
    providers: Providers,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    certificates_resolvers: BTreeMap<&'static str, Resolver>,
}

#[derive(Debug, Serialize)]
struct LogSection {
    level: &'static str,
}

#[derive(Debug, Serialize)]
struct EntryPoint {
    address: &'static str,
}

#[derive(Debug, Serialize)]
struct Providers {
    docker: DockerProvider,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DockerProvider {
    endpoint: &'static str,
    exposed_by_default: bool,
    network: String,
}

#[derive(Debug, Serialize)]
struct Resolver {
    acme: Acme,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Acme {
    email: String,
    storage: &'static str,
    http_challenge: HttpChallenge,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpChallenge {
    entry_point: &'static str,
}

/// Static proxy configuration derived from the server config.
pub fn generate(server: &ServerConfig) -> Result<Value, serde_yaml::Error> {
    let mut entry_points = BTreeMap::from([("web", EntryPoint { address: ":80" })]);
    let mut certificates_resolvers = BTreeMap::new();

    if server.letsencrypt {
        entry_points.insert("websecure", EntryPoint { address: ":443" });
        certificates_resolvers.insert(
            CERT_RESOLVER,
            Resolver {
                acme: Acme {
                    email: server.letsencrypt_email.clone(),
                    storage: ACME_STORAGE,
                    http_challenge: HttpChallenge { entry_point: "web" },
                },
            },
        );
    }

    let config = TraefikConfig {
        log: LogSection {
            level: if server.debug { "DEBUG" } else { "WARN" },
        },
        entry_points,
        providers: Providers {
            docker: DockerProvider {
                endpoint: DOCKER_ENDPOINT,
                exposed_by_default: false,
                network: server.exoframe_network.clone(),
            },
        },
        certificates_resolvers,
    };

    serde_yaml::to_value(&config)
}

/// Shallow merge: top-level keys of `overrides` replace those of `base`.
pub fn merge(base: Value, overrides: Value) -> Value {
    match (base, overrides) {
        (Value::Mapping(mut base), Value::Mapping(overrides)) => {
            for (k, v) in overrides {
                base.insert(k, v);
            }
            Value::Mapping(base)
        }
        (base, Value::Null) => base,
        (base, _) => {
            tracing::warn!("proxy config override is not a mapping, ignoring it");
            base
        }
    }
}
