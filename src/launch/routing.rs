// ABOUTME: Typed reverse-proxy routing rules for a deployment.
// ABOUTME: Routers, middlewares and the service port, flattened to traefik labels at the engine boundary.

use crate::config::RateLimit;
use std::collections::{BTreeMap, BTreeSet};

/// Certificate resolver configured on the proxy.
pub const CERT_RESOLVER: &str = "exoframeChallenge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Entrypoint {
    Web,
    WebSecure,
}

impl Entrypoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Entrypoint::Web => "web",
            Entrypoint::WebSecure => "websecure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Middleware {
    RedirectScheme { scheme: String },
    Compress,
    RateLimit { average: u32, burst: u32, period: String },
    BasicAuth { users: String },
}

impl Middleware {
    fn labels(&self, prefix: &str, out: &mut BTreeMap<String, String>) {
        match self {
            Middleware::RedirectScheme { scheme } => {
                out.insert(format!("{prefix}.redirectscheme.scheme"), scheme.clone());
            }
            Middleware::Compress => {
                out.insert(format!("{prefix}.compress"), "true".to_string());
            }
            Middleware::RateLimit {
                average,
                burst,
                period,
            } => {
                out.insert(format!("{prefix}.ratelimit.average"), average.to_string());
                out.insert(format!("{prefix}.ratelimit.burst"), burst.to_string());
                out.insert(format!("{prefix}.ratelimit.period"), period.clone());
            }
            Middleware::BasicAuth { users } => {
                out.insert(format!("{prefix}.basicauth.users"), users.clone());
            }
        }
    }
}

/// A middleware defined on this container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareDef {
    pub name: String,
    pub kind: Middleware,
}

impl MiddlewareDef {
    /// Reference usable from a router on the docker provider.
    pub fn reference(&self) -> String {
        format!("{}@docker", self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Router {
    pub name: String,
    pub rule: Option<String>,
    pub entrypoints: BTreeSet<Entrypoint>,
    pub cert_resolver: Option<String>,
    /// Set semantics: duplicates collapse and serialisation order is stable.
    pub middlewares: BTreeSet<String>,
}

impl Router {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn labels(&self, out: &mut BTreeMap<String, String>) {
        let prefix = format!("traefik.http.routers.{}", self.name);
        if let Some(rule) = &self.rule {
            out.insert(format!("{prefix}.rule"), rule.clone());
        }
        if !self.entrypoints.is_empty() {
            let entrypoints: Vec<&str> = self.entrypoints.iter().map(|e| e.as_str()).collect();
            out.insert(format!("{prefix}.entrypoints"), entrypoints.join(","));
        }
        if let Some(resolver) = &self.cert_resolver {
            out.insert(format!("{prefix}.tls.certresolver"), resolver.clone());
        }
        if !self.middlewares.is_empty() {
            let refs: Vec<&str> = self.middlewares.iter().map(String::as_str).collect();
            out.insert(format!("{prefix}.middlewares"), refs.join(","));
        }
    }
}

/// Inputs for one deployment's routing.
#[derive(Debug, Clone, Default)]
pub struct RoutingInput<'a> {
    /// Router/middleware base name (the container name).
    pub name: &'a str,
    pub network: &'a str,
    /// Resolved host and the port to route to.
    pub host: Option<(&'a str, u16)>,
    pub letsencrypt: bool,
    pub compress: bool,
    pub rate_limit: Option<&'a RateLimit>,
    pub basic_auth: Option<&'a str>,
    pub extra_middlewares: &'a [String],
}

/// Complete routing for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRules {
    pub network: String,
    pub routers: Vec<Router>,
    pub middlewares: Vec<MiddlewareDef>,
    /// Service name and target port.
    pub service: Option<(String, u16)>,
}

impl RoutingRules {
    pub fn build(input: &RoutingInput<'_>) -> Self {
        let name = input.name;
        let mut main = Router::new(name);
        let mut plain: Option<Router> = None;
        let mut middlewares = Vec::new();

        if input.letsencrypt {
            let https = MiddlewareDef {
                name: format!("{name}-https"),
                kind: Middleware::RedirectScheme {
                    scheme: "https".to_string(),
                },
            };
            main.cert_resolver = Some(CERT_RESOLVER.to_string());
            main.entrypoints.insert(Entrypoint::WebSecure);

            let mut web = Router::new(format!("{name}-web"));
            web.entrypoints.insert(Entrypoint::Web);
            web.middlewares.insert(https.reference());
            plain = Some(web);
            middlewares.push(https);
        }

        if input.compress {
            let compress = MiddlewareDef {
                name: format!("{name}-compress"),
                kind: Middleware::Compress,
            };
            main.middlewares.insert(compress.reference());
            middlewares.push(compress);
        }

        let mut service = None;
        if let Some((host, port)) = input.host {
            let rule = format!("Host(`{host}`)");
            main.rule = Some(rule.clone());
            if let Some(web) = plain.as_mut() {
                web.rule = Some(rule);
            }
            service = Some((name.to_string(), port));
        }

        if let Some(limit) = input.rate_limit {
            let rate = MiddlewareDef {
                name: format!("{name}-rate-limit"),
                kind: Middleware::RateLimit {
                    average: limit.average,
                    burst: limit.burst,
                    period: limit.period.clone(),
                },
            };
            main.middlewares.insert(rate.reference());
            middlewares.push(rate);
        }

        if let Some(users) = input.basic_auth.filter(|u| !u.trim().is_empty()) {
            let auth = MiddlewareDef {
                name: format!("{name}-auth"),
                kind: Middleware::BasicAuth {
                    users: users.to_string(),
                },
            };
            main.middlewares.insert(auth.reference());
            middlewares.push(auth);
        }

        main.middlewares
            .extend(input.extra_middlewares.iter().cloned());

        let mut routers = vec![main];
        routers.extend(plain);

        Self {
            network: input.network.to_string(),
            routers,
            middlewares,
            service,
        }
    }

    /// Flatten into container labels.
    pub fn to_labels(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert("traefik.enable".to_string(), "true".to_string());
        out.insert("traefik.docker.network".to_string(), self.network.clone());

        for router in &self.routers {
            router.labels(&mut out);
        }
        for mw in &self.middlewares {
            mw.kind
                .labels(&format!("traefik.http.middlewares.{}", mw.name), &mut out);
        }
        if let Some((name, port)) = &self.service {
            out.insert(
                format!("traefik.http.services.{name}.loadbalancer.server.port"),
                port.to_string(),
            );
        }
        out
    }

    pub fn has_rule(&self) -> bool {
        self.routers.iter().any(|r| r.rule.is_some())
    }
}
