//! Handler parameter injection.
//!
//! # Responsibilities
//! - Parse injection specifiers (`prefix:suffix` or a bare alias name)
//! - Look up providers by prefix and entity parsers for `$entity`
//! - Turn specifiers into resolvers once, when a deployment is built
//!
//! # Design Decisions
//! - Provider and parser registries are owned by the adapter, never global
//! - Unknown prefixes, parsers and aliases resolve to an absent value and
//!   produce one warning at build time
//! - Alias chains are followed eagerly; a cycle fails the deployment

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;

use crate::adapter::error::AdapterError;
use crate::http::exchange::HttpServerExchange;

/// A value handed to a handler in one of its injected positions.
pub type Injected = Arc<dyn Any + Send + Sync>;

/// Wrap a value for injection.
pub fn injected<T: Any + Send + Sync>(value: T) -> Injected {
    Arc::new(value)
}

/// Reserved prefix that parses the request body.
pub const ENTITY_PREFIX: &str = "$entity";

/// A parsed injection specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionSpecifier {
    /// `prefix:suffix`, split at the first colon.
    Prefixed { prefix: String, suffix: String },
    /// A name registered with `Routes::alias`.
    Alias(String),
}

impl InjectionSpecifier {
    pub fn parse(specifier: &str) -> Result<Self, AdapterError> {
        let invalid = |reason: &str| AdapterError::InvalidSpecifier {
            specifier: specifier.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = specifier.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty specifier"));
        }
        match trimmed.split_once(':') {
            Some(("", _)) => Err(invalid("empty prefix")),
            Some((prefix, suffix)) => Ok(Self::Prefixed {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            }),
            None => Ok(Self::Alias(trimmed.to_string())),
        }
    }
}

impl fmt::Display for InjectionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefixed { prefix, suffix } => write!(f, "{prefix}:{suffix}"),
            Self::Alias(name) => f.write_str(name),
        }
    }
}

/// A named source of injectable objects, selected by specifier prefix.
pub trait InjectionProvider: Send + Sync {
    /// Look up the object named by `suffix`, or `None` if there is none.
    fn get_object(&self, suffix: &str) -> Option<Injected>;
}

/// Adapts a closure into an [`InjectionProvider`].
pub struct ProviderFn<F>(F);

pub fn provider_fn<F>(f: F) -> ProviderFn<F>
where
    F: Fn(&str) -> Option<Injected> + Send + Sync,
{
    ProviderFn(f)
}

impl<F> InjectionProvider for ProviderFn<F>
where
    F: Fn(&str) -> Option<Injected> + Send + Sync,
{
    fn get_object(&self, suffix: &str) -> Option<Injected> {
        (self.0)(suffix)
    }
}

/// Resolves `env:NAME` to the environment variable's value as a `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProvider;

impl InjectionProvider for EnvProvider {
    fn get_object(&self, suffix: &str) -> Option<Injected> {
        std::env::var(suffix).ok().map(injected)
    }
}

/// A fixed table of named objects.
#[derive(Default, Clone)]
pub struct StaticProvider {
    objects: HashMap<String, Injected>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.objects.insert(name.into(), injected(value));
        self
    }
}

impl InjectionProvider for StaticProvider {
    fn get_object(&self, suffix: &str) -> Option<Injected> {
        self.objects.get(suffix).cloned()
    }
}

/// Turns a request body into an injectable value for `$entity:<name>`.
pub trait EntityParser: Send + Sync {
    fn parse(&self, exchange: &HttpServerExchange) -> Option<Injected>;
}

/// `$entity:json`: the body as a `serde_json::Value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntity;

impl EntityParser for JsonEntity {
    fn parse(&self, exchange: &HttpServerExchange) -> Option<Injected> {
        let body = exchange.request_body();
        if body.is_empty() {
            return None;
        }
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) => Some(injected(value)),
            Err(e) => {
                tracing::debug!(
                    path = %exchange.relative_path(),
                    error = %e,
                    "Request body is not valid JSON"
                );
                None
            }
        }
    }
}

/// `$entity:string` / `$entity:text`: the body as a lossy UTF-8 `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringEntity;

impl EntityParser for StringEntity {
    fn parse(&self, exchange: &HttpServerExchange) -> Option<Injected> {
        Some(injected(
            String::from_utf8_lossy(exchange.request_body()).into_owned(),
        ))
    }
}

/// `$entity:bytes`: the raw body.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesEntity;

impl EntityParser for BytesEntity {
    fn parse(&self, exchange: &HttpServerExchange) -> Option<Injected> {
        Some(injected::<Bytes>(exchange.request_body().clone()))
    }
}

/// A pre-resolved injection strategy for one handler parameter.
#[derive(Clone)]
pub enum Resolver {
    /// Always yields nothing.
    Absent,
    Provider {
        provider: Arc<dyn InjectionProvider>,
        suffix: String,
    },
    Entity(Arc<dyn EntityParser>),
}

impl Resolver {
    pub fn resolve(&self, exchange: &HttpServerExchange) -> Option<Injected> {
        match self {
            Self::Absent => None,
            Self::Provider { provider, suffix } => provider.get_object(suffix),
            Self::Entity(parser) => parser.parse(exchange),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Provider { suffix, .. } => f.debug_struct("Provider").field("suffix", suffix).finish(),
            Self::Entity(_) => f.write_str("Entity"),
        }
    }
}

/// Injection providers and entity parsers available to a deployment.
#[derive(Clone)]
pub struct InjectionRegistry {
    providers: HashMap<String, Arc<dyn InjectionProvider>>,
    entity_parsers: HashMap<String, Arc<dyn EntityParser>>,
}

impl Default for InjectionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            entity_parsers: HashMap::new(),
        };
        registry.add_entity_parser("json", Arc::new(JsonEntity));
        registry.add_entity_parser("string", Arc::new(StringEntity));
        registry.add_entity_parser("text", Arc::new(StringEntity));
        registry.add_entity_parser("bytes", Arc::new(BytesEntity));
        registry
    }
}

impl InjectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for `prefix`, replacing any previous one.
    pub fn add_provider(
        &mut self,
        prefix: &str,
        provider: Arc<dyn InjectionProvider>,
    ) -> Result<(), AdapterError> {
        let invalid = |reason: &str| AdapterError::InvalidSpecifier {
            specifier: prefix.to_string(),
            reason: reason.to_string(),
        };
        if prefix.is_empty() || prefix.contains(':') {
            return Err(invalid("provider prefix must be non-empty and contain no ':'"));
        }
        if prefix == ENTITY_PREFIX {
            return Err(invalid("prefix is reserved for entity parsers"));
        }
        self.providers.insert(prefix.to_string(), provider);
        Ok(())
    }

    pub fn add_entity_parser(&mut self, name: &str, parser: Arc<dyn EntityParser>) {
        self.entity_parsers.insert(name.to_string(), parser);
    }

    pub fn has_provider(&self, prefix: &str) -> bool {
        self.providers.contains_key(prefix)
    }

    /// Build the resolver for `specifier`, following aliases.
    pub fn resolver(
        &self,
        specifier: &InjectionSpecifier,
        aliases: &BTreeMap<String, InjectionSpecifier>,
    ) -> Result<Resolver, AdapterError> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = specifier;

        loop {
            match current {
                InjectionSpecifier::Alias(name) => {
                    if chain.contains(name) {
                        chain.push(name.clone());
                        return Err(AdapterError::AliasCycle(chain));
                    }
                    chain.push(name.clone());
                    match aliases.get(name) {
                        Some(target) => current = target,
                        None => {
                            tracing::warn!(alias = %name, "Unknown injection alias, value will be absent");
                            return Ok(Resolver::Absent);
                        }
                    }
                }
                InjectionSpecifier::Prefixed { prefix, suffix } if prefix == ENTITY_PREFIX => {
                    return Ok(match self.entity_parsers.get(suffix) {
                        Some(parser) => Resolver::Entity(parser.clone()),
                        None => {
                            tracing::warn!(parser = %suffix, "Unknown entity parser, value will be absent");
                            Resolver::Absent
                        }
                    });
                }
                InjectionSpecifier::Prefixed { prefix, suffix } => {
                    return Ok(match self.providers.get(prefix) {
                        Some(provider) => Resolver::Provider {
                            provider: provider.clone(),
                            suffix: suffix.clone(),
                        },
                        None => {
                            tracing::warn!(prefix = %prefix, "Unknown injection provider, value will be absent");
                            Resolver::Absent
                        }
                    });
                }
            }
        }
    }
}
