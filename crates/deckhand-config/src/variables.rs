//! Service output interpolation for environment values.
//!
//! Environment values may reference the outputs of the application's
//! services:
//! - `${services.redis.url}` - the `url` output of the `redis` service
//!
//! Any other `${...}` text is left as written.

use deckhand_core::{Deferred, EnvMap, Environment, ResolvedServices};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

// Regex for matching ${services.<name>.<output>}
static SERVICE_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{services\.([a-zA-Z_][a-zA-Z0-9_-]*)\.([a-zA-Z_][a-zA-Z0-9_]*)\}").unwrap()
});

/// A `${services.<service>.<output>}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReference {
    pub service: String,
    pub output: String,
}

enum Segment {
    Literal(String),
    Reference { reference: ServiceReference, raw: String },
}

fn segments(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in SERVICE_REF_REGEX.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(template[last..whole.start()].to_string()));
        }
        segments.push(Segment::Reference {
            reference: ServiceReference {
                service: caps[1].to_string(),
                output: caps[2].to_string(),
            },
            raw: whole.as_str().to_string(),
        });
        last = whole.end();
    }
    if last < template.len() {
        segments.push(Segment::Literal(template[last..].to_string()));
    }
    segments
}

/// All service references in `template`, in order of appearance.
pub fn references(template: &str) -> Vec<ServiceReference> {
    segments(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Reference { reference, .. } => Some(reference),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Substitute service outputs into `template`.
///
/// References to unknown services or outputs are kept verbatim.
pub fn interpolate(template: &str, services: &ResolvedServices) -> Deferred<String> {
    let parts: Vec<Deferred<String>> = segments(template)
        .into_iter()
        .map(|segment| match segment {
            Segment::Literal(text) => Deferred::known(text),
            Segment::Reference { reference, raw } => {
                match services
                    .get(&reference.service)
                    .and_then(|result| result.output(&reference.output))
                {
                    Some(value) => value.clone(),
                    None => {
                        warn!(
                            service = %reference.service,
                            output = %reference.output,
                            "Unknown service output, keeping reference"
                        );
                        Deferred::known(raw)
                    }
                }
            }
        })
        .collect();

    Deferred::combine(parts, |parts| parts.concat())
}

/// Build an application environment from raw values.
///
/// Values without service references stay constants; if any value has one,
/// the environment is derived from the resolved services.
pub fn environment_from(values: BTreeMap<String, String>) -> Environment {
    let has_references = values.values().any(|v| SERVICE_REF_REGEX.is_match(v));
    if !has_references {
        let env: EnvMap = values
            .into_iter()
            .map(|(key, value)| (key, Deferred::known(value)))
            .collect();
        return Environment::Static(env);
    }

    Environment::derived(move |services| {
        values
            .iter()
            .map(|(key, value)| (key.clone(), interpolate(value, services)))
            .collect()
    })
}
