//! Accessors for KDL node arguments and properties.

use crate::{ConfigError, ConfigResult};
use kdl::KdlNode;

pub(crate) fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

pub(crate) fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn get_first_int_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

pub(crate) fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

pub(crate) fn get_bool_prop(node: &KdlNode, name: &str) -> Option<bool> {
    node.get(name).and_then(|v| v.as_bool())
}

pub(crate) fn get_int_prop(node: &KdlNode, name: &str) -> Option<i128> {
    node.get(name).and_then(|v| v.as_integer())
}

/// Narrow a KDL integer to `T`, naming `field` on failure.
pub(crate) fn narrow<T: TryFrom<i128>>(value: i128, field: &str) -> ConfigResult<T> {
    T::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("{} is out of range", value),
    })
}

/// Required string property.
pub(crate) fn require_string_prop(node: &KdlNode, name: &str, field: &str) -> ConfigResult<String> {
    get_string_prop(node, name).ok_or_else(|| ConfigError::MissingField(field.to_string()))
}
