use crate::models::wire::{null_as_default, string_or_number, truthy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GpuPrice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub usd: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nlov: f64,
}

/// A GPU model offered by the provider. Fields the listing adds beyond these
/// are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpuOffer {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "truthy")]
    pub available: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: GpuPrice,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
