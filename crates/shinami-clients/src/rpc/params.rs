/*
[INPUT]:  Positional JSON-RPC params, possibly ending in absent optionals
[OUTPUT]: Params with trailing nulls removed
[POS]:    RPC layer - request param shaping
[UPDATE]: When param encoding rules change
*/

use serde_json::Value;

/// Drop trailing `null` values so optional params can be omitted by position
pub fn trim_trailing_params(mut params: Vec<Value>) -> Vec<Value> {
    while matches!(params.last(), Some(Value::Null)) {
        params.pop();
    }
    params
}
