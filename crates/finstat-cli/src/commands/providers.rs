use finstat_core::ApiExtractor;
use serde_json::{json, Value};

use crate::error::CliError;

pub fn run() -> Result<Value, CliError> {
    let snapshots: Vec<Value> = ApiExtractor::default()
        .provider_snapshots()
        .into_iter()
        .map(|snapshot| {
            json!({
                "id": snapshot.id.as_str(),
                "mock_mode": snapshot.mock_mode,
                "has_api_key": snapshot.has_api_key,
            })
        })
        .collect();

    Ok(json!({ "providers": snapshots }))
}
