//! Catalog printed by `discover`.

use decentraland_poaps_source::{
    POAPS_METADATA, POAPS_METADATA_SCHEMA, POAPS_XDAI, POAPS_XDAI_SCHEMA,
};
use serde_json::{json, Value};
use sync_core::{StreamDescriptor, StreamSchema};

/// Catalog entries for every stream of the tap.
pub fn catalog() -> Value {
    let streams: Vec<Value> = [
        (&POAPS_XDAI, &POAPS_XDAI_SCHEMA),
        (&POAPS_METADATA, &POAPS_METADATA_SCHEMA),
    ]
    .into_iter()
    .map(|(descriptor, schema)| catalog_entry(descriptor, schema))
    .collect();

    json!({ "streams": streams })
}

fn catalog_entry(descriptor: &StreamDescriptor, schema: &StreamSchema) -> Value {
    json!({
        "tap_stream_id": descriptor.name,
        "stream": descriptor.name,
        "key_properties": descriptor.key_properties,
        "replication_key": descriptor.replication_key,
        "replication_method": descriptor.replication_method.as_str(),
        "is_sorted": descriptor.is_sorted,
        "schema": schema.to_json_schema(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_both_streams() {
        let catalog = catalog();
        let streams = catalog["streams"].as_array().unwrap();
        assert_eq!(streams.len(), 2);

        assert_eq!(streams[0]["stream"], "poaps_xdai");
        assert_eq!(streams[0]["replication_key"], "created");
        assert_eq!(streams[0]["key_properties"], json!(["id"]));
        assert_eq!(streams[0]["is_sorted"], true);

        assert_eq!(streams[1]["stream"], "poaps_metadata");
        assert_eq!(streams[1]["replication_key"], "start_date");
        assert_eq!(
            streams[1]["schema"]["properties"]["start_date"]["format"],
            "date"
        );
    }
}
