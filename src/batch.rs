//! Graph JSON batching and assignment stitching.
//!
//! Intune backup touches every object in a family, and fetching details and
//! assignments one request at a time is slow and chatty. The Graph `$batch`
//! endpoint accepts up to 20 sub-requests per call, so the shared helpers
//! here pack object IDs into batch payloads and unpack the pooled responses:
//!
//! 1. **POST** `$batch` with `{ "requests": [{id, method, url}, ...] }`.
//! 2. Collect the `body` of every 2xx sub-response, in response order.
//! 3. [`get_object_assignment`] stitches the per-object assignment list
//!    back out of the pooled responses by matching the assignment-ID
//!    prefix (`<objectId>_<groupId>`).
//!
//! Batching stays sequential — one `$batch` call at a time, no concurrency,
//! no caching. The helpers are plain list/dict stitching.

use serde::Serialize;
use serde_json::Value;

use crate::client::GraphClient;
use crate::error::Result;

/// Maximum number of sub-requests the Graph `$batch` endpoint accepts
/// per call.
pub const BATCH_SIZE: usize = 20;

/// A single sub-request inside a `$batch` payload.
///
/// `id` carries the Graph object ID so the sub-response can be correlated
/// back to the object it belongs to. `url` is relative to the Graph
/// version root (leading slash required by the batch contract).
#[derive(Debug, Serialize)]
pub struct BatchStep<'a> {
    pub id: &'a str,
    pub method: &'a str,
    pub url: String,
}

/// Top-level `$batch` request body.
#[derive(Debug, Serialize)]
struct BatchPayload<'a> {
    requests: Vec<BatchStep<'a>>,
}

/// Batch-fetches one sub-resource per object ID and returns the successful
/// response bodies.
///
/// For each ID the sub-request URL is `/{resource}{id}{suffix}` — e.g.
/// resource `deviceManagement/deviceManagementScripts/`, suffix `""` for
/// object details or `"/assignments"` for assignment metadata.
///
/// IDs are split into chunks of [`BATCH_SIZE`]; a short final chunk is
/// still sent. Sub-responses with a non-2xx status are dropped: a 404 on
/// one object (deleted mid-backup) must not fail the whole run, and the
/// caller only ever consumes bodies it can correlate by content.
pub async fn batch_request(
    client: &GraphClient,
    ids: &[String],
    resource: &str,
    suffix: &str,
) -> Result<Vec<Value>> {
    let mut bodies = Vec::new();

    for chunk in ids.chunks(BATCH_SIZE) {
        let requests: Vec<BatchStep> = chunk
            .iter()
            .map(|id| BatchStep {
                id,
                method: "GET",
                url: format!("/{resource}{id}{suffix}"),
            })
            .collect();

        let response: Value = client.post("$batch", &BatchPayload { requests }).await?;

        let Some(responses) = response.get("responses").and_then(Value::as_array) else {
            continue;
        };
        for sub in responses {
            let ok = sub
                .get("status")
                .and_then(Value::as_u64)
                .is_some_and(|s| (200..300).contains(&s));
            if !ok {
                continue;
            }
            if let Some(body) = sub.get("body") {
                bodies.push(body.clone());
            }
        }
    }

    Ok(bodies)
}

/// Batch-fetches the `/assignments` sub-resource for every object in `ids`.
///
/// Returns one `{ "value": [...] }` body per object that still exists.
/// Use [`get_object_assignment`] to pull a single object's assignments
/// back out of the pooled result.
pub async fn batch_assignment(
    client: &GraphClient,
    ids: &[String],
    resource: &str,
) -> Result<Vec<Value>> {
    batch_request(client, ids, resource, "/assignments").await
}

/// Extracts the assignments belonging to one object from pooled batch
/// responses.
///
/// Intune assignment IDs have the shape `<objectId>_<groupId>`, so an
/// assignment belongs to `object_id` when its `id` starts with
/// `"<object_id>_"`. The per-assignment `id` and `sourceId` keys are
/// stripped from the result — they are tenant-specific metadata that
/// would make backups non-portable.
pub fn get_object_assignment(object_id: &str, responses: &[Value]) -> Vec<Value> {
    let prefix = format!("{object_id}_");
    let mut assignments = Vec::new();

    for response in responses {
        let Some(values) = response.get("value").and_then(Value::as_array) else {
            continue;
        };
        for assignment in values {
            let matches = assignment
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| id.starts_with(&prefix));
            if !matches {
                continue;
            }
            let mut cleaned = assignment.clone();
            if let Some(map) = cleaned.as_object_mut() {
                map.remove("id");
                map.remove("sourceId");
            }
            assignments.push(cleaned);
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_step_serializes_to_graph_contract() {
        let step = BatchStep {
            id: "0",
            method: "GET",
            url: "/deviceManagement/deviceManagementScripts/0".to_string(),
        };
        let payload = serde_json::to_value(BatchPayload {
            requests: vec![step],
        })
        .unwrap();
        assert_eq!(payload["requests"][0]["id"], "0");
        assert_eq!(payload["requests"][0]["method"], "GET");
        assert_eq!(
            payload["requests"][0]["url"],
            "/deviceManagement/deviceManagementScripts/0"
        );
    }

    #[test]
    fn batch_size_matches_graph_limit() {
        assert_eq!(BATCH_SIZE, 20);
    }

    #[test]
    fn object_assignment_matches_on_id_prefix() {
        let responses = vec![json!({
            "value": [
                {"id": "script-1_group-a", "target": {"groupId": "group-a"}},
                {"id": "script-2_group-b", "target": {"groupId": "group-b"}}
            ]
        })];

        let assignments = get_object_assignment("script-1", &responses);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0]["target"]["groupId"], "group-a");
    }

    #[test]
    fn object_assignment_strips_metadata_keys() {
        let responses = vec![json!({
            "value": [
                {
                    "id": "script-1_group-a",
                    "sourceId": "script-1",
                    "target": {"groupId": "group-a"}
                }
            ]
        })];

        let assignments = get_object_assignment("script-1", &responses);
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].get("id").is_none(), "id should be stripped");
        assert!(
            assignments[0].get("sourceId").is_none(),
            "sourceId should be stripped"
        );
        assert!(assignments[0].get("target").is_some());
    }

    #[test]
    fn object_assignment_collects_across_responses() {
        // Assignments for one object can land in different batch chunks.
        let responses = vec![
            json!({"value": [{"id": "obj_g1", "target": {"groupId": "g1"}}]}),
            json!({"value": [{"id": "obj_g2", "target": {"groupId": "g2"}}]}),
        ];

        let assignments = get_object_assignment("obj", &responses);
        assert_eq!(assignments.len(), 2);
    }

    #[test]
    fn object_assignment_requires_separator_in_prefix() {
        // "script-10_g" must not match object "script-1": the prefix match
        // includes the underscore separator.
        let responses = vec![json!({
            "value": [{"id": "script-10_g", "target": {"groupId": "g"}}]
        })];

        let assignments = get_object_assignment("script-1", &responses);
        assert!(assignments.is_empty(), "script-10 must not match script-1");
    }

    #[test]
    fn object_assignment_handles_empty_and_malformed_responses() {
        let responses = vec![
            json!({"value": []}),
            json!({"error": {"code": "NotFound"}}),
            json!({"value": [{"target": {"groupId": "no-id-key"}}]}),
        ];

        let assignments = get_object_assignment("obj", &responses);
        assert!(assignments.is_empty());
    }
}
