//! Integration tests for the Graph `$batch` helpers using wiremock.
//!
//! Verifies the chunking contract (20 sub-requests per call) and that
//! failed sub-responses are dropped rather than failing the whole run.

use intune_backup::auth::TokenProvider;
use intune_backup::batch::{batch_assignment, batch_request};
use intune_backup::client::GraphClient;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_client(server: &MockServer) -> GraphClient {
    let tp = TokenProvider::with_token("mock-token");
    GraphClient::with_base_url(tp, &format!("{}/", server.uri()))
}

#[tokio::test]
async fn batch_request_chunks_at_twenty_ids() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    // 25 IDs must produce exactly two $batch calls: 20 + 5.
    Mock::given(method("POST"))
        .and(path("$batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responses": [{"id": "x", "status": 200, "body": {"ok": true}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let ids: Vec<String> = (0..25).map(|i| format!("id-{i}")).collect();
    let bodies = batch_request(&client, &ids, "deviceManagement/deviceManagementScripts/", "")
        .await
        .unwrap();

    // One 2xx sub-response per call.
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["ok"], true);
}

#[tokio::test]
async fn batch_request_drops_failed_sub_responses() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path("$batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responses": [
                {"id": "a", "status": 200, "body": {"displayName": "kept"}},
                {"id": "b", "status": 404, "body": {"error": {"code": "NotFound"}}},
                {"id": "c", "status": 503}
            ]
        })))
        .mount(&server)
        .await;

    let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let bodies = batch_request(&client, &ids, "deviceManagement/deviceManagementScripts/", "")
        .await
        .unwrap();

    assert_eq!(bodies.len(), 1, "only the 200 body should survive");
    assert_eq!(bodies[0]["displayName"], "kept");
}

#[tokio::test]
async fn batch_assignment_requests_the_assignments_sub_resource() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    // The matcher pins the exact sub-request URL, including the
    // /assignments suffix and the GET method.
    Mock::given(method("POST"))
        .and(path("$batch"))
        .and(body_partial_json(serde_json::json!({
            "requests": [{
                "id": "obj-1",
                "method": "GET",
                "url": "/deviceManagement/deviceHealthScripts/obj-1/assignments"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "responses": [{
                "id": "obj-1",
                "status": 200,
                "body": {"value": [{"id": "obj-1_g", "target": {"groupId": "g"}}]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["obj-1".to_string()];
    let bodies = batch_assignment(&client, &ids, "deviceManagement/deviceHealthScripts/")
        .await
        .unwrap();

    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["value"][0]["target"]["groupId"], "g");
}

#[tokio::test]
async fn batch_request_with_no_ids_makes_no_calls() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    // No mock mounted: a stray $batch POST would 404 and error out.
    let bodies = batch_request(&client, &[], "deviceManagement/deviceManagementScripts/", "")
        .await
        .unwrap();
    assert!(bodies.is_empty());
}
