//! Error responses.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use crate::{seed_events, start_server};

    #[tokio::test]
    async fn test_should_reject_invalid_list_parameters() {
        let server = start_server().await;
        seed_events(&server).await;

        for path in [
            "/api/v1/events/?limit=0",
            "/api/v1/events/?limit=lots",
            "/api/v1/events/?ts__from=5",
            "/api/v1/events/?ts__from=9&ts__to=1",
            "/api/v1/events/?userId__from=1&userId__to=2",
            "/api/v1/events/?ts=soon",
            "/api/v1/events/?format=xml",
            "/api/v1/events/?userId=alice&offset_hash=alice",
            "/api/v1/events/?userId=alice&offset_hash=alice&offset_range=abc",
        ] {
            let (status, body) = server.get_json(path).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}: {body}");
            assert_eq!(body["error"], "ValidationError", "{path}");
            assert!(body["message"].is_string(), "{path}");
        }
    }

    #[tokio::test]
    async fn test_should_reject_invalid_detail_requests() {
        let server = start_server().await;

        let (status, _) = server.get_json("/api/v1/events/alice/noon/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let response = server
            .client()
            .put(server.url("/api/v1/events/alice/1/"))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = server
            .post_json("/api/v1/events/", &json!({"userId": "alice", "ts": "later"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = server
            .post_json("/api/v1/events/", &json!({"userId": "alice"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_should_answer_not_found_and_method_not_allowed() {
        let server = start_server().await;

        let (status, body) = server.get_json("/api/v1/ghosts/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");

        let (status, _) = server.get_json("/api/v1/users/nobody/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let response = server
            .client()
            .put(server.url("/api/v1/users/"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = server
            .client()
            .delete(server.url("/api/v1/events/alice/*/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
