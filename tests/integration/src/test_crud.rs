//! Object lifecycle over HTTP.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use crate::start_server;

    #[tokio::test]
    async fn test_should_create_read_update_delete_object() {
        let server = start_server().await;

        let response = server
            .post_json("/api/v1/events/", &json!({"userId": "ann lee", "ts": 42, "title": "a"}))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()["location"],
            "/api/v1/events/ann%20lee/42/"
        );

        let (status, object) = server.get_json("/api/v1/events/ann%20lee/42/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            object,
            json!({
                "userId": "ann lee",
                "ts": 42,
                "category": null,
                "title": "a",
                "done": false,
                "user": "/api/v1/users/ann%20lee/",
                "resource_uri": "/api/v1/events/ann%20lee/42/"
            })
        );

        let response = server
            .client()
            .put(server.url("/api/v1/events/ann%20lee/42/"))
            .json(&json!({"userId": "someone else", "title": "b", "done": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let (_, object) = server.get_json("/api/v1/events/ann%20lee/42/").await;
        assert_eq!(object["userId"], "ann lee");
        assert_eq!(object["title"], "b");
        assert_eq!(object["done"], true);

        let response = server
            .client()
            .delete(server.url("/api/v1/events/ann%20lee/42/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let (status, body) = server.get_json("/api/v1/events/ann%20lee/42/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFound");
    }

    #[tokio::test]
    async fn test_should_merge_patch_or_create_missing_object() {
        let server = start_server().await;

        let response = server
            .client()
            .patch(server.url("/api/v1/events/bob/7/"))
            .json(&json!({"title": "first"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["location"], "/api/v1/events/bob/7/");

        let response = server
            .client()
            .patch(server.url("/api/v1/events/bob/7/"))
            .json(&json!({"category": "news"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (_, object) = server.get_json("/api/v1/events/bob/7/").await;
        assert_eq!(object["title"], "first");
        assert_eq!(object["category"], "news");
        assert_eq!(object["done"], false);
    }

    #[tokio::test]
    async fn test_should_store_schemaless_attributes() {
        let server = start_server().await;
        let response = server
            .post_json(
                "/api/v1/users/",
                &json!({"id": "ann", "age": 31, "city": "Oslo", "nickname": null}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let (status, object) = server.get_json("/api/v1/users/ann/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            object,
            json!({"id": "ann", "age": 31, "city": "Oslo", "resource_uri": "/api/v1/users/ann/"})
        );
    }

    #[tokio::test]
    async fn test_should_accept_and_ignore_list_delete() {
        let server = start_server().await;
        server
            .post_json("/api/v1/users/", &json!({"id": "ann"}))
            .await;
        let response = server
            .client()
            .delete(server.url("/api/v1/users/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let (status, _) = server.get_json("/api/v1/users/ann/").await;
        assert_eq!(status, StatusCode::OK);
    }
}
