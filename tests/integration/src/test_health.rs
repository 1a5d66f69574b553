//! Health endpoint and common response headers.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::start_server;

    #[tokio::test]
    async fn test_should_report_running_server() {
        let server = start_server().await;
        let response = server
            .client()
            .get(server.url("/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["content-type"], "application/json");
        assert!(headers.contains_key("x-request-id"));

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn test_should_answer_cors_preflight() {
        let server = start_server().await;
        let response = server
            .client()
            .request(reqwest::Method::OPTIONS, server.url("/api/v1/users/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(
            response
                .headers()
                .contains_key("access-control-allow-methods")
        );
    }
}
