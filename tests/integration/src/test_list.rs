//! List endpoint filtering and pagination.

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use crate::{category_of, range_values, seed_events, start_server};

    #[tokio::test]
    async fn test_should_page_through_partition_in_order() {
        let server = start_server().await;
        seed_events(&server).await;

        let pages = server
            .collect_pages("/api/v1/events/?userId=alice&limit=5")
            .await;
        let sizes: Vec<usize> = pages.iter().map(|p| range_values(p).len()).collect();
        assert_eq!(sizes, [5, 5, 5, 1]);

        let all: Vec<i64> = pages.iter().flat_map(range_values).collect();
        assert_eq!(all, (100..=250).step_by(10).collect::<Vec<i64>>());

        assert_eq!(pages[0]["meta"]["limit"], 5);
        assert!(pages[0]["meta"]["previous"].is_null());
        assert!(pages[0]["meta"]["total_count"].is_null());
        let next = pages[0]["meta"]["next"].as_str().unwrap();
        assert!(next.contains("offset_hash=alice"), "{next}");
        assert!(next.contains("offset_range=140"), "{next}");
    }

    #[tokio::test]
    async fn test_should_page_in_reverse() {
        let server = start_server().await;
        seed_events(&server).await;

        let pages = server
            .collect_pages("/api/v1/events/?userId=bob&reverse=true&limit=6&ts__from=120&ts__to=200")
            .await;
        let all: Vec<i64> = pages.iter().flat_map(range_values).collect();
        assert_eq!(all, [200, 190, 180, 170, 160, 150, 140, 130, 120]);
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn test_should_hydrate_keys_only_index_rows() {
        let server = start_server().await;
        seed_events(&server).await;

        let (status, page) = server
            .get_json("/api/v1/events/?userId=alice&category=news")
            .await;
        assert_eq!(status, StatusCode::OK);
        let objects = page["objects"].as_array().unwrap();
        assert_eq!(objects.len(), 8);
        for object in objects {
            let ts = object["ts"].as_i64().unwrap();
            assert_eq!(object["category"], "news");
            assert_eq!(object["title"], format!("alice-{ts}"));
            assert_eq!(category_of(ts), "news");
        }
    }

    #[tokio::test]
    async fn test_should_follow_index_cursor_after_its_item_is_deleted() {
        let server = start_server().await;
        seed_events(&server).await;

        let (_, page) = server
            .get_json("/api/v1/events/?userId=alice&category=sports&limit=3")
            .await;
        assert_eq!(range_values(&page), [100, 120, 140]);
        let next = page["meta"]["next"].as_str().unwrap().to_owned();
        assert!(next.contains("offset_index=sports"), "{next}");

        let response = server
            .client()
            .delete(server.url("/api/v1/events/alice/140/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (status, page) = server.get_json(&next).await;
        assert_eq!(status, StatusCode::OK, "{page}");
        assert_eq!(range_values(&page), [160, 180, 200]);
    }

    #[tokio::test]
    async fn test_should_list_partition_from_wildcard_path() {
        let server = start_server().await;
        seed_events(&server).await;

        for path in ["/api/v1/events/alice/*/", "/api/v1/events/alice/"] {
            let (status, page) = server.get_json(path).await;
            assert_eq!(status, StatusCode::OK, "{path}");
            assert_eq!(range_values(&page).len(), 16, "{path}");
            assert!(page["meta"]["next"].is_null());
        }

        let (_, page) = server
            .get_json("/api/v1/events/bob/*/?ts__from=200&ts__to=250")
            .await;
        assert_eq!(range_values(&page), [200, 210, 220, 230, 240, 250]);
    }

    #[tokio::test]
    async fn test_should_scan_across_partitions() {
        let server = start_server().await;
        seed_events(&server).await;

        let pages = server
            .collect_pages("/api/v1/events/?title=bob-1*&limit=4")
            .await;
        let mut all: Vec<i64> = pages.iter().flat_map(range_values).collect();
        all.sort_unstable();
        assert_eq!(all, (100..=190).step_by(10).collect::<Vec<i64>>());

        let pages = server
            .collect_pages("/api/v1/events/?category=sports&done=false")
            .await;
        let total: usize = pages.iter().map(|p| range_values(p).len()).sum();
        assert_eq!(total, 16);
    }
}
