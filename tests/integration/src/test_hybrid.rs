//! Index query combined with a range filter.

#[cfg(test)]
mod tests {
    use crate::{range_values, seed_events, start_server};

    const HYBRID: &str =
        "/api/v1/events/?userId=alice&category=sports&ts__from=100&ts__to=200&limit=2";

    #[tokio::test]
    async fn test_should_page_hybrid_query_without_gaps() {
        let server = start_server().await;
        seed_events(&server).await;

        let pages = server.collect_pages(HYBRID).await;
        let per_page: Vec<Vec<i64>> = pages.iter().map(range_values).collect();
        assert_eq!(per_page, [vec![100, 120], vec![140, 160], vec![180, 200]]);

        for page in &pages {
            for object in page["objects"].as_array().unwrap() {
                assert_eq!(object["category"], "sports");
                assert!(object["title"].as_str().unwrap().starts_with("alice-"));
            }
        }
    }

    #[tokio::test]
    async fn test_should_plan_hybrid_query_from_detail_path() {
        let server = start_server().await;
        seed_events(&server).await;

        let pages = server
            .collect_pages("/api/v1/events/alice/?ts__from=100&ts__to=200&category=sports&limit=4")
            .await;
        let per_page: Vec<Vec<i64>> = pages.iter().map(range_values).collect();
        assert_eq!(per_page, [vec![100, 120, 140, 160], vec![180, 200]]);

        let next = pages[0]["meta"]["next"].as_str().unwrap();
        assert!(next.starts_with("/api/v1/events/?"), "{next}");
        assert!(next.contains("offset_special=1"), "{next}");
        assert!(next.contains("userId=alice"), "{next}");
    }

    #[tokio::test]
    async fn test_should_carry_resume_bounds_in_next_link() {
        let server = start_server().await;
        seed_events(&server).await;

        let (_, page) = server.get_json(HYBRID).await;
        let next = page["meta"]["next"].as_str().unwrap();
        for expected in [
            "offset_special=1",
            "offset_range=120",
            "ts__from=121",
            "ts__to=200",
            "category=sports",
            "limit=2",
        ] {
            assert!(next.contains(expected), "{expected} missing from {next}");
        }
    }

    #[tokio::test]
    async fn test_should_page_hybrid_query_in_reverse() {
        let server = start_server().await;
        seed_events(&server).await;

        let pages = server
            .collect_pages(&format!("{HYBRID}&reverse=true"))
            .await;
        let all: Vec<i64> = pages.iter().flat_map(range_values).collect();
        assert_eq!(all, [200, 180, 160, 140, 120, 100]);
    }

    #[tokio::test]
    async fn test_should_apply_residual_filters_in_hybrid_query() {
        let server = start_server().await;
        seed_events(&server).await;

        let (_, page) = server
            .get_json("/api/v1/events/?userId=alice&category=sports&ts__from=100&ts__to=250&title=alice-2*")
            .await;
        assert_eq!(range_values(&page), [200, 220, 240]);
        assert!(page["meta"]["next"].is_null());
    }
}
