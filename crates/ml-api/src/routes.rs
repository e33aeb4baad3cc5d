//! API routes

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::extractors::AppState;
use crate::handlers::{assets, media, translations};

/// Create the complete API router
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/media", media_router())
        .route("/attachments", delete(media::delete_attachments))
        .route("/attachments/:id", patch(media::update_properties))
        .route("/assets", get(assets::serve_asset))
        .route("/translations", get(translations::list_translations))
        .route("/translations/refresh", post(translations::refresh_translations))
}

fn media_router() -> Router<AppState> {
    Router::new()
        .route(
            "/:record_type/:record_id/:field",
            get(media::list_slot)
                .post(media::attach)
                .put(media::reorder_slot),
        )
        .route(
            "/:record_type/:record_id/:field/:id",
            get(media::get_attachment).post(media::replace_attachment),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use ml_core::i18n::Translations;
    use ml_media::{
        AssetServer, MediaService, MemoryAttachmentRegistry, MemoryStorage, StaticSchema, Storage,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "medialib-test-boundary";

    struct TestApp {
        router: Router,
        _assets: tempfile::TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let assets = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(assets.path().join("public/js")).unwrap();
            std::fs::write(assets.path().join("public/js/app.js"), "let x = 1;").unwrap();
            std::fs::write(assets.path().join("secret.txt"), "hidden").unwrap();

            let media = MediaService::new(
                Arc::new(MemoryAttachmentRegistry::new()),
                Arc::new(MemoryStorage::new()) as Arc<dyn Storage>,
                Arc::new(StaticSchema::default().declare("posts", "gallery", ["caption"])),
            );
            let translations = Translations::from_map(HashMap::from([(
                "media.images_sorted".to_string(),
                "Bilder sortiert".to_string(),
            )]));
            let state = AppState::new(
                media,
                AssetServer::new(assets.path().join("public")),
                translations,
            );

            Self {
                router: router().with_state(state),
                _assets: assets,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn upload(
            &self,
            uri: &str,
            file_name: &str,
            data: &str,
            fields: &[(&str, &str)],
        ) -> (StatusCode, Value) {
            self.send(multipart_request(uri, file_name, data, fields)).await
        }

        async fn slot_ids(&self, uri: &str) -> Vec<i64> {
            let (_, body) = self.send(get_request(uri)).await;
            body["elements"]
                .as_array()
                .unwrap()
                .iter()
                .map(|e| e["id"].as_i64().unwrap())
                .collect()
        }
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(
        uri: &str,
        file_name: &str,
        data: &str,
        fields: &[(&str, &str)],
    ) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n{}\r\n--{}--\r\n",
            BOUNDARY, file_name, data, BOUNDARY
        ));

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    const GALLERY: &str = "/media/posts/1/gallery";

    #[tokio::test]
    async fn test_gallery_lifecycle() {
        let app = TestApp::new();

        let (status, a) = app
            .upload(GALLERY, "a.txt", "alpha", &[("title", "x")])
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(a["success"], true);
        assert_eq!(a["status"], 201);
        assert_eq!(a["data"]["custom_properties"]["title"], "x");
        let a = a["data"]["id"].as_i64().unwrap();

        let (_, b) = app.upload(GALLERY, "b.txt", "bravo", &[]).await;
        let b = b["data"]["id"].as_i64().unwrap();
        let (_, c) = app.upload(GALLERY, "c.txt", "charlie", &[]).await;
        let c = c["data"]["id"].as_i64().unwrap();
        assert_eq!(app.slot_ids(GALLERY).await, vec![a, b, c]);

        // Annotate then replace B
        let (status, _) = app
            .send(json_request(
                "PATCH",
                &format!("/attachments/{}", b),
                json!({"title": "Bee", "caption": "kept", "stray": "dropped"}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, replaced) = app
            .upload(&format!("{}/{}", GALLERY, b), "b2.txt", "bravo two", &[])
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replaced["message"], "Images updated");
        let b2 = replaced["data"]["attachment"]["id"].as_i64().unwrap();
        assert_eq!(replaced["data"]["attachment"]["custom_properties"]["title"], "Bee");
        assert_eq!(replaced["data"]["attachment"]["custom_properties"]["caption"], "kept");
        assert!(replaced["data"]["attachment"]["custom_properties"]["stray"].is_null());
        assert_eq!(replaced["data"]["summary"]["file_name"], "b2.txt");
        assert_eq!(app.slot_ids(GALLERY).await, vec![a, b2, c]);

        let (status, _) = app.send(get_request(&format!("{}/{}", GALLERY, b))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Reorder
        let (status, sorted) = app
            .send(json_request("PUT", GALLERY, json!({"ids": [c, a, b2]})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sorted["message"], "Bilder sortiert");
        assert_eq!(app.slot_ids(GALLERY).await, vec![c, a, b2]);

        // Delete
        let (status, removed) = app
            .send(json_request("DELETE", "/attachments", json!({"ids": [a, c, 999]})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["data"]["removed"], json!([a, c]));
        assert_eq!(removed["data"]["skipped"], json!([999]));
        assert_eq!(app.slot_ids(GALLERY).await, vec![b2]);
    }

    #[tokio::test]
    async fn test_detail_lists_declared_fields() {
        let app = TestApp::new();
        let (_, created) = app.upload(GALLERY, "a.txt", "alpha", &[]).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let (status, detail) = app.send(get_request(&format!("{}/{}", GALLERY, id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["extra_fields"], json!(["caption"]));
        assert_eq!(detail["attachment"]["file_name"], "a.txt");
    }

    #[tokio::test]
    async fn test_invalid_order_is_unprocessable() {
        let app = TestApp::new();
        let (_, created) = app.upload(GALLERY, "a.txt", "alpha", &[]).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let (status, body) = app
            .send(json_request("PUT", GALLERY, json!({"ids": [id, id]})))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid_order");
        assert_eq!(app.slot_ids(GALLERY).await, vec![id]);
    }

    #[tokio::test]
    async fn test_bad_position_is_rejected() {
        let app = TestApp::new();

        let (status, body) = app
            .upload(GALLERY, "a.txt", "alpha", &[("position", "first")])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(app.slot_ids(GALLERY).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_attachment_is_not_found() {
        let app = TestApp::new();

        let (status, body) = app
            .send(json_request("PATCH", "/attachments/41", json!({"title": "t"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_asset_is_served_with_cache_headers() {
        let app = TestApp::new();

        let response = app
            .router
            .clone()
            .oneshot(get_request("/assets?path=js%2Fapp.js"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/javascript");
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "public, max-age=31536000, s-maxage=31536000, immutable"
        );
        assert!(headers.contains_key(header::EXPIRES));
    }

    #[tokio::test]
    async fn test_asset_traversal_is_an_empty_not_found() {
        let app = TestApp::new();

        for uri in [
            "/assets?path=..%2Fsecret.txt",
            "/assets?path=..%252Fsecret.txt",
            "/assets?path=missing.js",
            "/assets",
        ] {
            let (status, body) = app.send(get_request(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert!(body.is_null(), "{} must have an empty body", uri);
        }
    }

    #[tokio::test]
    async fn test_translations_endpoint() {
        let app = TestApp::new();

        let (status, body) = app.send(get_request("/translations")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["media.images_sorted"], "Bilder sortiert");

        let request = Request::builder()
            .method("POST")
            .uri("/translations/refresh")
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], 1);
    }
}
