//! HttpDetectionClient against a local stand-in for the detection service

use std::io::Cursor;
use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer};
use dimscope_detect::{DetectionClient, DetectorConfig, HttpDetectionClient, ImagePayload};
use image::{ImageFormat, RgbImage};
use serde_json::json;

fn tiny_jpeg() -> ImagePayload {
    let mut buf = Cursor::new(Vec::new());
    RgbImage::new(8, 8).write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    ImagePayload::from_bytes(buf.into_inner()).unwrap()
}

async fn measure_ok(body: web::Json<serde_json::Value>) -> HttpResponse {
    let image = body.get("image").and_then(|v| v.as_str()).unwrap_or_default();
    if !image.starts_with("data:image/jpeg;base64,") {
        return HttpResponse::BadRequest()
            .json(json!({"success": false, "message": "No image data provided"}));
    }
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Detected 1 objects",
        "measurements": [
            {"objectName": "laptop", "dimensions": "33.0 × 23.0", "confidence": 0.88, "bbox": [12, 40, 300, 260]}
        ],
        "annotatedImage": "data:image/jpeg;base64,AAAA"
    }))
}

async fn measure_error() -> HttpResponse {
    HttpResponse::InternalServerError().body("boom")
}

async fn health_ok() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok", "model_loaded": true}))
}

async fn health_loading() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "loading"}))
}

/// Start a fake service and return its base URL
fn spawn_service(healthy: bool, measure_works: bool) -> String {
    let server = HttpServer::new(move || {
        let app = App::new();
        let app = if healthy {
            app.route("/health", web::get().to(health_ok))
        } else {
            app.route("/health", web::get().to(health_loading))
        };
        if measure_works {
            app.route("/measure", web::post().to(measure_ok))
        } else {
            app.route("/measure", web::post().to(measure_error))
        }
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind test server");

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

fn client_for(base_url: String) -> HttpDetectionClient {
    let config = DetectorConfig::default()
        .with_base_url(base_url)
        .with_health_timeout(Duration::from_secs(2));
    HttpDetectionClient::new(config).unwrap()
}

#[actix_web::test]
async fn test_measure_parses_results() {
    let client = client_for(spawn_service(true, true));

    let response = client.measure(&tiny_jpeg()).await;
    assert!(response.success, "{}", response.message);
    assert_eq!(response.measurements.len(), 1);
    assert_eq!(response.measurements[0].object_name, "laptop");
    assert_eq!(response.measurements[0].confidence_percent(), 88);
    assert_eq!(response.annotated_image.as_deref(), Some("data:image/jpeg;base64,AAAA"));
}

#[actix_web::test]
async fn test_measure_http_error_is_failure_value() {
    let client = client_for(spawn_service(true, false));

    let response = client.measure(&tiny_jpeg()).await;
    assert!(!response.success);
    assert!(response.measurements.is_empty());
    assert_eq!(response.message, "Detection service returned status 500");
}

#[actix_web::test]
async fn test_health_probe() {
    assert!(client_for(spawn_service(true, true)).check_health().await);
    assert!(!client_for(spawn_service(false, true)).check_health().await);
}
