#![allow(dead_code)]

use std::fs;

use apigw_upload::Config;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use wiremock::MockServer;

pub const ENDPOINT_PATH: &str = "/prod/images";
pub const API_KEY: &str = "key-123";
pub const ACCESS_KEY: &str = "AKIDEXAMPLE";
pub const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

/// The start of a JPEG file: SOI marker followed by a JFIF APP0 segment.
pub const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01\x00\x00\x01\x00\x01\x00\x00\xff\xd9";

/// A fully populated configuration pointing at the mock server.
pub fn signed_config(server: &MockServer) -> Config {
    Config {
        api_key: Some(API_KEY.to_string()),
        endpoint_uri: Some(server.uri()),
        endpoint_path: Some(ENDPOINT_PATH.to_string()),
        region: Some("us-east-1".to_string()),
        access_key_id: Some(ACCESS_KEY.to_string()),
        secret_access_key: Some(SECRET_KEY.to_string()),
        ..Default::default()
    }
}

/// A base directory holding `photo.jpg`.
pub fn base_dir_with_photo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("photo.jpg"), JPEG_BYTES).unwrap();
    dir
}

pub fn signing_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
}
