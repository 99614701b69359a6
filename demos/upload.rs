//! This example uploads a single image to an API Gateway endpoint.
//!
//! It loads the configuration from the environment (and a `.env` file in the
//! current directory), then runs an `Uploader` backed by the real `HttpTransport`.
//! Whatever status the endpoint answers with is printed along with its body.
//!
//! To run this example, set `API_ENDPOINT_URI`, `API_ENDPOINT_PATH` and, for
//! signed requests, `API_ENDPOINT_REGION`, `AWS_ACCESS_KEY_ID` and
//! `AWS_SECRET_ACCESS_KEY`. An image must exist at `assets/image.png`.
//!
//! Usage:
//! `cargo run --example upload`

use apigw_upload::{Config, HttpTransport, Uploader};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_dir = env::current_dir()?;

    // Reads `.env` from the base directory if it exists.
    let config = Config::load(&base_dir);
    println!("Signing mode: {}", config.signing_mode());

    let uploader = Uploader::new(config, &base_dir, HttpTransport::new()?);

    let image_path = "assets/image.png";
    println!("Uploading local image: '{}'\n", image_path);

    match uploader.run(image_path, &mut std::io::stdout()).await {
        Ok(response) => {
            println!("\nUpload finished with status {}.", response.status);
        }
        Err(e) => {
            eprintln!("\nError after stage {}: {}", e.stage, e);
        }
    }

    Ok(())
}
