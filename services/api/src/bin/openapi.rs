//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI specification to stdout, for CI artifacts and client
//! generation.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(spec) => println!("{spec}"),
        Err(err) => {
            eprintln!("Failed to render the OpenAPI spec: {err}");
            std::process::exit(1);
        }
    }
}
