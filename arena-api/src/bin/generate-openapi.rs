//! OpenAPI Specification Generator Binary
//!
//! Prints the arena OpenAPI specification as JSON to stdout.
//!
//! Usage:
//!   cargo run -p arena-api --bin generate-openapi > openapi.json

use arena_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
