//! Writes the relay's OpenAPI document. Takes an optional output path; `-`
//! prints to stdout. Defaults to `specs/geoshare-server.json` at the workspace
//! root.

use std::path::PathBuf;

use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let doc = geoshare_server::routes::ApiDoc::openapi().to_pretty_json()?;

    let out = match std::env::args().nth(1) {
        Some(arg) if arg == "-" => {
            println!("{doc}");
            return Ok(());
        }
        Some(arg) => PathBuf::from(arg),
        None => PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../specs/geoshare-server.json"),
    };

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out, doc)?;
    eprintln!("wrote {}", out.display());
    Ok(())
}
