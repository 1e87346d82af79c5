//! SheetDesk server binary
//!
//! Same server as `sheetdesk serve`, for deployments that only need HTTP.

use clap::Parser;
use royalbit_sheetdesk::api::run_api_server;
use royalbit_sheetdesk::config::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "sheetdesk-server")]
#[command(version)]
#[command(author = "RoyalBit Inc. <admin@royalbit.ca>")]
#[command(about = "SheetDesk server - browser editing for CSV and Excel files")]
#[command(long_about = r#"
SheetDesk server

Endpoints:
  - GET    /                  - Editor page
  - POST   /upload            - Upload a .csv, .xlsx or .xls file (multipart field "file")
  - GET    /edit              - Rows and dropdowns of a sheet (?filename=&sheet=)
  - POST   /save              - Rewrite a sheet's rows ({"filename","sheet","data"})
  - GET    /download          - Download the file (?filename=&custom_name=)
  - GET    /files             - Registered uploads
  - DELETE /files/:filename   - Forget an upload and delete it
  - GET    /health, /version

Features:
  - Dropdowns from Excel list validations (literal, ranges, other sheets, names)
  - Optional save logging to MySQL or SQLite (--mirror rows|pairs)
  - Optional login gate (SHEETDESK_USER / SHEETDESK_PASSWORD)
  - Graceful shutdown on SIGINT/SIGTERM

Example usage:
  sheetdesk-server                             # Start on localhost:8080
  sheetdesk-server --host 0.0.0.0 --port 3000

  curl -F file=@budget.xlsx http://localhost:8080/upload
"#)]
struct Args {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run_api_server(args.serve.to_config()).await
}
