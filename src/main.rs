use clap::{Parser, Subcommand};
use royalbit_sheetdesk::cli;
use royalbit_sheetdesk::config::{DbArgs, ServeArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetdesk")]
#[command(about = "Upload, edit and download spreadsheets from the browser")]
#[command(long_about = "SheetDesk - Browser editing for CSV and Excel files

Upload a .csv, .xlsx or .xls file, edit a sheet in a grid with dropdowns taken
from the workbook's list validations, save back in place and download.

COMMANDS:
  serve      - Run the web editor
  sheets     - List the sheets of a file
  show       - Print a sheet (rows + dropdowns) as JSON
  dropdowns  - Show list-validation options of a sheet
  check-db   - Test the database connection used for save logging

EXAMPLES:
  sheetdesk serve --port 3000
  sheetdesk serve --mirror rows --database-url sqlite://logs.db?mode=rwc
  sheetdesk show budget.xlsx --sheet Q3
  DB_HOST=db DB_USER=app DB_PASSWORD=… DB_NAME=sheets sheetdesk check-db")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web editor
    Serve(ServeArgs),

    /// List the sheets of a spreadsheet
    Sheets {
        /// Path to a .csv, .xlsx or .xls file
        file: PathBuf,
    },

    /// Print a sheet as JSON
    Show {
        /// Path to a .csv, .xlsx or .xls file
        file: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Show the dropdown options of a sheet
    Dropdowns {
        /// Path to an .xlsx file
        file: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Check the database connection
    CheckDb(DbArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => cli::serve(args),
        Commands::Sheets { file } => Ok(cli::sheets(file)?),
        Commands::Show { file, sheet } => Ok(cli::show(file, sheet)?),
        Commands::Dropdowns { file, sheet } => Ok(cli::dropdowns(file, sheet)?),
        Commands::CheckDb(args) => Ok(cli::check_db(args.to_config())?),
    }
}
