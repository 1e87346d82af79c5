use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::config::ServeArgs;
use crate::db::{DbConfig, LogMirror, MirrorMode, SqlMirror};
use crate::error::{SheetError, SheetResult};
use crate::excel::SheetReader;
use crate::types::FileKind;

/// Start the HTTP server on a fresh tokio runtime
pub fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.to_config();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(crate::api::run_api_server(config))
}

/// List the sheets of a local spreadsheet
pub fn sheets(file: PathBuf) -> SheetResult<()> {
    let reader = open(&file)?;
    let names = reader.sheet_names()?;

    println!("{}", "📊 SheetDesk - Sheets".bold().green());
    println!("   File: {}", file.display());
    println!("   Kind: {}\n", reader.kind().extension().cyan());

    for (index, name) in names.iter().enumerate() {
        println!("   {:>3}. {}", index + 1, name.bright_blue().bold());
    }
    println!();
    println!("   {} sheet(s)", names.len());
    Ok(())
}

/// Print a sheet as the JSON the editor receives
pub fn show(file: PathBuf, sheet: Option<String>) -> SheetResult<()> {
    let reader = open(&file)?;
    let sheet = pick_sheet(&reader, sheet)?;
    let view = reader.read_view(&sheet)?;
    let json = serde_json::to_string_pretty(&view)
        .map_err(|e| SheetError::Internal(format!("cannot encode sheet: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Show the dropdown options a sheet's list validations produce
pub fn dropdowns(file: PathBuf, sheet: Option<String>) -> SheetResult<()> {
    let reader = open(&file)?;
    let sheet = pick_sheet(&reader, sheet)?;
    let view = reader.read_view(&sheet)?;

    println!("{}", "🔽 SheetDesk - Dropdowns".bold().green());
    println!("   File: {}", file.display());
    println!("   Sheet: {}\n", sheet.bright_blue().bold());

    if view.dropdowns.is_empty() {
        println!("{}", "   No list validations found".yellow());
        return Ok(());
    }
    for (key, options) in &view.dropdowns {
        let listed = if options.is_empty() {
            "(unresolved)".dimmed().to_string()
        } else {
            options.join(", ")
        };
        println!("   {} → {}", key.cyan().bold(), listed);
    }
    Ok(())
}

/// Connect to the configured database and run a trivial query
pub fn check_db(config: DbConfig) -> SheetResult<()> {
    println!("{}", "🗄️  SheetDesk - Database check".bold().green());

    let url = config
        .url()
        .ok_or_else(|| SheetError::validation("No database configured (set DATABASE_URL or DB_HOST)"))?;
    println!("   URL: {}", config.redacted_url().unwrap_or_default());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mirror = SqlMirror::connect_lazy(&url, MirrorMode::Off)?;
        mirror.health_check().await
    })?;

    println!("{}", "✅ Database connection successful".bold().green());
    Ok(())
}

fn open(file: &Path) -> SheetResult<SheetReader> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SheetError::validation("Invalid filename"))?;
    let kind = FileKind::from_filename(name)?;
    if !file.is_file() {
        return Err(SheetError::not_found(format!("File not found: {}", file.display())));
    }
    Ok(SheetReader::new(file, kind))
}

fn pick_sheet(reader: &SheetReader, requested: Option<String>) -> SheetResult<String> {
    let names = reader.sheet_names()?;
    match requested {
        Some(name) if names.contains(&name) => Ok(name),
        Some(name) => Err(SheetError::not_found(format!("Sheet '{}' not found", name))),
        None => names
            .into_iter()
            .next()
            .ok_or_else(|| SheetError::not_found("Workbook has no sheets")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello").unwrap();
        assert!(matches!(open(&path), Err(SheetError::Validation(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            open(&dir.path().join("missing.csv")),
            Err(SheetError::NotFound(_))
        ));
    }

    #[test]
    fn test_pick_sheet_for_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "Name,Age\nAda,36\n").unwrap();
        let reader = open(&path).unwrap();

        assert_eq!(pick_sheet(&reader, None).unwrap(), "people");
        assert_eq!(pick_sheet(&reader, Some("people".into())).unwrap(), "people");
        assert!(pick_sheet(&reader, Some("other".into())).is_err());
    }

    #[test]
    fn test_check_db_requires_configuration() {
        assert!(matches!(
            check_db(DbConfig::default()),
            Err(SheetError::Validation(_))
        ));
    }
}
