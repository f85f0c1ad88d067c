//! csvdash CLI: terminal dashboard for the CSV to Parquet conversion service.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use csvdash::gateway::DEFAULT_API_URL;
use csvdash::responses::{PreviewTable, Row};
use csvdash::{
    BatchReport, CsvdashError, DashboardClient, DashboardConfig, DataFormat, DataQuery,
    DownloadQuery, ErrorKind, FileId, ThemeMode, UploadFile, UploadOutcome,
};

#[derive(Parser)]
#[command(
    name = "csvdash",
    about = "📊 csvdash: upload CSV files, follow their conversion, explore the results",
    version,
    author
)]
struct Cli {
    /// Backend root URL
    #[arg(long, global = true, env = "CSVDASH_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Where the session token and theme are stored
    #[arg(long, global = true, env = "CSVDASH_SESSION_FILE")]
    session_file: Option<PathBuf>,
    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "CSVDASH_TIMEOUT_SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long, short)]
        username: String,
        #[arg(long, short, env = "CSVDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session token
    Logout,
    /// Show the backend URL and session state
    Status,
    /// Upload CSV files and wait for their conversion
    Upload {
        /// CSV files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Return right after the backend accepts the files
        #[arg(long)]
        no_wait: bool,
    },
    /// List uploaded files
    Files,
    /// Show metadata for one file
    Show { id: u64 },
    /// Delete a file and its converted artifact
    Delete {
        id: u64,
        /// Actually delete (default: show what would be deleted)
        #[arg(long, short)]
        yes: bool,
    },
    /// Print rows from a file
    Data {
        id: u64,
        #[arg(long, short, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Read from the raw CSV or the converted Parquet
        #[arg(long, short, default_value = "parquet")]
        format: DataFormat,
        /// Only show rows where some value contains this text (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,
        /// Sort the page by this column
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending instead of ascending
        #[arg(long, requires = "sort")]
        desc: bool,
        /// Print the raw JSON page instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Column statistics and data quality for a file
    Stats { id: u64 },
    /// Side-by-side sample of the raw and converted data
    Preview {
        id: u64,
        #[arg(long, short, default_value_t = 5)]
        rows: u32,
    },
    /// Get a signed download link
    Download {
        id: u64,
        #[arg(long, short, default_value = "parquet")]
        format: DataFormat,
        #[arg(long, default_value_t = 24)]
        expiration_hours: u32,
    },
    /// Aggregate analytics across all files
    Dashboard {
        #[command(subcommand)]
        view: Option<DashboardView>,
    },
    /// Show or change the light/dark preference
    Theme {
        /// light or dark (default: toggle)
        mode: Option<ThemeMode>,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum DashboardView {
    /// File counts, storage savings and recent uploads
    Overview,
    /// Per-day upload activity
    Activity {
        #[arg(long, short, default_value_t = 30)]
        days: u32,
    },
    /// Completeness and quality scores
    Quality,
    /// Backend directories and limits
    System,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let api_url = cli.api_url.clone();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            if let Some(hint) = hint(&err, &api_url) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = DashboardConfig::new(cli.api_url);
    if let Some(path) = cli.session_file {
        config = config.with_session_path(path);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    debug!(api_url = %config.api_url, session = %config.session_path.display(), "Configuration");

    let client = DashboardClient::from_config(&config)?;

    match cli.command {
        Commands::Login { username, password } => cmd_login(&client, &username, &password).await,
        Commands::Logout => cmd_logout(&client),
        Commands::Status => cmd_status(&client, &config),
        Commands::Upload { paths, no_wait } => cmd_upload(&client, paths, !no_wait).await,
        Commands::Files => cmd_files(&client).await,
        Commands::Show { id } => cmd_show(&client, id).await,
        Commands::Delete { id, yes } => cmd_delete(&client, id, yes).await,
        Commands::Data {
            id,
            limit,
            offset,
            format,
            search,
            sort,
            desc,
            json,
        } => {
            let query = DataQuery {
                limit,
                offset,
                format,
            };
            let view = PageView { search, sort, desc };
            cmd_data(&client, id, query, view, json).await
        }
        Commands::Stats { id } => cmd_stats(&client, id).await,
        Commands::Preview { id, rows } => cmd_preview(&client, id, rows).await,
        Commands::Download {
            id,
            format,
            expiration_hours,
        } => {
            let query = DownloadQuery {
                format,
                expiration_hours,
            };
            cmd_download(&client, id, query).await
        }
        Commands::Dashboard { view } => {
            cmd_dashboard(&client, view.unwrap_or(DashboardView::Overview)).await
        }
        Commands::Theme { mode } => cmd_theme(&client, mode),
    }
}

// ─── Command implementations ──────────────────────────────────────────────────

async fn cmd_login(client: &DashboardClient, username: &str, password: &str) -> Result<()> {
    let response = client.login(username, password).await?;
    println!(
        "✓ {}",
        response.message.as_deref().unwrap_or("Logged in")
    );
    Ok(())
}

fn cmd_logout(client: &DashboardClient) -> Result<()> {
    client.logout()?;
    println!("✓ Logged out");
    Ok(())
}

fn cmd_status(client: &DashboardClient, config: &DashboardConfig) -> Result<()> {
    let store = client.store();
    println!("API:      {}", config.api_url);
    println!("Session:  {}", config.session_path.display());
    println!(
        "Status:   {}",
        if store.is_authenticated() {
            "logged in"
        } else {
            "not logged in"
        }
    );
    println!("Theme:    {}", store.theme());
    Ok(())
}

async fn cmd_upload(client: &DashboardClient, paths: Vec<PathBuf>, wait: bool) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in &paths {
        match UploadFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(err) => unreadable.push((path.display().to_string(), err)),
        }
    }

    let submitted = files.len() + unreadable.len();
    let report = client.uploader().upload_batch(files).await;
    let pending = report.pending();
    let report = if wait && pending > 0 {
        wait_for_conversion(client, report).await
    } else {
        report
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["File", "ID", "Status", "Rows", "Detail"]);

    let mut not_uploaded = unreadable.len();
    for (path, err) in &unreadable {
        table.add_row([path.as_str(), "-", "unreadable", "-", &err.message()]);
    }
    for outcome in &report.outcomes {
        match outcome {
            UploadOutcome::Rejected { filename, reason } => {
                not_uploaded += 1;
                table.add_row([filename.as_str(), "-", "rejected", "-", reason.as_str()]);
            }
            UploadOutcome::Failed { filename, error } => {
                not_uploaded += 1;
                table.add_row([filename.as_str(), "-", "failed", "-", &error.message()]);
            }
            UploadOutcome::Accepted {
                id,
                filename,
                status,
                ..
            } => {
                let rows = client
                    .store()
                    .file(id)
                    .map(|f| f.rows_display())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row([filename.as_str(), &id.to_string(), &status.to_string(), &rows, ""]);
            }
        }
    }
    println!("{}", table);

    if !wait && pending > 0 {
        println!(
            "{} file(s) still processing. Check progress with `csvdash files`.",
            pending
        );
    }
    if not_uploaded > 0 {
        anyhow::bail!("{} of {} file(s) were not uploaded", not_uploaded, submitted);
    }
    Ok(())
}

/// Await every pending resolution, showing how many have reached a terminal state.
async fn wait_for_conversion(client: &DashboardClient, report: BatchReport) -> BatchReport {
    let pending: HashSet<FileId> = report
        .outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            UploadOutcome::Accepted {
                id,
                resolution: Some(_),
                ..
            } => Some(id.clone()),
            _ => None,
        })
        .collect();
    let total = pending.len();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Converting 0/{} file(s)", total));

    let mut updates = client.store().subscribe();
    let resolved = report.wait();
    tokio::pin!(resolved);

    let report = loop {
        tokio::select! {
            report = &mut resolved => break report,
            changed = updates.changed() => {
                if changed.is_err() {
                    break (&mut resolved).await;
                }
                let done = updates
                    .borrow_and_update()
                    .files
                    .records()
                    .iter()
                    .filter(|f| pending.contains(&f.id) && f.status.is_terminal())
                    .count();
                spinner.set_message(format!("Converting {}/{} file(s)", done, total));
            }
        }
    };

    spinner.finish_and_clear();
    report
}

async fn cmd_files(client: &DashboardClient) -> Result<()> {
    let count = client.refresh_files().await?;
    if count == 0 {
        println!("No files uploaded yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["ID", "File", "Status", "Rows", "Uploaded"]);
    for file in client.store().files() {
        table.add_row([
            file.id.to_string(),
            file.filename.clone(),
            file.status.to_string(),
            file.rows_display(),
            file.upload_timestamp.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{} file(s)", count);
    println!("{}", table);
    Ok(())
}

async fn cmd_show(client: &DashboardClient, id: u64) -> Result<()> {
    let file = client.file_details(&FileId::Remote(id)).await?;
    println!("File:     {}", file.filename);
    println!("ID:       {}", file.id);
    println!("Status:   {}", file.status);
    println!("Rows:     {}", file.rows_display());
    println!(
        "Uploaded: {}",
        file.upload_timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "Parquet:  {}",
        file.storage_path.as_deref().unwrap_or("not yet available")
    );
    Ok(())
}

async fn cmd_delete(client: &DashboardClient, id: u64, yes: bool) -> Result<()> {
    let id = FileId::Remote(id);
    let file = client.file_details(&id).await?;

    if !yes {
        println!(
            "Will delete '{}' (id {}, {}) and its converted artifact.",
            file.filename, file.id, file.status
        );
        println!("\nDry run. Use --yes to actually delete.");
        return Ok(());
    }

    client.delete_file(&id).await?;
    println!("✓ Deleted {}", file.filename);
    Ok(())
}

/// Client-side search and sort applied to one fetched page.
struct PageView {
    search: Option<String>,
    sort: Option<String>,
    desc: bool,
}

async fn cmd_data(
    client: &DashboardClient,
    id: u64,
    query: DataQuery,
    view: PageView,
    json: bool,
) -> Result<()> {
    let mut page = client.file_data(&FileId::Remote(id), query).await?;
    if let Some(column) = &view.sort {
        if !page.columns.contains(column) {
            anyhow::bail!(
                "Unknown column '{}'. Columns: {}",
                column,
                page.columns.join(", ")
            );
        }
        sort_rows(&mut page.data, column, view.desc);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.returned_rows == 0 {
        println!("{} ({}): no rows at offset {}", page.filename, page.format, page.offset);
        return Ok(());
    }
    println!(
        "{} ({}): rows {}-{} of {}",
        page.filename,
        page.format,
        page.offset + 1,
        page.offset + page.returned_rows,
        page.total_rows
    );

    match &view.search {
        Some(term) => {
            let matches = filter_rows(&page.data, term);
            println!("{}", rows_table(&page.columns, &matches));
            println!("Filtered: {} of {} rows match '{}'", matches.len(), page.data.len(), term);
        }
        None => println!("{}", rows_table(&page.columns, &page.data)),
    }
    Ok(())
}

async fn cmd_stats(client: &DashboardClient, id: u64) -> Result<()> {
    let stats = client.file_statistics(&FileId::Remote(id)).await?;
    let info = &stats.file_info;
    println!("File:     {} (id {})", info.filename, info.id);
    println!("Status:   {}", info.status);
    println!("Shape:    {} rows × {} columns", info.total_rows, info.total_columns);
    println!();

    if !stats.columns.is_empty() {
        println!("── Columns ─────────────────────────────");
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["Column", "Type", "Missing", "Unique", "Min", "Max", "Mean"]);
        for column in &stats.columns {
            table.add_row([
                column.name.clone(),
                column.data_type.clone(),
                format!("{} ({:.1}%)", column.missing_count, column.missing_percentage),
                column.unique_count.to_string(),
                format_number(column.min_value),
                format_number(column.max_value),
                format_number(column.mean_value),
            ]);
        }
        println!("{}", table);
    }

    match &stats.data_quality {
        Some(quality) => {
            println!("── Data quality ────────────────────────");
            println!(
                "  Missing values: {} ({:.1}%)",
                quality.total_missing_values, quality.missing_percentage
            );
            println!("  Duplicate rows: {}", quality.duplicate_rows);
            println!("  Unique rows:    {}", quality.unique_rows);
        }
        None => println!("Data quality: not yet available"),
    }

    match &stats.file_sizes {
        Some(sizes) => {
            println!("── Storage ─────────────────────────────");
            println!("  CSV:     {}", format_bytes(sizes.csv_size_bytes));
            println!("  Parquet: {}", format_bytes(sizes.parquet_size_bytes));
            println!(
                "  Ratio:   {:.2}x ({:.1}% saved)",
                sizes.compression_ratio, sizes.space_saved_percentage
            );
        }
        None => println!("Storage: not yet available"),
    }
    Ok(())
}

async fn cmd_preview(client: &DashboardClient, id: u64, rows: u32) -> Result<()> {
    let preview = client.file_preview(&FileId::Remote(id), rows).await?;
    println!("{} ({})", preview.filename, preview.status);
    println!();
    print_preview("CSV", Some(&preview.csv_preview));
    print_preview("Parquet", preview.parquet_preview.as_ref());
    Ok(())
}

fn print_preview(label: &str, table: Option<&PreviewTable>) {
    match table {
        Some(t) => {
            println!("── {} ({} rows) ───────────────────────", label, t.rows_returned);
            println!("{}", rows_table(&t.columns, &t.data));
        }
        None => println!("── {}: not yet available", label),
    }
}

async fn cmd_download(client: &DashboardClient, id: u64, query: DownloadQuery) -> Result<()> {
    let link = client.download_link(&FileId::Remote(id), query).await?;
    println!("{}", link.download_url);
    if let Some(expires) = &link.expires_at {
        eprintln!("Expires: {}", expires);
    }
    Ok(())
}

async fn cmd_dashboard(client: &DashboardClient, view: DashboardView) -> Result<()> {
    match view {
        DashboardView::Overview => {
            let overview = client.overview().await?;
            let counts = &overview.overview;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["Total", "Done", "Processing", "Error", "Success", "Rows"]);
            table.add_row([
                counts.total_files.to_string(),
                counts.processed_files.to_string(),
                counts.processing_files.to_string(),
                counts.error_files.to_string(),
                format!("{:.1}%", counts.success_rate_percentage),
                counts.total_rows_processed.to_string(),
            ]);
            println!("{}", table);

            let storage = &overview.storage;
            println!(
                "Storage: {} CSV → {} Parquet ({:.1}% saved, {:.2}x)",
                format_bytes(storage.total_csv_size_bytes),
                format_bytes(storage.total_parquet_size_bytes),
                storage.space_saved_percentage,
                storage.compression_ratio
            );

            if let Some(recent) = &overview.recent_activity {
                println!(
                    "This week: {} file(s), {} row(s)",
                    recent.files_this_week, recent.rows_this_week
                );
                if !recent.latest_uploads.is_empty() {
                    let mut table = Table::new();
                    table.load_preset(UTF8_FULL);
                    table.set_header(["Latest uploads", "Status", "Rows", "Uploaded"]);
                    for upload in &recent.latest_uploads {
                        table.add_row([
                            upload.filename.clone(),
                            upload.status.to_string(),
                            upload.rows.to_string(),
                            upload.upload_time.clone(),
                        ]);
                    }
                    println!("{}", table);
                }
            }
        }
        DashboardView::Activity { days } => {
            let activity = client.activity(days).await?;
            println!(
                "Activity {} → {} ({} days)",
                activity.start_date, activity.end_date, activity.period_days
            );
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["Date", "Uploaded", "Processed", "Failed", "Rows", "Size (MB)"]);
            for day in &activity.daily_activity {
                table.add_row([
                    day.date.clone(),
                    day.files_uploaded.to_string(),
                    day.files_processed.to_string(),
                    day.files_failed.to_string(),
                    day.total_rows.to_string(),
                    format!("{:.2}", day.total_size_mb),
                ]);
            }
            println!("{}", table);
            let summary = &activity.summary;
            println!(
                "Total: {} file(s), {} processed, {} rows, {:.2} MB",
                summary.total_files, summary.total_processed, summary.total_rows, summary.total_size_mb
            );
        }
        DashboardView::Quality => {
            let quality = client.data_quality().await?;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["File", "Completeness", "Missing", "Duplicates"]);
            for entry in &quality.data_completeness {
                table.add_row([
                    entry.filename.clone(),
                    format!("{:.1}%", entry.completeness_percentage),
                    format!("{}/{}", entry.missing_values, entry.total_cells),
                    entry.duplicate_rows.to_string(),
                ]);
            }
            println!("{}", table);
            let overall = &quality.overall;
            println!(
                "{} file(s) analyzed: {:.1}% complete on average, quality score {:.1}",
                quality.total_files_analyzed, overall.average_completeness, overall.average_quality_score
            );
            println!(
                "High quality: {}, with issues: {}",
                overall.files_with_high_quality, overall.files_with_issues
            );
        }
        DashboardView::System => {
            let stats = client.system_stats().await?;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["Directory", "Exists", "Files", "Size"]);
            for (name, dir) in [
                ("uploads", &stats.directories.uploads),
                ("parquet", &stats.directories.parquet),
            ] {
                table.add_row([
                    name.to_string(),
                    if dir.exists { "✓" } else { "✗" }.to_string(),
                    dir.file_count.to_string(),
                    format_bytes(dir.total_size_bytes),
                ]);
            }
            println!("{}", table);
            println!(
                "Database: {} file(s), {} rows processed",
                stats.database.total_files, stats.database.total_rows_processed
            );
            if let Some(limits) = &stats.processing {
                println!(
                    "Limits:   {:.0} MB max, {}s timeout",
                    limits.max_file_size_mb, limits.processing_timeout_seconds
                );
            }
            if let Some(api) = &stats.api_info {
                println!("API:      v{}", api.version);
            }
        }
    }
    Ok(())
}

fn cmd_theme(client: &DashboardClient, mode: Option<ThemeMode>) -> Result<()> {
    let store = client.store();
    let theme = match mode {
        Some(mode) => {
            store.set_theme(mode)?;
            mode
        }
        None => store.toggle_theme()?,
    };
    println!("Theme: {}", theme);
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

/// Core errors already embed their cause in the message, so only the
/// outermost error is printed.
fn render_error(err: &anyhow::Error) -> String {
    format!("Error: {}", err)
}

fn hint(err: &anyhow::Error, api_url: &str) -> Option<String> {
    let err = err.downcast_ref::<CsvdashError>()?;
    match err.kind() {
        ErrorKind::Authentication => Some("run `csvdash login` to start a new session".to_string()),
        ErrorKind::Network => Some(format!(
            "is the backend running at {}? Set --api-url or CSVDASH_API_URL",
            api_url
        )),
        _ => None,
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn rows_table(columns: &[String], rows: &[Row]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(columns);
    for row in rows {
        table.add_row(columns.iter().map(|c| cell(row.get(c))));
    }
    table
}

/// Rows where any value's text contains `term`, ignoring case.
fn filter_rows(rows: &[Row], term: &str) -> Vec<Row> {
    let term = term.to_lowercase();
    rows.iter()
        .filter(|row| {
            row.values()
                .any(|value| cell(Some(value)).to_lowercase().contains(&term))
        })
        .cloned()
        .collect()
}

/// Stable sort by one column. Numbers compare numerically, missing values go last.
fn sort_rows(rows: &mut [Row], column: &str, desc: bool) {
    rows.sort_by(|a, b| {
        match (present(a.get(column)), present(b.get(column))) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let order = compare_values(x, y);
                if desc {
                    order.reverse()
                } else {
                    order
                }
            }
        }
    });
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => cell(Some(a)).cmp(&cell(Some(b))),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn format_number(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
