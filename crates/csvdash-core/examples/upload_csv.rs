//! Example of using csvdash-core directly from Rust.
//!
//! Usage: cargo run -p csvdash-core --example upload_csv -- <username> <password> <file.csv>...

use std::path::PathBuf;

use csvdash_core::{DashboardClient, DashboardConfig, UploadFile, UploadOutcome};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(username), Some(password)) = (args.next(), args.next()) else {
        return Err("usage: upload_csv <username> <password> <file.csv>...".into());
    };

    // 1. Configuration from CSVDASH_* environment variables
    let config = DashboardConfig::from_env();
    let client = DashboardClient::from_config(&config)?;

    // 2. Start a session (the token is saved to the session file)
    client.login(&username, &password).await?;

    // 3. Read and upload every file concurrently
    let mut files = Vec::new();
    for path in args.map(PathBuf::from) {
        files.push(UploadFile::from_path(&path).await?);
    }
    let report = client.uploader().upload_batch(files).await;
    println!("{} accepted, {} converting", report.accepted(), report.pending());

    // 4. Wait until the backend reports Done or Error for each file
    for outcome in report.wait().await.outcomes {
        match outcome {
            UploadOutcome::Accepted { filename, status, .. } => println!("{filename}: {status}"),
            UploadOutcome::Rejected { filename, reason } => println!("{filename}: {reason}"),
            UploadOutcome::Failed { filename, error } => println!("{filename}: {error}"),
        }
    }

    Ok(())
}
