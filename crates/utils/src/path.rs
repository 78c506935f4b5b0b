use std::path::PathBuf;

use color_eyre::Result;

/// Creates the per-user data directory for `app_name` and returns the path to `filename` inside it.
///
/// # Errors
///
/// Returns an error if:
/// - The data directory cannot be determined
/// - The data directory cannot be created
pub async fn create_data_path(app_name: &str, filename: &str) -> Result<PathBuf> {
    let data_file = dirs::data_dir()
        .ok_or_else(|| color_eyre::eyre::eyre!("Failed to get data directory"))?
        .join(app_name)
        .join(filename);
    let data_dir = data_file
        .parent()
        .ok_or_else(|| color_eyre::eyre::eyre!("Invalid data path"))?;

    tokio::fs::create_dir_all(data_dir).await?;
    Ok(data_file)
}
