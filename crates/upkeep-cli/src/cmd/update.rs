//! Download and install every available update.

use std::process::ExitCode;

use anyhow::Result;
use upkeep_core::io::download::Downloader;
use upkeep_core::{Updater, encode_result};

use super::{RunOptions, http_client};

/// Runs the update and prints the encoded result: the number of updated
/// applications, or `-1 - updated` if the run was aborted.
pub async fn update(options: &RunOptions) -> Result<ExitCode> {
    let client = http_client()?;
    let plan = options.plan(&client).await?;

    let downloader = Downloader::new(client, options.cache_dir()?);
    let result = Updater::new(downloader).run(&plan, options.timeout).await;

    println!("{}", encode_result(&result));
    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(aborted) => {
            tracing::error!("Update aborted after {} update(s): {}", aborted.updated, aborted.reason);
            Ok(ExitCode::FAILURE)
        }
    }
}
