//! List and show command implementations.

use std::sync::Arc;

use devhub_core::store::{DeviceStore, FileStore};

use crate::cli::ShowArgs;
use crate::error::CliError;
use crate::output;

pub async fn run_list(store: Arc<FileStore>, json: bool) -> Result<(), CliError> {
    let devices = store.list().await?;

    if json {
        output::print_json(&devices)?;
    } else {
        println!("{}", output::format_devices(&devices));
    }

    Ok(())
}

pub async fn run_show(args: ShowArgs, store: Arc<FileStore>, json: bool) -> Result<(), CliError> {
    let device = store.get(&args.id).await?;

    if json {
        output::print_json(&device)?;
    } else {
        println!("{}", output::format_device(&device));
    }

    Ok(())
}
