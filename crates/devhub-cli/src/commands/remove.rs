//! Remove command implementation.
//!
//! Deprovisions a device the same way a failed onboarding does: ACL rules,
//! broker credential, then the stored record.

use std::io::{self, Write};
use std::sync::Arc;

use devhub_core::broker::EmqxAdmin;
use devhub_core::registration::Registrar;
use devhub_core::store::{DeviceStore, FileStore};

use crate::cli::RemoveArgs;
use crate::error::CliError;

pub async fn run_remove(args: RemoveArgs, store: Arc<FileStore>) -> Result<(), CliError> {
    // Fail early on an unknown id.
    let device = store.get(&args.id).await?;

    if !args.force && !confirm(&device.name)? {
        println!("Aborted.");
        return Ok(());
    }

    let admin = Arc::new(EmqxAdmin::new(
        &args.broker.admin_url,
        &args.broker.admin_user,
        &args.broker.admin_password,
    ));
    let registrar = Registrar::new(
        store,
        admin,
        args.broker.broker_host.clone(),
        args.broker.broker_port,
    );

    registrar.rollback(&args.id).await?;

    println!("Removed device {} (`{}`).", args.id, device.name);

    Ok(())
}

fn confirm(name: &str) -> Result<bool, CliError> {
    print!("Remove device `{}` and its broker credential? [y/N] ", name);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;

    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
