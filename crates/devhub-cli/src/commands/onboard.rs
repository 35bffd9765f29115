//! Onboard command implementation.
//!
//! Opens the provisioning window: the discovery responder and onboarding
//! listener run until the first device confirms its credentials or the
//! operator interrupts. Every offered device passes through an approval
//! prompt unless `--yes` is given.

use std::io::{self, Write};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use devhub_core::broker::EmqxAdmin;
use devhub_core::discovery::BroadcastResponder;
use devhub_core::onboarding::OnboardingListener;
use devhub_core::registration::Registrar;
use devhub_core::store::FileStore;

use crate::cli::OnboardArgs;
use crate::error::CliError;
use crate::output;

pub async fn run_onboard(
    args: OnboardArgs,
    store: Arc<FileStore>,
    json: bool,
) -> Result<(), CliError> {
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

    let session = CancellationToken::new();
    let responder = BroadcastResponder::bind(args.udp_port, args.tcp_port).await?;
    let listener = OnboardingListener::bind(args.tcp_port).await?;

    let (offer_tx, mut offer_rx) = mpsc::channel(8);

    let responder_token = session.clone();
    let responder_task = tokio::spawn(async move { responder.run(responder_token).await });

    let listener_token = session.clone();
    let listener_task =
        tokio::spawn(async move { listener.run(listener_token, offer_tx).await });

    println!(
        "Provisioning window open (TCP {}, UDP {}). Press Ctrl+C to stop.",
        args.tcp_port, args.udp_port
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping.");
                break;
            }
            offer = offer_rx.recv() => {
                let Some(pending) = offer else { break };
                let name = pending.device_name().to_string();

                if !args.yes && !approve(&name)? {
                    println!("Skipped `{}`.", name);
                    continue;
                }

                match pending.commit(&registrar).await {
                    Ok(credentials) => {
                        if json {
                            output::print_json(&credentials)?;
                        } else {
                            println!(
                                "Device `{}` onboarded: clientId {}, topic {}",
                                name, credentials.client_id, credentials.topic
                            );
                        }
                        // The session token is already cancelled; the window
                        // closes after the first confirmed device.
                        break;
                    }
                    Err(e) => eprintln!("Onboarding of `{}` failed: {}", name, e),
                }
            }
        }
    }

    session.cancel();
    let _ = listener_task.await;
    let _ = responder_task.await;

    Ok(())
}

/// Ask the operator whether to register the named device.
fn approve(name: &str) -> Result<bool, CliError> {
    print!("Register device `{}`? [y/N] ", name);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;

    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
