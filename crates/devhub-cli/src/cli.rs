//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// DevHub - onboard IoT devices onto a local MQTT broker and control them
#[derive(Parser, Debug)]
#[command(name = "devhub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Data directory for device records (default: platform data dir)
    #[arg(long, global = true, env = "DEVHUB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a provisioning window: discovery responder + onboarding listener
    Onboard(OnboardArgs),

    /// List registered devices
    List,

    /// Show a device record
    Show(ShowArgs),

    /// Change field values on a device
    Set(SetArgs),

    /// Remove a device: ACL rules, broker credential, and record
    Remove(RemoveArgs),
}

/// Broker endpoint and admin API access.
#[derive(Args, Debug)]
pub struct BrokerArgs {
    /// MQTT broker host handed to onboarded devices
    #[arg(long, default_value = "localhost", env = "DEVHUB_BROKER_HOST")]
    pub broker_host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883", env = "DEVHUB_BROKER_PORT")]
    pub broker_port: u16,

    /// Base URL of the broker admin API
    #[arg(long, default_value = "http://localhost:18083", env = "DEVHUB_ADMIN_URL")]
    pub admin_url: String,

    /// Admin API user (basic auth)
    #[arg(long, default_value = "admin", env = "DEVHUB_ADMIN_USER")]
    pub admin_user: String,

    /// Admin API password (basic auth)
    #[arg(long, env = "DEVHUB_ADMIN_PASSWORD")]
    pub admin_password: String,
}

/// Operator credentials for the broker command channel.
#[derive(Args, Debug)]
pub struct MqttArgs {
    /// MQTT broker host
    #[arg(long, default_value = "localhost", env = "DEVHUB_BROKER_HOST")]
    pub broker_host: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883", env = "DEVHUB_BROKER_PORT")]
    pub broker_port: u16,

    /// Operator MQTT username
    #[arg(long, default_value = "admin", env = "DEVHUB_MQTT_USER")]
    pub mqtt_user: String,

    /// Operator MQTT password
    #[arg(long, default_value = "admin", env = "DEVHUB_MQTT_PASSWORD")]
    pub mqtt_password: String,
}

#[derive(Args, Debug)]
pub struct OnboardArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,

    /// TCP port for the onboarding listener
    #[arg(long, default_value = "12222")]
    pub tcp_port: u16,

    /// UDP port for the discovery responder
    #[arg(long, default_value = "15555")]
    pub udp_port: u16,

    /// Approve every device without prompting
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Device id
    pub id: String,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub mqtt: MqttArgs,

    /// Device id
    pub id: String,

    /// Changes as field=value pairs
    #[arg(required = true)]
    pub changes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,

    /// Device id
    pub id: String,

    /// Skip confirmation
    #[arg(short, long)]
    pub force: bool,
}
