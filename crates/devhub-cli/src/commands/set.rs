//! Set command implementation.
//!
//! Parses `field=value` pairs and drives them through the control
//! dispatcher. Values are probed as bool, integer, float, then string; the
//! dispatcher validates them against the stored field schema.

use std::sync::Arc;

use devhub_core::control::ControlDispatcher;
use devhub_core::protocol::FieldChange;
use devhub_core::store::FileStore;
use devhub_core::transport::MqttCommandSender;
use devhub_core::types::FieldValue;

use crate::cli::SetArgs;
use crate::error::CliError;
use crate::output;

pub async fn run_set(args: SetArgs, store: Arc<FileStore>, json: bool) -> Result<(), CliError> {
    let changes = args
        .changes
        .iter()
        .map(|raw| parse_change(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let transport = Arc::new(MqttCommandSender::new(
        args.mqtt.broker_host.clone(),
        args.mqtt.broker_port,
        args.mqtt.mqtt_user.clone(),
        args.mqtt.mqtt_password.clone(),
    ));
    let dispatcher = ControlDispatcher::new(store, transport);

    let device = dispatcher.apply(&args.id, &changes).await?;

    if json {
        output::print_json(&device)?;
    } else {
        println!("Updated {} field(s) on `{}`.", changes.len(), device.name);
    }

    Ok(())
}

/// Parse a `field=value` argument.
fn parse_change(raw: &str) -> Result<FieldChange, CliError> {
    let (name, value) = raw.split_once('=').ok_or_else(|| {
        CliError::InvalidArgument(format!("expected field=value, got `{}`", raw))
    })?;

    if name.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "missing field name in `{}`",
            raw
        )));
    }

    Ok(FieldChange {
        name: name.to_string(),
        value: parse_value(value),
    })
}

fn parse_value(raw: &str) -> FieldValue {
    if let Ok(b) = raw.parse::<bool>() {
        return FieldValue::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return FieldValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return FieldValue::Float(f);
    }
    FieldValue::Str(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_change() {
        let change = parse_change("temperature=21.5").unwrap();
        assert_eq!(change.name, "temperature");
        assert_eq!(change.value, FieldValue::Float(21.5));
    }

    #[test]
    fn test_parse_change_requires_separator() {
        assert!(parse_change("temperature").is_err());
        assert!(parse_change("=5").is_err());
    }

    #[test]
    fn test_parse_value_probes_types_in_order() {
        assert_eq!(parse_value("true"), FieldValue::Bool(true));
        assert_eq!(parse_value("42"), FieldValue::Int(42));
        assert_eq!(parse_value("21.5"), FieldValue::Float(21.5));
        assert_eq!(parse_value("on"), FieldValue::Str("on".to_string()));
    }

    #[test]
    fn test_parse_value_keeps_equals_in_value() {
        let change = parse_change("label=a=b").unwrap();
        assert_eq!(change.value, FieldValue::Str("a=b".to_string()));
    }
}
