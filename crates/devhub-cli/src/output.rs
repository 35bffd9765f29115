//! Output helpers: device tables and JSON printing.

use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table};
use serde::Serialize;

use devhub_core::types::{DeviceRecord, DeviceType, FieldValue};

use crate::error::CliError;

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let raw = serde_json::to_string_pretty(value).map_err(|e| CliError::Other(e.to_string()))?;
    println!("{}", raw);
    Ok(())
}

/// Render the device list as a table.
pub fn format_devices(devices: &[DeviceRecord]) -> String {
    if devices.is_empty() {
        return "No devices registered.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Name", "Type", "Fields", "Registered"]);

    for device in devices {
        let fields = device
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        table.add_row(vec![
            Cell::new(&device.id),
            Cell::new(&device.name),
            Cell::new(device.device_type.as_str()),
            Cell::new(fields),
            Cell::new(device.registered_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    format!("{}\n\n{} device(s) registered", table, devices.len())
}

/// Render one device record with its fields.
pub fn format_device(device: &DeviceRecord) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Device: {} ({})", device.name, device.id));
    lines.push(format!("  Type:       {}", type_label(device.device_type)));
    lines.push(format!("  Registered: {}", device.registered_at.to_rfc3339()));
    lines.push("  Fields:".to_string());

    for field in &device.fields {
        let range = match (field.min, field.max) {
            (Some(min), Some(max)) => format!(" [{}, {}]", min, max),
            _ => String::new(),
        };
        lines.push(format!(
            "    {} ({}) = {}{}",
            field.name,
            field.field_type.as_str(),
            format_value(&field.value),
            range
        ));
    }

    lines.join("\n")
}

fn type_label(device_type: DeviceType) -> String {
    match device_type {
        DeviceType::Sensor => "sensor".green().to_string(),
        DeviceType::Device => "device".cyan().to_string(),
    }
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(v) => v.to_string(),
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Float(v) => v.to_string(),
        FieldValue::Str(v) => format!("\"{}\"", v),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use devhub_core::types::{FieldRecord, FieldType};

    use super::*;

    fn make_record() -> DeviceRecord {
        DeviceRecord {
            id: "64f1a2b3c4d5e6f7a8b9c0d1".to_string(),
            name: "thermostat".to_string(),
            device_type: DeviceType::Sensor,
            fields: vec![FieldRecord {
                name: "temperature".to_string(),
                field_type: FieldType::Float,
                value: FieldValue::Float(21.5),
                min: Some(0.0),
                max: Some(100.0),
            }],
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_device_list() {
        assert_eq!(format_devices(&[]), "No devices registered.");
    }

    #[test]
    fn test_device_list_mentions_every_device() {
        let output = format_devices(&[make_record()]);
        assert!(output.contains("thermostat"));
        assert!(output.contains("64f1a2b3c4d5e6f7a8b9c0d1"));
        assert!(output.contains("1 device(s) registered"));
    }

    #[test]
    fn test_device_detail_shows_field_range() {
        let output = format_device(&make_record());
        assert!(output.contains("temperature (float) = 21.5 [0, 100]"));
    }
}
