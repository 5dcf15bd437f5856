use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use spine_frame::payload::{Ack, BodyDataFrame, DataCharacter, PayloadLayout};
use spine_frame::{catalog, Direction, FrameBuffer, FrameError, MessageType};
use spine_relay::RelayStats;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One decode attempt, valid or not.
#[derive(Serialize, Debug)]
pub struct FrameReport {
    pub direction: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<&'static str>,
    pub code: String,
    pub payload_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameReport {
    /// Report for the valid frame currently held by `buffer`.
    pub fn from_buffer(buffer: &FrameBuffer) -> Self {
        Self {
            direction: buffer.direction().as_str(),
            status: "ok",
            message_type: buffer.message_type().map(MessageType::name),
            code: format!("0x{:04X}", buffer.type_code()),
            payload_size: buffer.payload_size(),
            crc: Some(format!("0x{:08X}", buffer.trailer())),
            detail: describe_payload(buffer),
            error: None,
        }
    }

    /// Report for a rejected frame. Header fields are only meaningful once
    /// the sync marker matched.
    pub fn invalid(buffer: &FrameBuffer, err: &FrameError) -> Self {
        let code = match err {
            FrameError::Sync { .. } => "-".to_string(),
            _ => format!("0x{:04X}", buffer.type_code()),
        };
        Self {
            direction: buffer.direction().as_str(),
            status: "invalid",
            message_type: None,
            code,
            payload_size: 0,
            crc: None,
            detail: None,
            error: Some(err.to_string()),
        }
    }
}

fn describe_payload(buffer: &FrameBuffer) -> Option<String> {
    let payload = buffer.payload();
    match (buffer.direction(), buffer.message_type()?) {
        (_, MessageType::DataCharacter) => DataCharacter::decode(payload)
            .ok()
            .map(|text| format!("text={:?}", String::from_utf8_lossy(text.text()))),
        (Direction::BodyToHead, MessageType::Ack) => Ack::decode(payload)
            .ok()
            .map(|ack| format!("result={}", ack.result)),
        (Direction::BodyToHead, MessageType::DataFrame) => {
            BodyDataFrame::decode(payload).ok().map(|frame| {
                format!(
                    "seq={} battery={:.2}V charger={:.2}V temp={} on_charger={}",
                    frame.sequence,
                    frame.battery_volts(),
                    frame.charger_volts(),
                    frame.temperature,
                    frame.battery_flags.on_charger
                )
            })
        }
        _ => None,
    }
}

pub fn print_frame(report: &FrameReport, buffer: &FrameBuffer, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIR", "STATUS", "TYPE", "CODE", "SIZE", "CRC", "DETAIL"])
                .add_row(vec![
                    report.direction.to_string(),
                    report.status.to_string(),
                    report.message_type.unwrap_or("-").to_string(),
                    report.code.clone(),
                    report.payload_size.to_string(),
                    report.crc.clone().unwrap_or_else(|| "-".to_string()),
                    report
                        .detail
                        .clone()
                        .or_else(|| report.error.clone())
                        .unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut line = format!(
                "{} {} type={} ({}) size={}",
                report.direction,
                report.status,
                report.message_type.unwrap_or("-"),
                report.code,
                report.payload_size
            );
            if let Some(crc) = &report.crc {
                line.push_str(&format!(" crc={crc}"));
            }
            if let Some(detail) = &report.detail {
                line.push_str(&format!(" {detail}"));
            }
            if let Some(error) = &report.error {
                line.push_str(&format!(" error={error:?}"));
            }
            println!("{line}");
        }
        OutputFormat::Raw => {
            if report.status == "ok" {
                print_raw(buffer.frame_bytes());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[derive(Serialize)]
struct CatalogRow {
    direction: &'static str,
    message_type: &'static str,
    code: String,
    payload_size: usize,
}

fn catalog_rows(directions: &[Direction]) -> Vec<CatalogRow> {
    directions
        .iter()
        .flat_map(|&direction| {
            catalog::entries(direction)
                .iter()
                .map(move |(ty, size)| CatalogRow {
                    direction: direction.as_str(),
                    message_type: ty.name(),
                    code: format!("0x{:04X}", ty.code()),
                    payload_size: *size,
                })
        })
        .collect()
}

pub fn print_catalog(directions: &[Direction], format: OutputFormat) {
    let rows = catalog_rows(directions);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIR", "TYPE", "CODE", "SIZE"]);
            for row in &rows {
                table.add_row(vec![
                    row.direction.to_string(),
                    row.message_type.to_string(),
                    row.code.clone(),
                    row.payload_size.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!(
                    "{} {:<15} {} {}",
                    row.direction, row.message_type, row.code, row.payload_size
                );
            }
        }
    }
}

#[derive(Serialize)]
struct StatsOutput {
    direction: &'static str,
    relayed: u64,
    mutated: u64,
    invalid: u64,
    suppressed: u64,
}

pub fn print_relay_stats(results: &[(Direction, RelayStats)], format: OutputFormat) {
    let rows: Vec<StatsOutput> = results
        .iter()
        .map(|(direction, stats)| StatsOutput {
            direction: direction.as_str(),
            relayed: stats.relayed,
            mutated: stats.mutated,
            invalid: stats.invalid,
            suppressed: stats.suppressed,
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIR", "RELAYED", "MUTATED", "INVALID", "SUPPRESSED"]);
            for row in &rows {
                table.add_row(vec![
                    row.direction.to_string(),
                    row.relayed.to_string(),
                    row.mutated.to_string(),
                    row.invalid.to_string(),
                    row.suppressed.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!(
                    "{} relayed={} mutated={} invalid={} suppressed={}",
                    row.direction, row.relayed, row.mutated, row.invalid, row.suppressed
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_describes_text_frame() {
        let mut buffer = FrameBuffer::new(Direction::HeadToBody);
        buffer.build_text_message(b"Hello H2B!").unwrap();

        let report = FrameReport::from_buffer(&buffer);
        assert_eq!(report.status, "ok");
        assert_eq!(report.message_type, Some("dataCharacter"));
        assert_eq!(report.code, "0x6364");
        assert_eq!(report.crc.as_deref(), Some("0x5C3FFACD"));
        assert_eq!(report.detail.as_deref(), Some("text=\"Hello H2B!\""));
    }

    #[test]
    fn report_describes_ack() {
        let mut buffer = FrameBuffer::new(Direction::BodyToHead);
        buffer.encode(MessageType::Ack, &(-1i32).to_le_bytes()).unwrap();
        let report = FrameReport::from_buffer(&buffer);
        assert_eq!(report.detail.as_deref(), Some("result=-1"));
    }

    #[test]
    fn invalid_report_json_omits_missing_fields() {
        let buffer = FrameBuffer::new(Direction::BodyToHead);
        let err = FrameError::Sync {
            position: 0,
            expected: 0xAA,
            found: 0x42,
        };
        let json = serde_json::to_string(&FrameReport::invalid(&buffer, &err)).unwrap();
        assert!(json.contains("\"status\":\"invalid\""));
        assert!(json.contains("\"code\":\"-\""));
        assert!(!json.contains("message_type"));
        assert!(!json.contains("crc"));
    }

    #[test]
    fn catalog_rows_cover_both_directions() {
        let rows = catalog_rows(&[Direction::HeadToBody, Direction::BodyToHead]);
        assert_eq!(rows.len(), 16);
        assert_eq!(rows[0].message_type, "dataCharacter");
        assert!(rows
            .iter()
            .any(|row| row.direction == "B2H" && row.message_type == "dataFrame" && row.payload_size == 768));
    }
}
