use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use spine_frame::{Direction, FrameConfig, MessageType};
use spine_relay::ForwardPolicy;
use spine_transport::LinkAddr;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod catalog;
pub mod decode;
pub mod relay;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Relay frames between two links.
    Relay(RelayArgs),
    /// Decode and print frames read from a link.
    Decode(DecodeArgs),
    /// Build a single frame and write it to a link.
    Send(SendArgs),
    /// List the message catalog.
    Catalog(CatalogArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Relay(args) => relay::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Catalog(args) => catalog::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    /// Head board to body board.
    H2b,
    /// Body board to head board.
    B2h,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::H2b => Direction::HeadToBody,
            DirectionArg::B2h => Direction::BodyToHead,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Drop frames that fail to decode.
    Suppress,
    /// Forward the header and four stale bytes of frames that fail to decode.
    PassThrough,
}

impl From<PolicyArg> for ForwardPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Suppress => ForwardPolicy::SuppressInvalid,
            PolicyArg::PassThrough => ForwardPolicy::PassThrough,
        }
    }
}

#[derive(Args, Debug)]
pub struct RelayArgs {
    /// Inbound link (unix:, unix-listen:, tcp:, tcp-listen:, file:, or - for stdio).
    #[arg(long, value_name = "ADDR")]
    pub from: LinkAddr,
    /// Outbound link.
    #[arg(long, value_name = "ADDR")]
    pub to: LinkAddr,
    /// Direction of frames arriving on --from.
    #[arg(long, short = 'd', default_value = "h2b")]
    pub direction: DirectionArg,
    /// Also relay the reverse direction, from --to back to --from.
    #[arg(long)]
    pub bidirectional: bool,
    /// What to do with frames that fail to decode.
    #[arg(long, default_value = "suppress")]
    pub policy: PolicyArg,
    /// Copy dataCharacter text to stderr.
    #[arg(long)]
    pub echo: bool,
    /// Read/write timeout on socket links (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Link to read frames from.
    pub link: LinkAddr,
    /// Direction of the frames on the link.
    #[arg(long, short = 'd', default_value = "b2h")]
    pub direction: DirectionArg,
    /// Exit after N valid frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Skip invalid frames silently instead of reporting them.
    #[arg(long)]
    pub resync: bool,
    /// Read timeout on socket links (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Link to write the frame to.
    pub link: LinkAddr,
    /// Direction to frame for.
    #[arg(long, short = 'd', default_value = "h2b")]
    pub direction: DirectionArg,
    /// Send a dataCharacter frame carrying this text (truncated to 31 bytes).
    #[arg(long, conflicts_with_all = ["message_type", "payload"])]
    pub text: Option<String>,
    /// Message type by name (e.g. shutdown, version) or code (e.g. 0x6473).
    #[arg(long = "type", value_name = "TYPE", value_parser = parse_message_type)]
    pub message_type: Option<MessageType>,
    /// Read the payload from a file; its length must match the catalog.
    #[arg(long, value_name = "FILE", requires = "message_type")]
    pub payload: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Only list one direction.
    #[arg(long, short = 'd')]
    pub direction: Option<DirectionArg>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_message_type(input: &str) -> Result<MessageType, String> {
    let input = input.trim();
    let by_code = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
        .and_then(MessageType::from_code);
    by_code
        .or_else(|| MessageType::from_name(input))
        .ok_or_else(|| format!("unknown message type: {input}"))
}

pub(crate) fn frame_config(timeout: Option<&str>) -> CliResult<FrameConfig> {
    let timeout = timeout.map(parse_duration).transpose()?;
    Ok(FrameConfig {
        read_timeout: timeout,
        write_timeout: timeout,
    })
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn message_type_by_name_or_code() {
        assert_eq!(parse_message_type("shutdown"), Ok(MessageType::Shutdown));
        assert_eq!(parse_message_type("0x7276"), Ok(MessageType::Version));
        assert_eq!(parse_message_type("0X6B61"), Ok(MessageType::Ack));
        assert!(parse_message_type("0x1234").is_err());
        assert!(parse_message_type("reboot").is_err());
    }

    #[test]
    fn frame_config_applies_timeout_both_ways() {
        let cfg = frame_config(Some("250ms")).unwrap();
        assert_eq!(cfg.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(cfg.write_timeout, Some(Duration::from_millis(250)));
        assert!(frame_config(None).unwrap().read_timeout.is_none());
    }

    #[test]
    fn arg_enums_convert() {
        assert_eq!(Direction::from(DirectionArg::B2h), Direction::BodyToHead);
        assert_eq!(
            ForwardPolicy::from(PolicyArg::PassThrough),
            ForwardPolicy::PassThrough
        );
    }
}
