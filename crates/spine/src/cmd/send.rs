use std::fs;

use spine_frame::{catalog, Direction, FrameConfig, FrameWriter, MessageType};
use spine_transport::{LinkAddr, OpenMode};

use crate::cmd::SendArgs;
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, FrameReport, OutputFormat};

/// What to put in the frame.
#[derive(Debug, PartialEq, Eq)]
enum Content {
    Text(Vec<u8>),
    Typed(MessageType, Vec<u8>),
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let direction = Direction::from(args.direction);
    let content = resolve_content(&args, direction)?;

    let link = args
        .link
        .open(OpenMode::Write)
        .map_err(|err| transport_error(&format!("failed to open {}", args.link), err))?;
    let mut writer = FrameWriter::with_config_link(link, direction, FrameConfig::default())
        .map_err(|err| frame_error("link setup failed", err))?;

    let result = match content {
        Content::Text(text) => writer.send_text(&text),
        Content::Typed(message_type, payload) => writer.send(message_type, &payload),
    };
    result.map_err(|err| frame_error("send failed", err))?;

    let sent = writer.last_frame();
    // Stdout carries the frame itself for a stdio link.
    if args.link != LinkAddr::Stdio && !matches!(format, OutputFormat::Raw) {
        print_frame(&FrameReport::from_buffer(sent), sent, format);
    }
    Ok(SUCCESS)
}

fn resolve_content(args: &SendArgs, direction: Direction) -> CliResult<Content> {
    if let Some(text) = &args.text {
        return Ok(Content::Text(text.as_bytes().to_vec()));
    }

    let Some(message_type) = args.message_type else {
        return Err(CliError::new(USAGE, "one of --text or --type is required"));
    };
    let Some(size) = catalog::size_for(direction, message_type) else {
        return Err(CliError::new(
            USAGE,
            format!("{message_type} is not cataloged for {direction}"),
        ));
    };

    let payload = match &args.payload {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        None if size == 0 => Vec::new(),
        None => {
            return Err(CliError::new(
                USAGE,
                format!("{message_type} needs a {size}-byte payload (--payload FILE)"),
            ))
        }
    };
    Ok(Content::Typed(message_type, payload))
}
