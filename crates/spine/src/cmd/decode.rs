use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spine_frame::{Direction, FrameError, FrameReader};
use spine_transport::OpenMode;
use tracing::debug;

use crate::cmd::{frame_config, install_ctrlc_handler, DecodeArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_frame, FrameReport, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = frame_config(args.timeout.as_deref())?;
    let link = args
        .link
        .open(OpenMode::Read)
        .map_err(|err| transport_error(&format!("failed to open {}", args.link), err))?;
    let mut reader = FrameReader::with_config_link(link, Direction::from(args.direction), config)
        .map_err(|err| frame_error("link setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let printed = decode_frames(&mut reader, &args, format, &running)?;
    debug!(printed, "decode finished");
    Ok(SUCCESS)
}

/// Decode until end of stream, `--count` valid frames, or interrupt.
/// Returns the number of valid frames seen.
fn decode_frames<R: Read>(
    reader: &mut FrameReader<R>,
    args: &DecodeArgs,
    format: OutputFormat,
    running: &AtomicBool,
) -> CliResult<usize> {
    let mut valid = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| valid >= count) {
            break;
        }

        let result = if args.resync {
            reader.read_next_valid().map(|(frame, _skipped)| frame)
        } else {
            reader.read_frame()
        };

        match result {
            Ok(_) => {
                valid = valid.saturating_add(1);
                print_frame(&FrameReport::from_buffer(reader.buffer()), reader.buffer(), format);
            }
            Err(err) if err.is_invalid_frame() => {
                print_frame(&FrameReport::invalid(reader.buffer(), &err), reader.buffer(), format);
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }
    Ok(valid)
}
