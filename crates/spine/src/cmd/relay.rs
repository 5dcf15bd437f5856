use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use spine_frame::Direction;
use spine_relay::{EchoHandler, MessageHandler, PassThrough, Relay, RelayConfig, RelayStats};
use spine_transport::{Link, LinkAddr, OpenMode};
use tracing::{debug, info};

use crate::cmd::{frame_config, install_ctrlc_handler, RelayArgs};
use crate::exit::{relay_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_relay_stats, OutputFormat};

pub fn run(args: RelayArgs, format: OutputFormat) -> CliResult<i32> {
    let direction = Direction::from(args.direction);
    let frame = frame_config(args.timeout.as_deref())?;
    let (from_mode, to_mode) = if args.bidirectional {
        (OpenMode::ReadWrite, OpenMode::ReadWrite)
    } else {
        (OpenMode::Read, OpenMode::Write)
    };

    let from = open(&args.from, from_mode)?;
    let to = open(&args.to, to_mode)?;
    info!(
        from = %args.from,
        to = %args.to,
        %direction,
        bidirectional = args.bidirectional,
        "relay started"
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = RelayConfig {
        direction,
        forward_policy: args.policy.into(),
        frame,
    };
    let results = relay_links(from, to, config, args.bidirectional, args.echo, running)?;

    print_relay_stats(&results, format);
    Ok(SUCCESS)
}

/// Ends both directions of a bidirectional relay.
///
/// Clears the shared flag and shuts down the socket links so a read blocked
/// in the other direction returns end of stream.
struct Stopper {
    running: Arc<AtomicBool>,
    links: Vec<Link>,
}

impl Stopper {
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for link in &self.links {
            if let Err(err) = link.shutdown() {
                debug!(kind = link.kind(), error = %err, "link shutdown failed");
            }
        }
    }
}

fn relay_links(
    from: Link,
    to: Link,
    config: RelayConfig,
    bidirectional: bool,
    echo: bool,
    running: Arc<AtomicBool>,
) -> CliResult<Vec<(Direction, RelayStats)>> {
    let direction = config.direction;
    if !bidirectional {
        let stats = relay_until_stopped(from, to, config, echo, &running)?;
        return Ok(vec![(direction, stats)]);
    }

    let clone = |link: &Link| {
        link.try_clone()
            .map_err(|err| transport_error("clone link failed", err))
    };
    let stopper = Arc::new(Stopper {
        running: running.clone(),
        links: vec![clone(&from)?, clone(&to)?],
    });

    let inbound = clone(&to)?;
    let outbound = clone(&from)?;
    let reverse_config = RelayConfig {
        direction: direction.reverse(),
        ..config.clone()
    };
    let reverse_stopper = Arc::clone(&stopper);
    let reverse = thread::Builder::new()
        .name(format!("relay-{}", direction.reverse()))
        .spawn(move || {
            let result = relay_until_stopped(
                inbound,
                outbound,
                reverse_config,
                echo,
                &reverse_stopper.running,
            );
            reverse_stopper.stop();
            result
        })
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start relay thread: {err}")))?;

    let forward = relay_until_stopped(from, to, config, echo, &running);
    stopper.stop();

    let reverse = reverse
        .join()
        .map_err(|_| CliError::new(INTERNAL, "reverse relay thread panicked"))?;
    Ok(vec![(direction, forward?), (direction.reverse(), reverse?)])
}

fn open(addr: &LinkAddr, mode: OpenMode) -> CliResult<Link> {
    addr.open(mode)
        .map_err(|err| transport_error(&format!("failed to open {addr}"), err))
}

fn relay_until_stopped(
    inbound: Link,
    outbound: Link,
    config: RelayConfig,
    echo: bool,
    running: &AtomicBool,
) -> CliResult<RelayStats> {
    if echo {
        run_relay(
            inbound,
            outbound,
            EchoHandler::new(std::io::stderr()),
            config,
            running,
        )
    } else {
        run_relay(inbound, outbound, PassThrough, config, running)
    }
}

fn run_relay<H: MessageHandler>(
    inbound: Link,
    outbound: Link,
    handler: H,
    config: RelayConfig,
    running: &AtomicBool,
) -> CliResult<RelayStats> {
    let direction = config.direction;
    let mut relay = Relay::with_config_link(inbound, outbound, handler, config)
        .map_err(|err| relay_error("relay setup failed", err))?;
    relay
        .run_while(|| running.load(Ordering::SeqCst))
        .map_err(|err| relay_error(&format!("{direction} relay failed"), err))
}
