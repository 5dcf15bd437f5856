use spine_frame::Direction;

use crate::cmd::CatalogArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_catalog, OutputFormat};

pub fn run(args: CatalogArgs, format: OutputFormat) -> CliResult<i32> {
    let directions = match args.direction {
        Some(direction) => vec![Direction::from(direction)],
        None => vec![Direction::HeadToBody, Direction::BodyToHead],
    };
    print_catalog(&directions, format);
    Ok(SUCCESS)
}
