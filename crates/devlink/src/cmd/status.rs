use devlink_client::{EventFilter, ServoPolicy};

use crate::cmd::{build_client, parse_duration, wait_for_status, StatusArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_snapshot, OutputFormat};

pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let client = build_client(&args.device, ServoPolicy::default())?;
    let (_, events) = client.subscribe_channel(EventFilter::STATUS.and(EventFilter::CONNECTION));

    client
        .connect()
        .map_err(|err| client_error("connect failed", err))?;
    client.get_status();

    let snapshot = wait_for_status(&events, wait)?;
    print_snapshot(&snapshot, &args.device.label(), format);

    client.close();
    Ok(SUCCESS)
}
