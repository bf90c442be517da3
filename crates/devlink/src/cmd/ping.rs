use std::time::Instant;

use devlink_client::{EventFilter, ServoPolicy};

use crate::cmd::{build_client, parse_duration, wait_for_reply, PingArgs};
use crate::exit::{client_error, CliError, CliResult, FAILURE, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let client = build_client(&args.device, ServoPolicy::default())?;
    let (_, events) = client.subscribe_channel(EventFilter::REPLIES.and(EventFilter::CONNECTION));

    client
        .connect()
        .map_err(|err| client_error("connect failed", err))?;

    let start = Instant::now();
    if !client.ping() {
        return Err(CliError::new(TRANSPORT_ERROR, "ping could not be sent"));
    }
    let reply = wait_for_reply(&events, wait)?;
    print_reply(&reply, "ping", &args.device.label(), Some(start.elapsed()), format);

    client.close();
    Ok(if reply.is_success() { SUCCESS } else { FAILURE })
}
