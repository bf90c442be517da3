use devlink_client::{EventFilter, ServoPolicy};

use crate::cmd::{build_client, finish_command, ServoArgs};
use crate::exit::{client_error, CliError, CliResult, TRANSPORT_ERROR};
use crate::output::OutputFormat;

pub fn run(args: ServoArgs, format: OutputFormat) -> CliResult<i32> {
    let policy = if args.strict {
        ServoPolicy::Reject
    } else {
        ServoPolicy::Clamp
    };
    // Refuse before touching the network.
    policy
        .apply(args.angle)
        .map_err(|err| client_error("invalid angle", err))?;

    let client = build_client(&args.device, policy)?;
    let (_, events) = client.subscribe_channel(EventFilter::REPLIES.and(EventFilter::CONNECTION));

    client
        .connect()
        .map_err(|err| client_error("connect failed", err))?;

    let sent = match args.index {
        Some(index) => client.set_servo_at(index, args.angle),
        None => client.set_servo(args.angle),
    }
    .map_err(|err| client_error("set_servo failed", err))?;
    if !sent {
        return Err(CliError::new(TRANSPORT_ERROR, "set_servo could not be sent"));
    }

    let code = finish_command(&events, "set_servo", &args.device, args.wait.as_deref(), format)?;
    client.close();
    Ok(code)
}
