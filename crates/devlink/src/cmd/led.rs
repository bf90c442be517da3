use devlink_client::{EventFilter, ServoPolicy};

use crate::cmd::{build_client, finish_command, LedArgs, LedTarget};
use crate::exit::{client_error, CliError, CliResult, TRANSPORT_ERROR};
use crate::output::OutputFormat;

pub fn run(args: LedArgs, format: OutputFormat) -> CliResult<i32> {
    let client = build_client(&args.device, ServoPolicy::default())?;
    let (_, events) = client.subscribe_channel(EventFilter::REPLIES.and(EventFilter::CONNECTION));

    client
        .connect()
        .map_err(|err| client_error("connect failed", err))?;

    let on = args.state.is_on();
    let (command, sent) = match args.target {
        LedTarget::All => ("set_all_leds", client.set_all_leds(on)),
        LedTarget::One(led) => ("set_led", client.set_led(led, on)),
    };
    if !sent {
        return Err(CliError::new(
            TRANSPORT_ERROR,
            format!("{command} could not be sent"),
        ));
    }

    let code = finish_command(&events, command, &args.device, args.wait.as_deref(), format)?;
    client.close();
    Ok(code)
}
