//! Lists all event devices with their identity, capabilities and axis ranges.

use std::{error::Error, io, process};

use evjoy::{
    Session,
    event::{Abs, EventType},
};

fn main() {
    env_logger::init();
    match run() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("\nerror: {e}");
            let mut error: &dyn Error = &e;
            while let Some(source) = error.source() {
                eprintln!("- caused by: {source}");
                error = source;
            }
            process::exit(1);
        }
    }
}

fn run() -> io::Result<()> {
    for path in evjoy::enumerate()?.sorted()? {
        println!("- {}", path.display());
        let session = match Session::open(&path) {
            Ok(session) => session,
            Err(e) => {
                println!("  <{e}>");
                continue;
            }
        };

        let identity = session.identity();
        println!("  id: {:?}", identity.input_id());
        println!("  name: {:?}", identity.name());
        println!("  driver version: {}", identity.driver_version());
        println!("  supported events: {:?}", session.supported_events());

        let axes = session.supported_events().codes(EventType::ABS);
        if !axes.is_empty() {
            println!("  absolute axis ranges:");
            for &code in axes {
                let params = session.axis_parameters(Abs::from_raw(code));
                match params.info() {
                    Some(info) => println!("  - {:?}: {info:?}", params.axis()),
                    None => println!("  - {:?}: <unavailable>", params.axis()),
                }
            }
        }

        session.close()?;
    }

    Ok(())
}
