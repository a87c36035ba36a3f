use std::{env, io, process, thread, time::Duration};

use evjoy::Session;

fn main() -> io::Result<()> {
    env_logger::init();
    let session = match &*env::args().skip(1).collect::<Vec<_>>() {
        [path] => Session::open(path)?,
        _ => {
            eprintln!("usage: {} <evdev-path>", env!("CARGO_CRATE_NAME"));
            process::exit(1);
        }
    };

    println!("Grabbing '{}' for 3 seconds", session.identity().name());

    session.grab()?;
    thread::sleep(Duration::from_secs(3));

    println!("Ungrabbing device");

    session.ungrab()?;

    println!("Done!");
    Ok(())
}
