use std::{env, io, process, sync::Arc, thread, time::Duration};

use evjoy::{EventRecord, Layout, Session};

fn main() -> io::Result<()> {
    env_logger::init();
    let mut builder = match &*env::args().skip(1).collect::<Vec<_>>() {
        [path] => Session::builder(path),
        [path, layout] => Session::builder(path).layout(match &**layout {
            "narrow" => Layout::Narrow,
            "wide" => Layout::Wide,
            _ => usage(),
        }),
        _ => usage(),
    };
    builder = builder.poll_interval(Duration::from_millis(50));
    let session = builder.open()?;

    println!(
        "Reading events from '{}' ({:?} layout)",
        session.identity().name(),
        session.layout()
    );

    let print = Arc::new(|event: &EventRecord| println!("{event:?}"));
    session.add_listener(&print);

    while session.is_running() {
        thread::sleep(Duration::from_millis(100));
    }
    session.close()?;
    Ok(())
}

fn usage() -> ! {
    eprintln!(
        "usage: {} <evdev-path> [narrow|wide]",
        env!("CARGO_CRATE_NAME")
    );
    process::exit(1);
}
