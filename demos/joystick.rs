//! Prints the buttons and axes of a joystick whenever they change.

use std::{env, io, path::Path, process, sync::Arc, thread, time::Duration};

use evjoy::{JoystickFilter, JoystickListener, JoystickState};

struct Print {
    button_codes: Vec<u16>,
    axis_codes: Vec<u16>,
}

impl JoystickListener for Print {
    fn buttons_changed(&self, changed: &[bool], state: &JoystickState, device: &Path) {
        for (index, _) in changed.iter().enumerate().filter(|(_, c)| **c) {
            let state = if state.button(index) { "pressed" } else { "released" };
            println!(
                "{}: button {index} ({:#x}) {state}",
                device.display(),
                self.button_codes[index],
            );
        }
    }

    fn axes_moved(&self, changed: &[bool], state: &JoystickState, device: &Path) {
        let moved = changed
            .iter()
            .zip(&self.axis_codes)
            .zip(state.axes())
            .enumerate()
            .filter(|(_, ((changed, _), _))| **changed)
            .map(|(index, ((_, code), value))| format!("{index} ({code:#x}) = {value}"))
            .collect::<Vec<_>>();
        println!("{}: axes {}", device.display(), moved.join(", "));
    }
}

fn main() -> io::Result<()> {
    env_logger::init();
    let filter = match &*env::args().skip(1).collect::<Vec<_>>() {
        [path] => JoystickFilter::open(path)?,
        _ => {
            eprintln!("usage: {} <evdev-path>", env!("CARGO_CRATE_NAME"));
            process::exit(1);
        }
    };

    println!(
        "'{}' has {} buttons and {} axes",
        filter.session().identity().name(),
        filter.button_count(),
        filter.axis_count(),
    );

    let print = Arc::new(Print {
        button_codes: filter.button_codes().to_vec(),
        axis_codes: filter.axis_codes().to_vec(),
    });
    filter.add_listener(&print);

    while filter.session().is_running() {
        thread::sleep(Duration::from_millis(100));
    }
    filter.close()?;
    Ok(())
}
