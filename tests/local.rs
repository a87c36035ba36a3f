use std::{io, time::Duration};

use evjoy::{Error, JoystickFilter, Session, event::EventType};

/// Tests that all accessible devices on the local system can be opened, queried and closed.
#[test]
fn open_local_devices() -> io::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    // `/dev/input` doesn't exist in most containers.
    let Ok(devices) = evjoy::enumerate() else {
        return Ok(());
    };

    for path in devices.sorted()? {
        let session = match Session::builder(&path)
            .poll_interval(Duration::from_millis(10))
            .open()
        {
            Ok(session) => session,
            Err(Error::DeviceOpenFailed { source, .. })
                if source.kind() == io::ErrorKind::PermissionDenied =>
            {
                eprintln!("skipping '{}': permission denied", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let caps = session.supported_events();
        assert!(!caps.supports(EventType::SYN));
        for (_, codes) in caps.iter() {
            assert!(!codes.is_empty());
            assert!(codes.is_sorted());
        }

        let filter = JoystickFilter::new(&std::sync::Arc::new(session));
        assert_eq!(filter.state().buttons().len(), filter.button_count());
        assert_eq!(filter.state().axes().len(), filter.axis_count());
        filter.close()?;
    }

    Ok(())
}
