//! Device sessions: an open device plus the thread that reads and dispatches its events.

use std::{
    collections::HashMap,
    fmt, io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    Error,
    axis::AxisParameters,
    capabilities::Capabilities,
    device::Device,
    drop::on_drop,
    error::Chain,
    event::Abs,
    evdev::Evdev,
    identity::DeviceIdentity,
    listeners::Listeners,
    record::{EventRecord, Layout},
};

/// Default upper bound on how long [`Session::close`] waits for the reading thread to notice.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Receives every event read by a [`Session`].
///
/// Listeners are called on the session's reading thread, in registration order. A listener that
/// blocks stalls all further reads from the device.
pub trait EventListener: Send + Sync + 'static {
    fn event(&self, event: &EventRecord);
}

impl<F: Fn(&EventRecord) + Send + Sync + 'static> EventListener for F {
    fn event(&self, event: &EventRecord) {
        self(event)
    }
}

/// The lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Identity and capabilities are being queried; no events are read yet.
    Initializing,
    /// The reading thread is delivering events.
    Running,
    /// Reading has stopped (because of [`Session::close`] or an I/O error), but the device
    /// handle has not been released yet.
    Closing,
    /// The reading thread has exited and the device handle has been released.
    Closed,
}

/// Configures and opens a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    path: PathBuf,
    layout: Layout,
    poll_interval: Duration,
}

impl SessionBuilder {
    /// Sets the event record layout to expect.
    ///
    /// Defaults to [`Layout::native`].
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets how long the reading thread waits for input before it rechecks whether the session
    /// is being closed.
    ///
    /// Defaults to [`DEFAULT_POLL_INTERVAL`].
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Opens the device at the configured path and starts reading from it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpenFailed`] if the device can't be opened, and [`Error::Io`] if
    /// the reading thread can't be spawned. Failing identity or capability queries are logged,
    /// but don't cause an error.
    pub fn open(self) -> Result<Session, Error> {
        let evdev = Evdev::open(&self.path).map_err(|source| Error::DeviceOpenFailed {
            path: self.path.clone(),
            source,
        })?;
        self.with_device(evdev)
    }

    /// Starts a session on an already opened device.
    ///
    /// The configured path is only used for reporting.
    pub fn with_device<D: Device>(self, device: D) -> Result<Session, Error> {
        Session::start(self, Arc::new(device))
    }
}

struct Shared {
    listeners: Listeners<dyn EventListener>,
    terminate: AtomicBool,
    state: Mutex<SessionState>,
    error: Mutex<Option<io::Error>>,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches to `to`, but only if the current state is `from`.
    fn transition(&self, from: SessionState, to: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == from {
            *state = to;
        }
    }

    /// Decodes one record and hands it to all listeners.
    fn dispatch(&self, bytes: &[u8], layout: Layout) {
        match EventRecord::decode(bytes, layout) {
            Ok(event) => {
                log::trace!("dispatching {event:?}");
                self.listeners.for_each(|l| l.event(&event));
            }
            Err(e) => log::warn!("skipping event: {}", Chain(&e)),
        }
    }
}

/// An open input device and its reading thread.
///
/// Opening a session queries the device's identity and [`Capabilities`] once, then starts a
/// thread that reads events and delivers them to every registered [`EventListener`], one record
/// at a time and in the order the device produced them.
///
/// The session owns the device. [`Session::close`] (or dropping the session) stops the reading
/// thread, waits for it to exit, and then releases the device.
pub struct Session {
    shared: Arc<Shared>,
    device: Mutex<Option<Arc<dyn Device>>>,
    weak_device: Weak<dyn Device>,
    thread: Mutex<Option<JoinHandle<()>>>,
    identity: DeviceIdentity,
    capabilities: Capabilities,
    axes: Mutex<HashMap<Abs, Arc<AxisParameters>>>,
    path: PathBuf,
    layout: Layout,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .field("state", &self.state())
            .field("identity", &self.identity)
            .field("capabilities", &self.capabilities)
            .field("listeners", &self.shared.listeners)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens the event device at `path` with the default configuration.
    ///
    /// See [`SessionBuilder::open`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::builder(path).open()
    }

    /// Returns a [`SessionBuilder`] for the device at `path`.
    pub fn builder<P: AsRef<Path>>(path: P) -> SessionBuilder {
        SessionBuilder {
            path: path.as_ref().to_path_buf(),
            layout: Layout::native(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Starts a session on an already opened `device`.
    ///
    /// `path` is only used for reporting (for example, it is passed on to
    /// [`JoystickListener`][crate::JoystickListener]s).
    pub fn with_device<D: Device, P: AsRef<Path>>(
        device: D,
        path: P,
        layout: Layout,
    ) -> Result<Self, Error> {
        Self::builder(path).layout(layout).with_device(device)
    }

    fn start(config: SessionBuilder, device: Arc<dyn Device>) -> Result<Self, Error> {
        let now = Instant::now();
        let shared = Arc::new(Shared {
            listeners: Listeners::new(),
            terminate: AtomicBool::new(false),
            state: Mutex::new(SessionState::Initializing),
            error: Mutex::new(None),
        });

        let identity = DeviceIdentity::query(&*device);
        let capabilities = Capabilities::query(|ty, words| device.event_bits(ty, words));

        let thread = {
            let shared = shared.clone();
            let device = device.clone();
            let layout = config.layout;
            let poll_interval = config.poll_interval;
            thread::Builder::new()
                .name("evjoy-reader".into())
                .spawn(move || read_loop(&shared, &*device, layout, poll_interval))?
        };
        shared.transition(SessionState::Initializing, SessionState::Running);

        let this = Self {
            shared,
            weak_device: Arc::downgrade(&device),
            device: Mutex::new(Some(device)),
            thread: Mutex::new(Some(thread)),
            identity,
            capabilities,
            axes: Mutex::new(HashMap::new()),
            path: config.path,
            layout: config.layout,
        };
        log::debug!(
            "started session for '{}' ({}) in {:?}",
            this.path.display(),
            this.identity.name(),
            now.elapsed(),
        );
        Ok(this)
    }

    /// Returns the path of the device this session reads from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the event record layout this session decodes.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the device's ID, name and driver version, as queried when the session started.
    #[inline]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the event types and codes the device advertised when the session started.
    #[inline]
    pub fn supported_events(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Returns whether the reading thread is still delivering events.
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Registers `listener` to receive every event read from now on.
    ///
    /// The session only keeps a weak reference: the listener is unregistered automatically when
    /// its last [`Arc`] is dropped. Registering the same listener again has no effect.
    pub fn add_listener<L: EventListener>(&self, listener: &Arc<L>) {
        let listener: Arc<dyn EventListener> = listener.clone();
        self.shared.listeners.add(&listener);
    }

    /// Unregisters `listener`. Does nothing if it isn't registered.
    ///
    /// If an event is being dispatched concurrently, `listener` may still receive that one event.
    pub fn remove_listener<L: EventListener>(&self, listener: &Arc<L>) {
        let listener: Arc<dyn EventListener> = listener.clone();
        self.shared.listeners.remove(&listener);
    }

    /// Grabs the device, so that no other client (including the rest of the system) receives its
    /// events while the grab is active.
    ///
    /// The grab ends with [`Session::ungrab`] or when the session is closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GrabFailed`] if the device is already grabbed by someone else, or if the
    /// session has been closed.
    pub fn grab(&self) -> Result<(), Error> {
        self.set_grab(true)
    }

    /// Releases a grab obtained with [`Session::grab`].
    pub fn ungrab(&self) -> Result<(), Error> {
        self.set_grab(false)
    }

    fn set_grab(&self, grab: bool) -> Result<(), Error> {
        let device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        let res = match &*device {
            Some(device) => device.set_grab(grab),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "device session has been closed",
            )),
        };
        res.map_err(|source| Error::GrabFailed { grab, source })
    }

    /// Returns the [`AxisParameters`] of `axis`.
    ///
    /// The parameters are fetched the first time an axis is requested. Later calls for the same
    /// axis return the same instance.
    pub fn axis_parameters(&self, axis: Abs) -> Arc<AxisParameters> {
        let mut axes = self.axes.lock().unwrap_or_else(PoisonError::into_inner);
        axes.entry(axis)
            .or_insert_with(|| Arc::new(AxisParameters::new(axis, self.weak_device.clone())))
            .clone()
    }

    /// Stops the reading thread and releases the device.
    ///
    /// Blocks until the reading thread has exited, which takes at most about one poll interval
    /// (see [`SessionBuilder::poll_interval`]) plus the time the listeners take for the event
    /// that is currently being dispatched. Calling this again does nothing.
    ///
    /// When called from a listener, this only stops the reading thread. The device is released
    /// once the current dispatch has finished.
    ///
    /// # Errors
    ///
    /// If the reading thread stopped because reading from the device failed, that error is
    /// returned (once).
    pub fn close(&self) -> Result<(), Error> {
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            let now = Instant::now();
            let _d = on_drop(|| {
                log::debug!("closing '{}' took {:?}", self.path.display(), now.elapsed())
            });

            self.shared.set_state(SessionState::Closing);
            self.shared.terminate.store(true, Ordering::Release);
            if thread.thread().id() == thread::current().id() {
                // Dropped by a listener. The loop exits once the current dispatch returns, and
                // the thread's reference is the last one to release the device.
                log::debug!("session closed from its own reading thread");
            } else if thread.join().is_err() {
                log::error!("reading thread of '{}' panicked", self.path.display());
            }

            // Unless the thread is still unwinding its dispatch, this releases the device.
            drop(
                self.device
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take(),
            );
            self.shared.set_state(SessionState::Closed);
        }

        match self
            .shared
            .error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(e) => Err(Error::Io(e)),
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("error while closing '{}': {}", self.path.display(), Chain(&e));
        }
    }
}

fn read_loop(shared: &Shared, device: &dyn Device, layout: Layout, poll_interval: Duration) {
    let mut buf = [0; Layout::Wide.record_size()];
    let buf = &mut buf[..layout.record_size()];
    loop {
        match read_record(shared, device, buf, poll_interval) {
            Ok(true) => shared.dispatch(buf, layout),
            Ok(false) => break,
            Err(e) => {
                log::error!("reading events failed, stopping: {e}");
                *shared.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                shared.set_state(SessionState::Closing);
                break;
            }
        }
    }
}

/// Fills `buf` with exactly one record.
///
/// Returns `Ok(false)` if the session was closed before the record was complete.
fn read_record(
    shared: &Shared,
    device: &dyn Device,
    buf: &mut [u8],
    poll_interval: Duration,
) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        if shared.terminate.load(Ordering::Acquire) {
            return Ok(false);
        }
        if !device.wait_readable(poll_interval)? {
            continue;
        }

        match device.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "device reached end-of-file",
                ));
            }
            Ok(n) => filled += n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use crate::{
        AbsInfo,
        event::EventType,
        identity::{Bus, InputId},
        test::TestDevice,
    };

    use super::*;

    const LAYOUT: Layout = Layout::Wide;
    const TIMEOUT: Duration = Duration::from_secs(10);

    fn start(dev: TestDevice) -> Session {
        Session::builder("/dev/input/event-test")
            .layout(LAYOUT)
            .poll_interval(Duration::from_millis(5))
            .with_device(dev)
            .unwrap()
    }

    /// Registers a listener that forwards events to a channel.
    fn collect(session: &Session) -> (Arc<impl EventListener>, mpsc::Receiver<EventRecord>) {
        let (sender, recv) = mpsc::channel();
        let sender = Mutex::new(sender);
        let listener = Arc::new(move |ev: &EventRecord| {
            sender.lock().unwrap().send(*ev).ok();
        });
        session.add_listener(&listener);
        (listener, recv)
    }

    fn events(count: u16) -> Vec<EventRecord> {
        (0..count)
            .map(|i| EventRecord::new(EventType::KEY, 0x120 + i, 1).with_timestamp(1, i.into()))
            .collect()
    }

    #[test]
    fn startup() {
        let dev = TestDevice::builder()
            .id(InputId::new(Bus::USB, 0x046d, 0xc215, 0x0111))
            .name("Logitech Extreme 3D")
            .codes(EventType::KEY, &[0x120, 0x121])
            .abs(Abs::X, AbsInfo::new(0, 1023))
            .build();
        let session = start(dev);

        assert_eq!(session.identity().name(), "Logitech Extreme 3D");
        assert_eq!(session.identity().vendor(), 0x046d);
        assert_eq!(session.supported_events().codes(EventType::KEY), &[0x120, 0x121]);
        assert_eq!(session.supported_events().codes(EventType::ABS), &[0]);
        assert_eq!(session.path(), Path::new("/dev/input/event-test"));
        assert_eq!(session.layout(), LAYOUT);
        assert!(session.is_running());

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn open_failure() {
        match Session::open("/dev/input/event-does-not-exist") {
            Err(Error::DeviceOpenFailed { path, source }) => {
                assert_eq!(path, Path::new("/dev/input/event-does-not-exist"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            res => panic!("expected `DeviceOpenFailed`, got {res:?}"),
        }
    }

    #[test]
    fn dispatch_order() {
        let dev = TestDevice::builder().build();
        let feeder = dev.feeder();
        let session = start(dev);

        let order = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let order = order.clone();
            Arc::new(move |ev: &EventRecord| order.lock().unwrap().push((1, ev.raw_code())))
        };
        let second = {
            let order = order.clone();
            Arc::new(move |ev: &EventRecord| order.lock().unwrap().push((2, ev.raw_code())))
        };
        session.add_listener(&first);
        session.add_listener(&second);
        let (_l, recv) = collect(&session);

        let sent = events(3);
        feeder.events(LAYOUT, &sent);
        for expected in &sent {
            assert_eq!(recv.recv_timeout(TIMEOUT).unwrap(), *expected);
        }

        assert_eq!(
            *order.lock().unwrap(),
            &[(1, 0x120), (2, 0x120), (1, 0x121), (2, 0x121), (1, 0x122), (2, 0x122)]
        );
    }

    #[test]
    fn partial_reads() {
        let dev = TestDevice::builder().max_read(5).build();
        let feeder = dev.feeder();
        let session = start(dev);
        let (_l, recv) = collect(&session);

        let sent = events(4);
        let mut bytes = Vec::new();
        for ev in &sent {
            bytes.extend_from_slice(&ev.to_bytes(LAYOUT));
        }
        // Deliver the stream in odd pieces, with an interrupted read in the middle.
        let (a, b) = bytes.split_at(30);
        feeder.bytes(a);
        feeder.error(io::ErrorKind::Interrupted);
        feeder.bytes(b);

        for expected in &sent {
            assert_eq!(recv.recv_timeout(TIMEOUT).unwrap(), *expected);
        }
        session.close().unwrap();
    }

    #[test]
    fn malformed_record_is_skipped() {
        let shared = Shared {
            listeners: Listeners::new(),
            terminate: AtomicBool::new(false),
            state: Mutex::new(SessionState::Running),
            error: Mutex::new(None),
        };
        let count = Arc::new(Mutex::new(0));
        let listener: Arc<dyn EventListener> = {
            let count = count.clone();
            Arc::new(move |_: &EventRecord| *count.lock().unwrap() += 1)
        };
        shared.listeners.add(&listener);

        let bytes = EventRecord::new(EventType::SYN, 0, 0).to_bytes(Layout::Wide);
        shared.dispatch(&bytes[..Layout::Narrow.record_size()], Layout::Wide);
        assert_eq!(*count.lock().unwrap(), 0);

        shared.dispatch(&bytes, Layout::Wide);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn close_while_read_pending() {
        let dev = TestDevice::builder().build();
        let feeder = dev.feeder();
        let session = start(dev);

        // Half a record: the reading thread waits for the rest.
        feeder.bytes(&EventRecord::new(EventType::KEY, 1, 1).to_bytes(LAYOUT)[..10]);

        session.close().unwrap();
        assert_eq!(feeder.drops(), 1);
        assert_eq!(session.state(), SessionState::Closed);

        session.close().unwrap();
        drop(session);
        assert_eq!(feeder.drops(), 1, "device must be released exactly once");
    }

    #[test]
    fn drop_closes() {
        let dev = TestDevice::builder().build();
        let feeder = dev.feeder();
        let session = start(dev);
        assert_eq!(feeder.drops(), 0);
        drop(session);
        assert_eq!(feeder.drops(), 1);
    }

    #[test]
    fn terminal_error() {
        let dev = TestDevice::builder().build();
        let feeder = dev.feeder();
        let session = start(dev);
        let (_l, recv) = collect(&session);

        feeder.events(LAYOUT, &events(1));
        feeder.error(io::ErrorKind::BrokenPipe);
        feeder.events(LAYOUT, &events(1));

        assert!(recv.recv_timeout(TIMEOUT).is_ok());
        // Nothing after the error is delivered.
        assert!(recv.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(session.state(), SessionState::Closing);
        assert!(!session.is_running());

        match session.close() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            res => panic!("expected I/O error, got {res:?}"),
        }
        session.close().unwrap();
        assert_eq!(feeder.drops(), 1);
    }

    #[test]
    fn eof_is_terminal() {
        let dev = TestDevice::builder().build();
        let feeder = dev.feeder();
        let session = start(dev);
        feeder.eof();

        let deadline = Instant::now() + TIMEOUT;
        while session.is_running() {
            assert!(Instant::now() < deadline, "reading thread did not stop");
            thread::sleep(Duration::from_millis(1));
        }
        match session.close() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            res => panic!("expected I/O error, got {res:?}"),
        }
    }

    #[test]
    fn grab() {
        let dev = TestDevice::builder().build();
        let feeder = dev.feeder();
        let session = start(dev);

        session.grab().unwrap();
        assert!(feeder.is_grabbed());
        session.ungrab().unwrap();
        assert!(!feeder.is_grabbed());

        session.close().unwrap();
        match session.grab() {
            Err(Error::GrabFailed { grab: true, source }) => {
                assert_eq!(source.kind(), io::ErrorKind::NotConnected)
            }
            res => panic!("expected `GrabFailed`, got {res:?}"),
        }
    }

    #[test]
    fn grab_failure() {
        let session = start(TestDevice::builder().fail_grab().build());
        match session.grab() {
            Err(Error::GrabFailed { grab: true, source }) => {
                assert_eq!(source.raw_os_error(), Some(libc::EBUSY))
            }
            res => panic!("expected `GrabFailed`, got {res:?}"),
        }
        // The session keeps working.
        assert!(matches!(
            session.ungrab(),
            Err(Error::GrabFailed { grab: false, .. })
        ));
        session.close().unwrap();
    }

    #[test]
    fn axis_parameters_are_memoized() {
        let session = start(
            TestDevice::builder()
                .abs(Abs::X, AbsInfo::new(-127, 127))
                .abs(Abs::Y, AbsInfo::new(-127, 127).with_flat(8))
                .build(),
        );

        let x = session.axis_parameters(Abs::X);
        assert!(Arc::ptr_eq(&x, &session.axis_parameters(Abs::X)));
        assert_eq!(x.axis(), Abs::X);
        assert_eq!(x.info().unwrap().minimum(), -127);

        let y = session.axis_parameters(Abs::Y);
        assert!(!Arc::ptr_eq(&x, &y));
        assert_eq!(y.info().unwrap().flat(), 8);

        // Axes the device doesn't have still get a (single) parameter object.
        let z = session.axis_parameters(Abs::Z);
        assert!(z.info().is_none());
        assert!(Arc::ptr_eq(&z, &session.axis_parameters(Abs::Z)));

        session.close().unwrap();
        assert_eq!(
            x.refresh().unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
    }

    #[test]
    fn listener_removal() {
        let dev = TestDevice::builder().build();
        let feeder = dev.feeder();
        let session = start(dev);
        let (listener, recv) = collect(&session);
        let (_other, other_recv) = collect(&session);

        feeder.events(LAYOUT, &events(1));
        recv.recv_timeout(TIMEOUT).unwrap();
        other_recv.recv_timeout(TIMEOUT).unwrap();

        session.remove_listener(&listener);
        session.remove_listener(&listener);
        feeder.events(LAYOUT, &events(1));
        other_recv.recv_timeout(TIMEOUT).unwrap();
        assert!(recv.try_recv().is_err());

        // Dropped listeners are unregistered implicitly.
        drop(listener);
        feeder.events(LAYOUT, &events(1));
        other_recv.recv_timeout(TIMEOUT).unwrap();
    }

    #[test]
    fn send_sync() {
        fn assert<T: Send + Sync>() {}

        assert::<Session>();
        assert::<SessionBuilder>();
    }
}
