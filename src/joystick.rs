//! Consolidates button and axis events into joystick state snapshots.
//!
//! A [`JoystickFilter`] listens to a [`Session`] and keeps track of the current value of every
//! button (`EV_KEY` code) and absolute axis (`EV_ABS` code) the device advertised. Buttons and
//! axes are addressed by *dense index*: their position in the device's ascending list of
//! supported codes, not the raw kernel code. A device advertising `ABS_X`, `ABS_Y` and `ABS_RX`
//! has axes 0, 1 and 2.
//!
//! Changes are buffered until the next `EV_SYN` event. At that point, every [`JoystickListener`]
//! gets at most one [`JoystickListener::buttons_changed`] and one [`JoystickListener::axes_moved`]
//! call, each with a mask of the indices whose value actually changed.

use std::{
    collections::HashMap,
    fmt,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    Error,
    event::{EventKind, EventType},
    listeners::Listeners,
    record::EventRecord,
    session::{EventListener, Session},
};

/// Receives batched change notifications from a [`JoystickFilter`].
///
/// Both methods are called on the session's reading thread, after all button and axis events of
/// one input frame have been applied to `state`. `changed[i]` is `true` if button (or axis) `i`
/// has a different value than at the end of the previous frame.
pub trait JoystickListener: Send + Sync + 'static {
    /// Called when at least one button changed state.
    fn buttons_changed(&self, changed: &[bool], state: &JoystickState, device: &Path) {
        let _ = (changed, state, device);
    }

    /// Called when at least one axis changed its value.
    fn axes_moved(&self, changed: &[bool], state: &JoystickState, device: &Path) {
        let _ = (changed, state, device);
    }
}

/// The values of all buttons and axes of a joystick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoystickState {
    buttons: Vec<bool>,
    axes: Vec<i32>,
}

impl JoystickState {
    fn new(buttons: usize, axes: usize) -> Self {
        Self {
            buttons: vec![false; buttons],
            axes: vec![0; axes],
        }
    }

    /// Returns whether the button with dense index `index` is pressed.
    ///
    /// Returns `false` for indices that are out of range.
    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    /// Returns the value of the axis with dense index `index`, if it exists.
    pub fn axis(&self, index: usize) -> Option<i32> {
        self.axes.get(index).copied()
    }

    #[inline]
    pub fn buttons(&self) -> &[bool] {
        &self.buttons
    }

    #[inline]
    pub fn axes(&self) -> &[i32] {
        &self.axes
    }
}

/// Which buttons and axes changed since the last `EV_SYN` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMask {
    buttons: Vec<bool>,
    axes: Vec<bool>,
}

impl ChangeMask {
    fn new(buttons: usize, axes: usize) -> Self {
        Self {
            buttons: vec![false; buttons],
            axes: vec![false; axes],
        }
    }

    #[inline]
    pub fn buttons(&self) -> &[bool] {
        &self.buttons
    }

    #[inline]
    pub fn axes(&self) -> &[bool] {
        &self.axes
    }

    pub fn any_buttons(&self) -> bool {
        self.buttons.contains(&true)
    }

    pub fn any_axes(&self) -> bool {
        self.axes.contains(&true)
    }

    fn clear(&mut self) {
        self.buttons.fill(false);
        self.axes.fill(false);
    }
}

struct Inner {
    state: JoystickState,
    changes: ChangeMask,
}

/// Tracks the state of a joystick-like device (anything with buttons and absolute axes).
///
/// Created with [`JoystickFilter::new`], which registers the filter as a listener of a
/// [`Session`]. The filter is unregistered when the returned [`Arc`] is dropped.
pub struct JoystickFilter {
    session: Arc<Session>,
    button_codes: Vec<u16>,
    axis_codes: Vec<u16>,
    button_index: HashMap<u16, usize>,
    axis_index: HashMap<u16, usize>,
    inner: Mutex<Inner>,
    listeners: Listeners<dyn JoystickListener>,
}

impl fmt::Debug for JoystickFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoystickFilter")
            .field("device", &self.session.path())
            .field("button_codes", &self.button_codes)
            .field("axis_codes", &self.axis_codes)
            .field("state", &self.state())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl JoystickFilter {
    /// Opens the event device at `path` and starts tracking its state.
    ///
    /// # Errors
    ///
    /// Fails if the [`Session`] can't be opened (see [`Session::open`]).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>, Error> {
        let session = Arc::new(Session::open(path)?);
        Ok(Self::new(&session))
    }

    /// Creates a filter tracking the buttons and axes `session`'s device advertises, and registers
    /// it with `session`.
    ///
    /// The button and axis layout is fixed at this point. Events for codes the device did not
    /// advertise are logged and ignored.
    pub fn new(session: &Arc<Session>) -> Arc<Self> {
        let caps = session.supported_events();
        let button_codes = caps.codes(EventType::KEY).to_vec();
        let axis_codes = caps.codes(EventType::ABS).to_vec();
        log::debug!(
            "'{}': detected {} buttons and {} axes",
            session.path().display(),
            button_codes.len(),
            axis_codes.len(),
        );

        let this = Arc::new(Self {
            session: session.clone(),
            button_index: dense_indices(&button_codes),
            axis_index: dense_indices(&axis_codes),
            inner: Mutex::new(Inner {
                state: JoystickState::new(button_codes.len(), axis_codes.len()),
                changes: ChangeMask::new(button_codes.len(), axis_codes.len()),
            }),
            button_codes,
            axis_codes,
            listeners: Listeners::new(),
        });
        session.add_listener(&this);
        this
    }

    /// Registers `listener` for change notifications.
    ///
    /// Only a weak reference is kept. Registering the same listener again has no effect.
    pub fn add_listener<L: JoystickListener>(&self, listener: &Arc<L>) {
        let listener: Arc<dyn JoystickListener> = listener.clone();
        self.listeners.add(&listener);
    }

    /// Unregisters `listener`. Does nothing if it isn't registered.
    pub fn remove_listener<L: JoystickListener>(&self, listener: &Arc<L>) {
        let listener: Arc<dyn JoystickListener> = listener.clone();
        self.listeners.remove(&listener);
    }

    /// Returns a snapshot of the current button and axis values.
    ///
    /// Events of an input frame are applied one at a time, so the snapshot may contain a frame
    /// that is only partially applied. Listeners always get complete frames.
    pub fn state(&self) -> JoystickState {
        self.lock().state.clone()
    }

    /// Returns the changes that have been applied since the last `EV_SYN` event.
    pub fn pending_changes(&self) -> ChangeMask {
        self.lock().changes.clone()
    }

    #[inline]
    pub fn button_count(&self) -> usize {
        self.button_codes.len()
    }

    #[inline]
    pub fn axis_count(&self) -> usize {
        self.axis_codes.len()
    }

    /// Returns the `EV_KEY` code of every button, in dense index order.
    #[inline]
    pub fn button_codes(&self) -> &[u16] {
        &self.button_codes
    }

    /// Returns the `EV_ABS` code of every axis, in dense index order.
    #[inline]
    pub fn axis_codes(&self) -> &[u16] {
        &self.axis_codes
    }

    /// Returns the dense index of the button with `EV_KEY` code `code`.
    pub fn button_index(&self, code: u16) -> Option<usize> {
        self.button_index.get(&code).copied()
    }

    /// Returns the dense index of the axis with `EV_ABS` code `code`.
    pub fn axis_index(&self, code: u16) -> Option<usize> {
        self.axis_index.get(&code).copied()
    }

    /// Returns the session this filter listens to.
    #[inline]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Closes the underlying [`Session`].
    ///
    /// See [`Session::close`].
    pub fn close(&self) -> Result<(), Error> {
        self.session.close()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unmapped(&self, event_type: EventType, code: u16) {
        log::warn!(
            "{} ('{}'); the device reported its capabilities incorrectly",
            Error::UnmappedEventCode { event_type, code },
            self.session.path().display(),
        );
    }

    /// Notifies all listeners of the buffered changes and resets them.
    fn flush(&self) {
        let (changes, state) = {
            let mut inner = self.lock();
            if !inner.changes.any_buttons() && !inner.changes.any_axes() {
                return;
            }
            let changes = inner.changes.clone();
            inner.changes.clear();
            (changes, inner.state.clone())
        };

        let device = self.session.path();
        let buttons = changes.any_buttons();
        let axes = changes.any_axes();
        self.listeners.for_each(|l| {
            if buttons {
                l.buttons_changed(changes.buttons(), &state, device);
            }
            if axes {
                l.axes_moved(changes.axes(), &state, device);
            }
        });
    }
}

impl EventListener for JoystickFilter {
    fn event(&self, event: &EventRecord) {
        match event.kind() {
            EventKind::Key { code, value } => {
                let Some(index) = self.button_index(code) else {
                    return self.unmapped(EventType::KEY, code);
                };
                let pressed = value > 0;
                let mut inner = self.lock();
                if inner.state.buttons[index] != pressed {
                    inner.state.buttons[index] = pressed;
                    inner.changes.buttons[index] = true;
                }
            }
            EventKind::Abs { axis, value } => {
                let Some(index) = self.axis_index(axis.raw()) else {
                    return self.unmapped(EventType::ABS, axis.raw());
                };
                let mut inner = self.lock();
                if inner.state.axes[index] != value {
                    inner.state.axes[index] = value;
                    inner.changes.axes[index] = true;
                }
            }
            EventKind::Syn(_) => self.flush(),
            _ => log::debug!("ignoring unrecognized event {event:?}"),
        }
    }
}

fn dense_indices(codes: &[u16]) -> HashMap<u16, usize> {
    codes
        .iter()
        .enumerate()
        .map(|(index, &code)| (code, index))
        .collect()
}
