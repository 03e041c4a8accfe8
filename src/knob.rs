//! A [`Knob`] is one two-axis control: thrust & yaw on one side, pitch &
//! roll on the other. Its value always lies in the closed disk of the knob's
//! radius.

use std::fmt;

/// Called with the freshly stored value every time a knob is written, so the
/// presentation layer can schedule a redraw without the core knowing about it.
pub type RedrawHook = Box<dyn FnMut(KnobValue) + Send>;

/// The position of a knob's indicator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KnobValue {
    pub x: f64,
    pub y: f64,
}

impl KnobValue {
    /// The resting position.
    pub const ORIGIN: KnobValue = KnobValue { x: 0.0, y: 0.0 };

    /// Builds a value from its two coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance from the origin.
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// A two-axis control clamped to a disk.
pub struct Knob {
    radius: f64,
    value: KnobValue,
    redraw: Option<RedrawHook>,
}

impl Knob {
    /// A knob resting at the origin.
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            value: KnobValue::ORIGIN,
            redraw: None,
        }
    }

    /// Registers the hook that is told about every stored value.
    pub fn set_redraw_hook(&mut self, hook: RedrawHook) {
        self.redraw = Some(hook);
    }

    /// Stores a new position, projecting it back onto the rim if it falls
    /// outside the disk.
    ///
    /// Pointer events that land outside the widget carry no coordinates, so a
    /// missing (or non-finite) coordinate leaves the knob untouched. Returns
    /// whether a value was stored.
    pub fn set(&mut self, x: Option<f64>, y: Option<f64>) -> bool {
        let (Some(mut x), Some(mut y)) = (x, y) else {
            return false;
        };
        if !x.is_finite() || !y.is_finite() {
            return false;
        }

        let r = x.hypot(y);
        if r > self.radius {
            x = x * self.radius / r;
            y = y * self.radius / r;
        }
        self.value = KnobValue { x, y };

        if let Some(redraw) = self.redraw.as_mut() {
            redraw(self.value);
        }
        true
    }

    /// Puts the knob back at the origin.
    pub fn reset(&mut self) {
        self.set(Some(0.0), Some(0.0));
    }

    pub fn value(&self) -> KnobValue {
        self.value
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl fmt::Debug for Knob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Knob")
            .field("radius", &self.radius)
            .field("value", &self.value)
            .field("redraw", &self.redraw.is_some())
            .finish()
    }
}
