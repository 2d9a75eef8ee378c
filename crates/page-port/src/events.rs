use std::fmt;

/// Synthetic DOM events the engine dispatches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DomEvent {
    PointerDown,
    MouseDown,
    PointerUp,
    MouseUp,
    Click,
    Input,
    Change,
    Focus,
    Blur,
    KeyDown(String),
    KeyUp(String),
}

impl DomEvent {
    /// DOM event type name.
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::PointerDown => "pointerdown",
            DomEvent::MouseDown => "mousedown",
            DomEvent::PointerUp => "pointerup",
            DomEvent::MouseUp => "mouseup",
            DomEvent::Click => "click",
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::Focus => "focus",
            DomEvent::Blur => "blur",
            DomEvent::KeyDown(_) => "keydown",
            DomEvent::KeyUp(_) => "keyup",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            DomEvent::KeyDown(key) | DomEvent::KeyUp(key) => Some(key.as_str()),
            _ => None,
        }
    }

    /// Constructor family used when building the event page-side.
    pub fn interface(&self) -> &'static str {
        match self {
            DomEvent::PointerDown | DomEvent::PointerUp => "PointerEvent",
            DomEvent::MouseDown | DomEvent::MouseUp | DomEvent::Click => "MouseEvent",
            DomEvent::KeyDown(_) | DomEvent::KeyUp(_) => "KeyboardEvent",
            DomEvent::Focus | DomEvent::Blur => "FocusEvent",
            DomEvent::Input | DomEvent::Change => "Event",
        }
    }
}

impl fmt::Display for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => write!(f, "{}({:?})", self.name(), key),
            None => f.write_str(self.name()),
        }
    }
}
