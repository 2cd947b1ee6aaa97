//! Input abstraction layer.
//!
//! Normalizes raw pointer events from the window shell into the pointer
//! events pick resolution works with: select, drag, drag-end, click, and
//! passive hover. The shell stamps each event with a millisecond clock.

use rsg_core::DragChannel;
use rsg_pick::MouseEventKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// A raw pointer event from the window shell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown {
        x: f32,
        y: f32,
        button: MouseButton,
        ctrl: bool,
        time_ms: u64,
    },

    /// Pointer moved, with or without a button held.
    PointerMove { x: f32, y: f32, time_ms: u64 },

    PointerUp {
        x: f32,
        y: f32,
        button: MouseButton,
        time_ms: u64,
    },
}

impl InputEvent {
    pub fn position(&self) -> (f32, f32) {
        match *self {
            Self::PointerDown { x, y, .. } | Self::PointerMove { x, y, .. } | Self::PointerUp { x, y, .. } => (x, y),
        }
    }
}

/// A translated pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    /// Drag channel of the held button; `None` for hover and the middle button.
    pub channel: Option<DragChannel>,
    pub x: f32,
    pub y: f32,
    /// Motion since the previous event.
    pub dx: f32,
    pub dy: f32,
}

/// Drag channel for a button + modifier combination.
pub fn drag_channel(button: MouseButton, ctrl: bool) -> Option<DragChannel> {
    match (button, ctrl) {
        (MouseButton::Left, false) => Some(DragChannel::Left),
        (MouseButton::Left, true) => Some(DragChannel::CtrlLeft),
        (MouseButton::Right, false) => Some(DragChannel::Right),
        (MouseButton::Right, true) => Some(DragChannel::CtrlRight),
        (MouseButton::Middle, _) => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct Press {
    button: MouseButton,
    channel: Option<DragChannel>,
    x: f32,
    y: f32,
    time_ms: u64,
}

/// Turns raw pointer events into [`MouseEvent`]s.
#[derive(Debug, Clone)]
pub struct MouseTranslator {
    click_max_ms: u64,
    click_max_step_sq: f32,
    press: Option<Press>,
    last: Option<(f32, f32)>,
}

impl MouseTranslator {
    pub fn new(click_max_ms: u64, click_max_step_sq: f32) -> Self {
        Self {
            click_max_ms,
            click_max_step_sq,
            press: None,
            last: None,
        }
    }

    /// Whether a button is currently held.
    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    /// Translate one event. Returns `None` for events that mean nothing on
    /// their own: a second button going down while one is held, or a
    /// release without a matching press.
    pub fn translate(&mut self, event: &InputEvent) -> Option<MouseEvent> {
        let (x, y) = event.position();
        let (lx, ly) = self.last.unwrap_or((x, y));

        let (kind, channel) = match *event {
            InputEvent::PointerDown {
                button, ctrl, time_ms, ..
            } => {
                if self.press.is_some() {
                    return None;
                }
                let channel = drag_channel(button, ctrl);
                self.press = Some(Press {
                    button,
                    channel,
                    x,
                    y,
                    time_ms,
                });
                (MouseEventKind::Select, channel)
            }
            InputEvent::PointerMove { .. } => match self.press {
                Some(p) => (MouseEventKind::Drag, p.channel),
                None => (MouseEventKind::Over, None),
            },
            InputEvent::PointerUp { button, time_ms, .. } => {
                let p = self.press.filter(|p| p.button == button)?;
                self.press = None;
                let (sx, sy) = (x - p.x, y - p.y);
                let quick = time_ms.saturating_sub(p.time_ms) < self.click_max_ms;
                let still = sx * sx + sy * sy < self.click_max_step_sq;
                let kind = if quick && still {
                    MouseEventKind::Click
                } else {
                    MouseEventKind::DragEnd
                };
                (kind, p.channel)
            }
        };

        self.last = Some((x, y));
        log::trace!("pointer {kind:?} on {channel:?} at ({x}, {y})");
        Some(MouseEvent {
            kind,
            channel,
            x,
            y,
            dx: x - lx,
            dy: y - ly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn down(x: f32, button: MouseButton, ctrl: bool, t: u64) -> InputEvent {
        InputEvent::PointerDown {
            x,
            y: 0.0,
            button,
            ctrl,
            time_ms: t,
        }
    }

    fn up(x: f32, button: MouseButton, t: u64) -> InputEvent {
        InputEvent::PointerUp {
            x,
            y: 0.0,
            button,
            time_ms: t,
        }
    }

    fn kind(t: &mut MouseTranslator, e: InputEvent) -> Option<MouseEventKind> {
        t.translate(&e).map(|m| m.kind)
    }

    #[test]
    fn buttons_map_to_channels() {
        assert_eq!(drag_channel(MouseButton::Left, false), Some(DragChannel::Left));
        assert_eq!(drag_channel(MouseButton::Left, true), Some(DragChannel::CtrlLeft));
        assert_eq!(drag_channel(MouseButton::Right, false), Some(DragChannel::Right));
        assert_eq!(drag_channel(MouseButton::Right, true), Some(DragChannel::CtrlRight));
        assert_eq!(drag_channel(MouseButton::Middle, true), None);
    }

    #[test]
    fn quick_still_release_is_a_click() {
        let mut t = MouseTranslator::new(300, 4.0);
        assert_eq!(kind(&mut t, down(10.0, MouseButton::Left, false, 0)), Some(MouseEventKind::Select));
        assert_eq!(kind(&mut t, up(11.0, MouseButton::Left, 120)), Some(MouseEventKind::Click));
        assert!(!t.is_pressed());
    }

    #[test]
    fn slow_or_moved_release_ends_a_drag() {
        let mut t = MouseTranslator::new(300, 4.0);
        t.translate(&down(10.0, MouseButton::Left, false, 0));
        assert_eq!(kind(&mut t, up(10.0, MouseButton::Left, 300)), Some(MouseEventKind::DragEnd));

        t.translate(&down(10.0, MouseButton::Right, true, 1000));
        let end = t.translate(&up(12.0, MouseButton::Right, 1010)).unwrap();
        assert_eq!(end.kind, MouseEventKind::DragEnd);
        assert_eq!(end.channel, Some(DragChannel::CtrlRight));
    }

    #[test]
    fn moves_are_drags_while_held_and_hover_otherwise() {
        let mut t = MouseTranslator::new(300, 4.0);
        let hover = t.translate(&InputEvent::PointerMove { x: 1.0, y: 1.0, time_ms: 0 }).unwrap();
        assert_eq!((hover.kind, hover.channel), (MouseEventKind::Over, None));

        t.translate(&down(1.0, MouseButton::Left, true, 5));
        let drag = t.translate(&InputEvent::PointerMove { x: 4.0, y: 3.0, time_ms: 9 }).unwrap();
        assert_eq!(drag.kind, MouseEventKind::Drag);
        assert_eq!(drag.channel, Some(DragChannel::CtrlLeft));
        assert_eq!((drag.dx, drag.dy), (3.0, 3.0));
    }

    #[test]
    fn unmatched_buttons_are_ignored() {
        let mut t = MouseTranslator::new(300, 4.0);
        assert_eq!(kind(&mut t, up(0.0, MouseButton::Left, 0)), None);
        t.translate(&down(0.0, MouseButton::Left, false, 0));
        assert_eq!(kind(&mut t, down(0.0, MouseButton::Right, false, 1)), None);
        assert_eq!(kind(&mut t, up(0.0, MouseButton::Right, 2)), None);
        assert_eq!(kind(&mut t, up(0.0, MouseButton::Left, 3)), Some(MouseEventKind::Click));
    }
}
