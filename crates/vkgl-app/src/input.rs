//! Forwarding winit window events into ImGui's IO queue.

use imgui::{Io, Key, MouseButton};
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::Tab => Key::Tab,
        KeyCode::ArrowLeft => Key::LeftArrow,
        KeyCode::ArrowRight => Key::RightArrow,
        KeyCode::ArrowUp => Key::UpArrow,
        KeyCode::ArrowDown => Key::DownArrow,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Insert => Key::Insert,
        KeyCode::Delete => Key::Delete,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Space => Key::Space,
        KeyCode::Enter => Key::Enter,
        KeyCode::Escape => Key::Escape,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,
        _ => return None,
    })
}

fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    Some(match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        winit::event::MouseButton::Back => MouseButton::Extra1,
        winit::event::MouseButton::Forward => MouseButton::Extra2,
        winit::event::MouseButton::Other(_) => return None,
    })
}

fn set_modifiers(io: &mut Io, mods: ModifiersState) {
    io.add_key_event(Key::ModCtrl, mods.control_key());
    io.add_key_event(Key::ModShift, mods.shift_key());
    io.add_key_event(Key::ModAlt, mods.alt_key());
    io.add_key_event(Key::ModSuper, mods.super_key());
}

fn handle_key(io: &mut Io, event: &KeyEvent) {
    let pressed = event.state == ElementState::Pressed;
    if let PhysicalKey::Code(code) = event.physical_key {
        if let Some(key) = map_key(code) {
            io.add_key_event(key, pressed);
        }
    }
    if pressed {
        if let Some(text) = &event.text {
            for c in text.chars().filter(|c| !c.is_control()) {
                io.add_input_character(c);
            }
        }
    }
}

/// Feed one window event to ImGui.
///
/// `scale_factor` converts physical cursor positions into the logical
/// coordinates ImGui lays out in.
pub fn handle_window_event(io: &mut Io, event: &WindowEvent, scale_factor: f64) {
    match event {
        WindowEvent::CursorMoved { position, .. } => {
            let logical = position.to_logical::<f32>(scale_factor);
            io.add_mouse_pos_event([logical.x, logical.y]);
        }
        WindowEvent::CursorLeft { .. } => {
            io.add_mouse_pos_event([f32::MAX, f32::MAX]);
        }
        WindowEvent::MouseInput { state, button, .. } => {
            if let Some(button) = map_button(*button) {
                io.add_mouse_button_event(button, *state == ElementState::Pressed);
            }
        }
        WindowEvent::MouseWheel { delta, .. } => match delta {
            MouseScrollDelta::LineDelta(x, y) => io.add_mouse_wheel_event([*x, *y]),
            MouseScrollDelta::PixelDelta(pos) => {
                let logical = pos.to_logical::<f32>(scale_factor);
                io.add_mouse_wheel_event([logical.x / 20.0, logical.y / 20.0]);
            }
        },
        WindowEvent::ModifiersChanged(mods) => set_modifiers(io, mods.state()),
        WindowEvent::KeyboardInput { event, .. } => handle_key(io, event),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_keys_are_mapped() {
        assert_eq!(map_key(KeyCode::Backspace), Some(Key::Backspace));
        assert_eq!(map_key(KeyCode::KeyV), Some(Key::V));
        assert_eq!(map_key(KeyCode::F13), None);
    }

    #[test]
    fn only_standard_buttons_are_mapped() {
        assert_eq!(map_button(winit::event::MouseButton::Left), Some(MouseButton::Left));
        assert_eq!(map_button(winit::event::MouseButton::Other(7)), None);
    }
}
