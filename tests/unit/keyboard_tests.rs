//! Unit tests for terminal key translation.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags};

use sim_teleop::keyboard::{enhancement_flags, key_input, KeyInput, KEY_UP};

fn key(id: &str) -> KeyInput {
    KeyInput::Key(id.to_owned())
}

#[test]
fn printable_characters_keep_case() {
    let lower = KeyEvent::new(KeyCode::Char('i'), KeyModifiers::NONE);
    let upper = KeyEvent::new(KeyCode::Char('I'), KeyModifiers::SHIFT);

    assert_eq!(key_input(&lower), key("i"));
    assert_eq!(key_input(&upper), key("I"));
}

#[test]
fn punctuation_maps_to_itself() {
    for c in [',', '.', '<', '>'] {
        let event = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
        assert_eq!(key_input(&event), key(&c.to_string()));
    }
}

#[test]
fn named_keys_use_browser_style_names() {
    let cases = [
        (KeyCode::Esc, "Escape"),
        (KeyCode::Up, "ArrowUp"),
        (KeyCode::Left, "ArrowLeft"),
        (KeyCode::Enter, "Enter"),
        (KeyCode::F(5), "F5"),
    ];

    for (code, expected) in cases {
        let event = KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(key_input(&event), key(expected));
    }
}

#[test]
fn key_release_reports_key_up() {
    let event = KeyEvent::new_with_kind(
        KeyCode::Char('i'),
        KeyModifiers::NONE,
        KeyEventKind::Release,
    );

    assert_eq!(key_input(&event), key(KEY_UP));
}

#[test]
fn release_reporting_is_requested_from_terminal() {
    let flags = enhancement_flags();

    assert!(flags.contains(KeyboardEnhancementFlags::REPORT_EVENT_TYPES));
    assert!(flags.contains(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES));
}

#[test]
fn key_repeat_keeps_the_key() {
    let event = KeyEvent::new_with_kind(
        KeyCode::Char('i'),
        KeyModifiers::NONE,
        KeyEventKind::Repeat,
    );

    assert_eq!(key_input(&event), key("i"));
}

#[test]
fn ctrl_c_quits() {
    let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
    let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);

    assert_eq!(key_input(&ctrl_c), KeyInput::Quit);
    assert_eq!(key_input(&ctrl_d), KeyInput::Quit);
}

#[test]
fn plain_c_is_a_key() {
    let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);

    assert_eq!(key_input(&event), key("c"));
}
