#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use pairlink_session::{
    ChannelBuilder, ChannelConfig, ColorPayload, ExchangeError, LinkConfig, PeerChannel,
    SessionState, SocketSession,
};

const WAIT: Duration = Duration::from_secs(5);

fn socket_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pairlink-it-{}-{name}.sock", std::process::id()))
}

fn open(session: SocketSession, name: &str) -> PeerChannel<SocketSession> {
    ChannelBuilder::new(session)
        .with_config(ChannelConfig::default().with_name(name).with_send_timeout(WAIT))
        .open()
        .unwrap()
}

#[test]
fn color_travels_over_the_socket() {
    let path = socket_path("color");
    let display = open(
        SocketSession::listen(&path, LinkConfig::default()).unwrap(),
        "socket-display",
    );
    let picker = open(
        SocketSession::connect(&path, LinkConfig::default()),
        "socket-picker",
    );
    assert!(picker.wait_for_state(SessionState::ActivatedReachable, WAIT));
    assert!(display.wait_for_state(SessionState::ActivatedReachable, WAIT));

    let blue = ColorPayload::new("藍色", 0.0, 0.478, 1.0, 1.0);
    let reply = picker.send(&blue).unwrap();
    assert!(reply.is_success());
    assert_eq!(display.ui_state().unwrap().current_color, blue);
}

#[test]
fn display_goes_unreachable_when_picker_leaves() {
    let path = socket_path("leave");
    let display = open(
        SocketSession::listen(&path, LinkConfig::default()).unwrap(),
        "socket-leave-display",
    );
    let picker = open(
        SocketSession::connect(&path, LinkConfig::default()),
        "socket-leave-picker",
    );
    assert!(display.wait_for_state(SessionState::ActivatedReachable, WAIT));

    drop(picker);
    assert!(display.wait_for_state(SessionState::ActivatedUnreachable, WAIT));
    assert!(display.is_connected());

    let again = open(
        SocketSession::connect(&path, LinkConfig::default()),
        "socket-leave-picker-2",
    );
    assert!(display.wait_for_state(SessionState::ActivatedReachable, WAIT));
    assert!(again.wait_for_state(SessionState::ActivatedReachable, WAIT));
}

#[test]
fn picker_without_display_cannot_send() {
    let path = socket_path("absent");
    let picker = open(
        SocketSession::connect(&path, LinkConfig::default()),
        "socket-absent-picker",
    );
    assert!(picker.wait_for_state(SessionState::Activating, WAIT));
    assert!(matches!(
        picker.send(&ColorPayload::placeholder()),
        Err(ExchangeError::PeerUnreachable)
    ));
}

#[test]
fn display_without_companion_app_is_inactive() {
    let path = socket_path("no-app");
    let display = open(
        SocketSession::listen(&path, LinkConfig::default()).unwrap(),
        "socket-no-app-display",
    );
    let _picker = open(
        SocketSession::connect(&path, LinkConfig::default().with_app_installed(false)),
        "socket-no-app-picker",
    );
    assert!(display.wait_for_state(SessionState::Inactive, WAIT));
}

#[test]
fn display_follows_each_pickers_install_state() {
    let path = socket_path("reinstall");
    let display = open(
        SocketSession::listen(&path, LinkConfig::default()).unwrap(),
        "socket-reinstall-display",
    );

    let without_app = open(
        SocketSession::connect(&path, LinkConfig::default().with_app_installed(false)),
        "socket-reinstall-picker-1",
    );
    assert!(display.wait_for_state(SessionState::Inactive, WAIT));
    drop(without_app);

    let with_app = open(
        SocketSession::connect(&path, LinkConfig::default()),
        "socket-reinstall-picker-2",
    );
    assert!(display.wait_for_state(SessionState::ActivatedReachable, WAIT));
    assert!(with_app.wait_for_state(SessionState::ActivatedReachable, WAIT));
    drop(with_app);
    assert!(display.wait_for_state(SessionState::ActivatedUnreachable, WAIT));

    let _without_again = open(
        SocketSession::connect(&path, LinkConfig::default().with_app_installed(false)),
        "socket-reinstall-picker-3",
    );
    assert!(display.wait_for_state(SessionState::Inactive, WAIT));
    let ui = display
        .sink()
        .wait_for(WAIT, |ui| !ui.companion_installed)
        .unwrap();
    assert_eq!(ui.status_text, "peer has no companion app installed");
    assert!(!display.wait_for_state(SessionState::ActivatedReachable, Duration::from_millis(500)));
}
