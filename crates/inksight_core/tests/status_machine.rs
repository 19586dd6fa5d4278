use std::sync::Once;

use inksight_core::{update, AppState, ConnectionStatus, Effect, LifecycleAction, Msg, View};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(inksight_logging::initialize_for_tests);
}

fn lifecycle(action: LifecycleAction, page_number: Option<u32>) -> Msg {
    Msg::Lifecycle {
        action,
        page_number,
    }
}

fn mounted() -> AppState {
    let (state, effects) = update(AppState::new(), Msg::StatusViewMounted);
    assert_eq!(effects, vec![Effect::OpenStatusChannel]);
    let (state, _) = update(state, Msg::StatusChannelOpened);
    state
}

fn apply_all(state: AppState, msgs: Vec<Msg>) -> (AppState, Vec<Effect>) {
    msgs.into_iter()
        .fold((state, Vec::new()), |(state, mut all), msg| {
            let (state, effects) = update(state, msg);
            all.extend(effects);
            (state, all)
        })
}

#[test]
fn opening_the_channel_does_not_mark_connected() {
    init_logging();
    let state = mounted();

    assert_eq!(state.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(state.current_page(), 1);
    assert!(state.status_channel_open());
}

#[test]
fn mounting_twice_opens_one_channel() {
    init_logging();
    let state = mounted();
    let (_state, effects) = update(state, Msg::StatusViewMounted);

    assert!(effects.is_empty());
}

#[test]
fn transition_table_applies_left_to_right() {
    init_logging();
    let cases = vec![
        (lifecycle(LifecycleAction::Start, None), ConnectionStatus::Connected),
        (lifecycle(LifecycleAction::Scanning, Some(1)), ConnectionStatus::Scanning),
        (lifecycle(LifecycleAction::Processing, Some(1)), ConnectionStatus::Processing),
        (lifecycle(LifecycleAction::Scanning, Some(2)), ConnectionStatus::Scanning),
        (lifecycle(LifecycleAction::Processing, Some(2)), ConnectionStatus::Processing),
        (lifecycle(LifecycleAction::End, None), ConnectionStatus::Finished),
    ];

    let mut state = mounted();
    for (msg, expected) in cases {
        let (next, _) = update(state, msg);
        assert_eq!(next.connection_status(), expected);
        state = next;
    }
    assert_eq!(state.current_page(), 2);
}

#[test]
fn missing_page_number_keeps_counter() {
    init_logging();
    let (state, _) = apply_all(
        mounted(),
        vec![
            lifecycle(LifecycleAction::Start, None),
            lifecycle(LifecycleAction::Scanning, Some(3)),
        ],
    );
    assert_eq!(state.current_page(), 3);

    let (state, _) = update(state, lifecycle(LifecycleAction::Processing, None));
    assert_eq!(state.connection_status(), ConnectionStatus::Processing);
    assert_eq!(state.current_page(), 3);
}

#[test]
fn zero_page_number_is_ignored() {
    init_logging();
    let (state, _) = apply_all(
        mounted(),
        vec![
            lifecycle(LifecycleAction::Scanning, Some(4)),
            lifecycle(LifecycleAction::Scanning, Some(0)),
        ],
    );

    assert_eq!(state.current_page(), 4);
}

#[test]
fn unrecognized_actions_are_ignored() {
    init_logging();
    let (mut state, _) = update(mounted(), lifecycle(LifecycleAction::Start, None));
    assert!(state.consume_dirty());

    let (mut next, effects) = update(
        state,
        lifecycle(LifecycleAction::Unrecognized("calibrating".into()), Some(9)),
    );

    assert!(effects.is_empty());
    assert_eq!(next.connection_status(), ConnectionStatus::Connected);
    assert_eq!(next.current_page(), 1);
    assert!(!next.consume_dirty());
}

#[test]
fn end_navigates_once_and_releases_the_channel() {
    init_logging();
    let (state, effects) = apply_all(
        mounted(),
        vec![
            lifecycle(LifecycleAction::Start, None),
            lifecycle(LifecycleAction::Scanning, Some(1)),
            lifecycle(LifecycleAction::End, None),
        ],
    );

    assert_eq!(
        effects,
        vec![Effect::CloseStatusChannel, Effect::NavigateTo(View::Chat)]
    );
    assert_eq!(state.current_view(), View::Chat);
    assert!(!state.status_channel_open());

    let (state, effects) = apply_all(
        state,
        vec![
            lifecycle(LifecycleAction::End, None),
            lifecycle(LifecycleAction::Scanning, Some(5)),
            lifecycle(LifecycleAction::End, None),
        ],
    );
    assert!(effects.is_empty());
    assert_eq!(state.connection_status(), ConnectionStatus::Finished);
    assert_eq!(state.current_page(), 1);
}

#[test]
fn end_after_close_does_not_navigate_again() {
    init_logging();
    let (state, _) = update(mounted(), lifecycle(LifecycleAction::End, None));
    let (state, _) = update(state, Msg::StatusChannelClosed);
    assert_eq!(state.connection_status(), ConnectionStatus::Disconnected);

    let (state, effects) = update(state, lifecycle(LifecycleAction::End, None));
    assert!(effects.is_empty());
    assert_eq!(state.connection_status(), ConnectionStatus::Finished);
}

#[test]
fn close_from_any_state_disconnects() {
    init_logging();
    for action in [
        LifecycleAction::Start,
        LifecycleAction::Scanning,
        LifecycleAction::Processing,
    ] {
        let (state, _) = update(mounted(), lifecycle(action, Some(2)));
        let (state, effects) = update(state, Msg::StatusChannelClosed);

        assert!(effects.is_empty());
        assert_eq!(state.connection_status(), ConnectionStatus::Disconnected);
        assert!(!state.status_channel_open());
    }
}

#[test]
fn quit_closes_an_open_channel_exactly_once() {
    init_logging();
    let (state, effects) = update(mounted(), Msg::QuitRequested);
    assert_eq!(effects, vec![Effect::CloseStatusChannel, Effect::Exit]);

    let (_state, effects) = update(state, Msg::QuitRequested);
    assert_eq!(effects, vec![Effect::Exit]);
}

#[test]
fn quit_after_remote_close_does_not_close_again() {
    init_logging();
    let (state, _) = update(mounted(), Msg::StatusChannelClosed);
    let (_state, effects) = update(state, Msg::QuitRequested);

    assert_eq!(effects, vec![Effect::Exit]);
}

#[test]
fn chat_first_sessions_never_open_the_channel() {
    init_logging();
    let (state, effects) = update(AppState::starting_on(View::Chat), Msg::StatusViewMounted);

    assert!(effects.is_empty());
    assert!(!state.status_channel_open());
}
