use crate::{AppState, ConnectionStatus, Effect, LifecycleAction, Msg, View};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::StatusViewMounted => {
            if state.current_view() == View::Status && state.open_status_channel() {
                state.set_status(ConnectionStatus::Disconnected);
                vec![Effect::OpenStatusChannel]
            } else {
                Vec::new()
            }
        }
        Msg::StatusChannelOpened => {
            // The badge stays red until the pipeline says `start`.
            state.set_status(ConnectionStatus::Disconnected);
            Vec::new()
        }
        Msg::StatusChannelClosed => {
            state.release_status_channel();
            state.set_status(ConnectionStatus::Disconnected);
            Vec::new()
        }
        Msg::Lifecycle {
            action,
            page_number,
        } => apply_lifecycle(&mut state, action, page_number),
        Msg::DraftChanged(text) => {
            state.set_draft(text);
            Vec::new()
        }
        Msg::QuerySubmitted => {
            if state.current_view() != View::Chat
                || state.is_sending()
                || state.draft().trim().is_empty()
            {
                return (state, Vec::new());
            }
            let query = state.take_draft();
            let (send_id, history) = state.begin_send(&query);
            vec![Effect::SendQuery {
                send_id,
                query,
                history,
            }]
        }
        Msg::CancelRequested => match state.pending_send_id() {
            Some(send_id) => vec![Effect::CancelQuery { send_id }],
            None => Vec::new(),
        },
        Msg::SourceImagesReceived { send_id, images } => {
            state.replace_source_images(send_id, images);
            Vec::new()
        }
        Msg::ResponseDelta { send_id, content } => {
            state.append_delta(send_id, &content);
            Vec::new()
        }
        Msg::ReplyFinished { send_id } => {
            state.commit_reply(send_id);
            Vec::new()
        }
        Msg::ReplyFailed { send_id } => {
            state.fail_reply(send_id);
            Vec::new()
        }
        Msg::ReplyCancelled { send_id } => {
            state.drop_reply(send_id);
            Vec::new()
        }
        Msg::QuitRequested => {
            let mut effects = Vec::with_capacity(3);
            if let Some(send_id) = state.pending_send_id() {
                effects.push(Effect::CancelQuery { send_id });
            }
            if state.release_status_channel() {
                effects.push(Effect::CloseStatusChannel);
            }
            effects.push(Effect::Exit);
            effects
        }
    };

    (state, effects)
}

fn apply_lifecycle(
    state: &mut AppState,
    action: LifecycleAction,
    page_number: Option<u32>,
) -> Vec<Effect> {
    // Nothing leaves `Finished` within a session.
    if state.connection_status() == ConnectionStatus::Finished {
        return Vec::new();
    }

    match action {
        LifecycleAction::Start => {
            state.set_status(ConnectionStatus::Connected);
            Vec::new()
        }
        LifecycleAction::Scanning => {
            state.set_status(ConnectionStatus::Scanning);
            state.set_page(page_number);
            Vec::new()
        }
        LifecycleAction::Processing => {
            state.set_status(ConnectionStatus::Processing);
            state.set_page(page_number);
            Vec::new()
        }
        LifecycleAction::End => {
            state.set_status(ConnectionStatus::Finished);
            if !state.claim_navigation() {
                return Vec::new();
            }
            let mut effects = Vec::with_capacity(2);
            if state.release_status_channel() {
                effects.push(Effect::CloseStatusChannel);
            }
            state.set_view(View::Chat);
            effects.push(Effect::NavigateTo(View::Chat));
            effects
        }
        LifecycleAction::Unrecognized(_) => Vec::new(),
    }
}
