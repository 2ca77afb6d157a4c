/// Screen the UI layer is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Dashboard,
    Profile,
    Focus,
}

/// Which learner and group the UI is looking at.
///
/// Values are immutable; [`transition`] returns the next state for an event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationState {
    pub view: View,
    pub active_user: Option<String>,
    pub active_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    SignedIn(String),
    SignedOut,
    OpenProfile,
    OpenGroup(String),
    BackToDashboard,
}

/// Apply one UI event.
///
/// Events that need a signed-in learner are ignored without one.
#[must_use]
pub fn transition(state: &NavigationState, event: NavEvent) -> NavigationState {
    match event {
        NavEvent::SignedIn(user) => NavigationState {
            view: View::Dashboard,
            active_user: Some(user),
            active_group: None,
        },
        NavEvent::SignedOut => NavigationState::default(),
        NavEvent::OpenProfile if state.active_user.is_some() => NavigationState {
            view: View::Profile,
            active_user: state.active_user.clone(),
            active_group: None,
        },
        NavEvent::OpenGroup(group) if state.active_user.is_some() => NavigationState {
            view: View::Focus,
            active_user: state.active_user.clone(),
            active_group: Some(group),
        },
        NavEvent::BackToDashboard => NavigationState {
            view: View::Dashboard,
            active_user: state.active_user.clone(),
            active_group: None,
        },
        NavEvent::OpenProfile | NavEvent::OpenGroup(_) => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_then_focus_then_back() {
        let start = NavigationState::default();
        let signed_in = transition(&start, NavEvent::SignedIn("Alice".into()));
        assert_eq!(signed_in.view, View::Dashboard);
        assert_eq!(signed_in.active_user.as_deref(), Some("Alice"));

        let focused = transition(&signed_in, NavEvent::OpenGroup("Cardiology".into()));
        assert_eq!(focused.view, View::Focus);
        assert_eq!(focused.active_group.as_deref(), Some("Cardiology"));

        let back = transition(&focused, NavEvent::BackToDashboard);
        assert_eq!(back, signed_in);
        // the input state is untouched
        assert_eq!(focused.view, View::Focus);
    }

    #[test]
    fn anonymous_cannot_open_profile_or_group() {
        let start = NavigationState::default();
        assert_eq!(transition(&start, NavEvent::OpenProfile), start);
        assert_eq!(transition(&start, NavEvent::OpenGroup("X".into())), start);
    }

    #[test]
    fn profile_clears_group_and_sign_out_resets() {
        let state = NavigationState {
            view: View::Focus,
            active_user: Some("Bob".into()),
            active_group: Some("Surgery".into()),
        };
        let profile = transition(&state, NavEvent::OpenProfile);
        assert_eq!(profile.view, View::Profile);
        assert_eq!(profile.active_group, None);
        assert_eq!(transition(&profile, NavEvent::SignedOut), NavigationState::default());
    }
}
