//! Authentication state machine using rust-fsm.
//!
//! ```text
//! Initial ──Start──► Loading ──Resolved──► Authenticated ──Expire──► SessionExpired
//!                     │  ├──NoSession──► Unauthenticated                 │
//!                     │  └──Failed─────► Error ──Clear──► Unauthenticated ◄┘ Clear
//!
//! Authenticated / Unauthenticated / Error / SessionExpired ──Start──► Loading
//! ```
//!
//! Logging out of an authenticated session runs `Start` then `NoSession`, so
//! observers see `Loading` while revocation is in flight.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Initial)

    Initial => {
        Start => Loading
    },
    Loading => {
        Resolved => Authenticated,
        NoSession => Unauthenticated,
        Failed => Error
    },
    Authenticated => {
        Start => Loading,
        Expire => SessionExpired
    },
    Unauthenticated => {
        Start => Loading
    },
    Error => {
        Start => Loading,
        Clear => Unauthenticated
    },
    SessionExpired => {
        Start => Loading,
        Clear => Unauthenticated
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Public view of the FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Initial,
    Loading,
    Authenticated,
    Unauthenticated,
    Error,
    SessionExpired,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Initial => "initial",
            AuthState::Loading => "loading",
            AuthState::Authenticated => "authenticated",
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Error => "error",
            AuthState::SessionExpired => "session_expired",
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Initial => AuthState::Initial,
            AuthMachineState::Loading => AuthState::Loading,
            AuthMachineState::Authenticated => AuthState::Authenticated,
            AuthMachineState::Unauthenticated => AuthState::Unauthenticated,
            AuthMachineState::Error => AuthState::Error,
            AuthMachineState::SessionExpired => AuthState::SessionExpired,
        }
    }
}

/// Broadcast on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStateChanged {
    pub state: AuthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Failure reason for `Error` and `SessionExpired`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in(inputs: &[AuthMachineInput]) -> AuthMachine {
        let mut machine = AuthMachine::new();
        for input in inputs {
            machine.consume(input).unwrap();
        }
        machine
    }

    #[test]
    fn initial_state() {
        let machine = AuthMachine::new();
        assert_eq!(*machine.state(), AuthMachineState::Initial);
    }

    #[test]
    fn resolve_to_each_outcome() {
        let machine = machine_in(&[AuthMachineInput::Start, AuthMachineInput::Resolved]);
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);

        let machine = machine_in(&[AuthMachineInput::Start, AuthMachineInput::NoSession]);
        assert_eq!(*machine.state(), AuthMachineState::Unauthenticated);

        let machine = machine_in(&[AuthMachineInput::Start, AuthMachineInput::Failed]);
        assert_eq!(*machine.state(), AuthMachineState::Error);
    }

    #[test]
    fn expiry_and_clear() {
        let mut machine = machine_in(&[
            AuthMachineInput::Start,
            AuthMachineInput::Resolved,
            AuthMachineInput::Expire,
        ]);
        assert_eq!(*machine.state(), AuthMachineState::SessionExpired);

        machine.consume(&AuthMachineInput::Clear).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Unauthenticated);
    }

    #[test]
    fn every_settled_state_can_restart() {
        for path in [
            vec![AuthMachineInput::Start, AuthMachineInput::Resolved],
            vec![AuthMachineInput::Start, AuthMachineInput::NoSession],
            vec![AuthMachineInput::Start, AuthMachineInput::Failed],
            vec![
                AuthMachineInput::Start,
                AuthMachineInput::Resolved,
                AuthMachineInput::Expire,
            ],
        ] {
            let mut machine = machine_in(&path);
            machine.consume(&AuthMachineInput::Start).unwrap();
            assert_eq!(*machine.state(), AuthMachineState::Loading);
        }
    }

    #[test]
    fn impossible_transitions_are_rejected() {
        let mut machine = AuthMachine::new();
        assert!(machine.consume(&AuthMachineInput::Resolved).is_err());
        assert!(machine.consume(&AuthMachineInput::Clear).is_err());

        machine.consume(&AuthMachineInput::Start).unwrap();
        assert!(machine.consume(&AuthMachineInput::Start).is_err());
        assert!(machine.consume(&AuthMachineInput::Expire).is_err());

        machine.consume(&AuthMachineInput::Resolved).unwrap();
        assert!(machine.consume(&AuthMachineInput::Clear).is_err());
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&AuthState::SessionExpired).unwrap();
        assert_eq!(json, "\"session_expired\"");
        assert_eq!(AuthState::from(&AuthMachineState::Loading), AuthState::Loading);
    }
}
