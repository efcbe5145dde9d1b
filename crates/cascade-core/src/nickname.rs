//! Nickname registry: one display name per address, one address per name.

use serde_json::Value;
use tracing::debug;

use crate::error::{CascadeError, NicknameError};
use crate::state::{StagedState, StateStore};
use crate::types::{Address, Response};

/// Give `caller` the nickname carried in `value`, releasing its previous one.
pub fn set_nickname<S: StateStore + ?Sized>(
    state: &mut StagedState<'_, S>,
    caller: &Address,
    value: &Value,
) -> Result<Response, CascadeError> {
    let name = value.as_str().ok_or(NicknameError::NotAString)?;

    match state.nickname_owner(name)? {
        Some(owner) if &owner != caller => {
            return Err(NicknameError::Taken(name.to_string()).into());
        }
        Some(_) => {}
        None => {
            if let Some(previous) = state.nickname(caller)? {
                state.release_nickname(&previous);
            }
            state.assign_nickname(caller, name);
            debug!(address = %caller, nickname = name, "nickname assigned");
        }
    }

    Ok(Response::new(format!("Nickname changed to {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use serde_json::json;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn assigns_and_replaces() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        let a = addr("A");

        let resp = set_nickname(&mut staged, &a, &json!("neo")).unwrap();
        assert_eq!(resp.message, "Nickname changed to neo");

        set_nickname(&mut staged, &a, &json!("trinity")).unwrap();
        assert_eq!(staged.nickname(&a).unwrap().as_deref(), Some("trinity"));
        assert_eq!(staged.nickname_owner("neo").unwrap(), None);
        assert_eq!(staged.nickname_owner("trinity").unwrap(), Some(a));
    }

    #[test]
    fn taken_name_rejected() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        set_nickname(&mut staged, &addr("A"), &json!("neo")).unwrap();

        let err = set_nickname(&mut staged, &addr("B"), &json!("neo")).unwrap_err();
        assert_eq!(err.to_string(), "Nickname neo is already taken");
        assert_eq!(staged.nickname(&addr("B")).unwrap(), None);
    }

    #[test]
    fn released_name_is_free_again() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        set_nickname(&mut staged, &addr("A"), &json!("neo")).unwrap();
        set_nickname(&mut staged, &addr("A"), &json!("smith")).unwrap();
        set_nickname(&mut staged, &addr("B"), &json!("neo")).unwrap();
        assert_eq!(staged.nickname_owner("neo").unwrap(), Some(addr("B")));
    }

    #[test]
    fn resetting_own_name_is_a_no_op() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        set_nickname(&mut staged, &addr("A"), &json!("neo")).unwrap();
        let before = staged.pending();
        set_nickname(&mut staged, &addr("A"), &json!("neo")).unwrap();
        assert_eq!(staged.pending(), before);
        assert_eq!(staged.nickname_owner("neo").unwrap(), Some(addr("A")));
    }

    #[test]
    fn non_string_rejected() {
        let store = MemoryStateStore::new();
        let mut staged = StagedState::new(&store);
        for value in [json!(1), json!(null), json!({"a": 1})] {
            let err = set_nickname(&mut staged, &addr("A"), &value).unwrap_err();
            assert_eq!(err.to_string(), "Nickname is not a string");
        }
    }
}
