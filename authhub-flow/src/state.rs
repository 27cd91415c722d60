use authhub_session::SessionData;

/// Check `presented` against the session's pending CSRF token.
///
/// The pending token is removed before the comparison, so it can be checked at most once.
/// A missing pending token, a missing presented value and a mismatch all return `false`.
pub fn verify_state(session: &mut SessionData, presented: Option<&str>) -> bool {
    let pending = session.take_pending_state();
    match (pending, presented) {
        (Some(expected), Some(presented)) => expected == presented,
        _ => false,
    }
}
