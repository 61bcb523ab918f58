//! Surfacing error envelopes in a form.
//!
//! Forms show `message` as a banner and the first entry of `errors[field]`
//! under the matching input. `handled_api_error` does both so every form
//! reacts to failures the same way.

use crate::response::ApiResponse;

/// What a form exposes for reporting a failed submission.
pub trait FormFeedback {
    fn set_alert(&mut self, message: &str);
    fn set_field_error(&mut self, field: &str, message: &str);
}

/// Report `response` to `form` if it is an error. Returns whether it was,
/// so callers can bail out of their success path.
pub fn handled_api_error(response: &ApiResponse, form: &mut impl FormFeedback) -> bool {
    if !response.is_error() {
        return false;
    }
    if let Some(message) = response.message() {
        form.set_alert(message);
    }
    for (field, message) in response.field_errors() {
        form.set_field_error(&field, &message);
    }
    true
}
