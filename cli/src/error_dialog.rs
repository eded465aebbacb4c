use native_dialog::{DialogBuilder, MessageLevel};
use vaporwave_core::VaporwaveFatalError;

/// Show an error dialog for a fatal error
pub fn show_error(error: &VaporwaveFatalError) {
    let title = match error {
        VaporwaveFatalError::Config(_) => "Vaporwave Config Error",
        VaporwaveFatalError::Render(_) => "Vaporwave Shader Error",
        VaporwaveFatalError::Platform(_) | VaporwaveFatalError::Error(_) => "Vaporwave Error",
    };
    let message = error.to_string();

    let _ = DialogBuilder::message()
        .set_level(MessageLevel::Error)
        .set_title(title)
        .set_text(&message)
        .alert()
        .show();
}
