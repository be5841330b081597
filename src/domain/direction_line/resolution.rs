// Which direction line belongs to which phase / action.
//
// Every resolved line is marked new: it was just reached, so it autoplays.

use crate::domain::action::Action;
use crate::domain::activity::ActivityInfo;

use super::entity::{DirectionLineParams, StepKind};

pub const INTRO_STEP_ID: &str = "intro";
pub const DIAGNOSTIC_STEP_ID: &str = "diagnostic";

pub fn intro_params(activity: &ActivityInfo) -> DirectionLineParams {
    let mut params = DirectionLineParams::new(INTRO_STEP_ID, StepKind::VideoIntro);
    params.text = activity.direction_line_text.clone();
    params.is_new = true;
    params
}

pub fn action_params(action: &Action) -> DirectionLineParams {
    match action {
        Action::Video {
            position,
            reference,
        } => {
            let step_id = reference
                .id
                .clone()
                .unwrap_or_else(|| format!("video-{}", position));
            let mut params = DirectionLineParams::new(step_id, StepKind::VideoStep);
            params.text = reference.direction_line_text.clone();
            params.audio_path = reference.audio_path.clone();
            params.language_code = reference.language_code.clone();
            params.is_new = true;
            params
        }
        Action::QuickCheck {
            position,
            quick_check,
        } => {
            let step_id = quick_check
                .id
                .clone()
                .unwrap_or_else(|| format!("quick-check-{}", position));
            let mut params = DirectionLineParams::new(step_id, StepKind::QuickCheck);
            params.text = quick_check.direction_line_text().map(str::to_string);
            params.language_code = quick_check.direction_line_language().map(str::to_string);
            params.is_new = true;
            params
        }
    }
}

pub fn diagnostic_params(activity: &ActivityInfo) -> DirectionLineParams {
    let mut params = DirectionLineParams::new(DIAGNOSTIC_STEP_ID, StepKind::Diagnostic);
    params.text = activity.diagnostic.direction_line_text.clone();
    params.language_code = activity.diagnostic.language.clone();
    params.is_new = true;
    params
}
