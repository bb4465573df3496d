//! Notification texts appended to agent histories.
//!
//! These are opaque to the runtime: rendered once, stored, sent back to the
//! decision service as context, never parsed.

use agora_llm::prompt::{self, bullet_list, render_template};

use crate::combat::CombatResult;
use crate::models::{Card, SocialFaction, StatusEffect};

/// Effects that ran out at a round boundary, `- name: description` each.
#[must_use]
pub fn status_effects_expired(effects: &[StatusEffect]) -> String {
    let lines: Vec<String> = effects
        .iter()
        .map(|e| format!("{}: {}", e.name, e.description))
        .collect();
    render_template(prompt::STATUS_EFFECTS_EXPIRED_NOTICE, &[("effects", bullet_list(&lines).as_str())])
}

/// A resolved round.
#[must_use]
pub fn round_result(round_number: usize, narrative: &str, combat_log: &str) -> String {
    render_template(
        prompt::ROUND_RESULT_NOTICE,
        &[
            ("round_number", round_number.to_string().as_str()),
            ("narrative", narrative),
            ("combat_log", combat_log),
        ],
    )
}

/// The end of a combat.
#[must_use]
pub fn combat_outcome(stage: &str, result: CombatResult) -> String {
    render_template(
        prompt::COMBAT_OUTCOME_NOTICE,
        &[("stage_name", stage), ("outcome", result.label())],
    )
}

/// A committed card, from the player's point of view.
#[must_use]
pub fn card_played(round_number: usize, card: &Card) -> String {
    render_template(
        prompt::PLAY_CARD_NOTICE,
        &[
            ("round_number", round_number.to_string().as_str()),
            ("card_name", card.name.as_str()),
            ("targets", card.target_list().as_str()),
            ("card_description", card.description.as_str()),
        ],
    )
}

/// The compressed record of a combat.
#[must_use]
pub fn combat_archive(actor: &str, stage: &str, summary: &str) -> String {
    render_template(
        prompt::COMBAT_ARCHIVE,
        &[("actor_name", actor), ("stage_name", stage), ("summary", summary)],
    )
}

/// A line addressed to one listener.
#[must_use]
pub fn speech(speaker: &str, listener: &str, line: &str) -> String {
    render_template(
        prompt::SPEAK_NOTICE,
        &[("speaker", speaker), ("listener", listener), ("line", line)],
    )
}

/// A line for the whole stage.
#[must_use]
pub fn announcement(speaker: &str, stage: &str, line: &str) -> String {
    render_template(
        prompt::ANNOUNCE_NOTICE,
        &[("speaker", speaker), ("stage_name", stage), ("line", line)],
    )
}

/// The private role reveal.
#[must_use]
pub fn role_reveal(role: &str, hint: &str) -> String {
    render_template(prompt::ROLE_NOTICE, &[("role", role), ("role_hint", hint)])
}

/// The morning after a kill.
#[must_use]
pub fn night_death(day: u32, victim: &str) -> String {
    render_template(
        prompt::NIGHT_DEATH_NOTICE,
        &[("day", day.to_string().as_str()), ("victim", victim)],
    )
}

/// A day speech.
#[must_use]
pub fn day_speech(speaker: &str, speech: &str) -> String {
    render_template(prompt::DAY_SPEECH_NOTICE, &[("speaker", speaker), ("speech", speech)])
}

/// The result of a day vote. `None` means a tie or no votes.
#[must_use]
pub fn vote_result(day: u32, victim: Option<&str>) -> String {
    let day = day.to_string();
    match victim {
        Some(victim) => render_template(prompt::VOTE_RESULT_NOTICE, &[("day", day.as_str()), ("victim", victim)]),
        None => render_template(prompt::VOTE_TIE_NOTICE, &[("day", day.as_str())]),
    }
}

/// The end of a social deduction game.
#[must_use]
pub fn social_outcome(winner: SocialFaction) -> String {
    render_template(prompt::SOCIAL_OUTCOME_NOTICE, &[("winner", winner.label())])
}
