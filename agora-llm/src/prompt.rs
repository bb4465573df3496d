//! Prompt templates for Agora decision requests.
//!
//! Templates are plain strings with `{key}` placeholders, filled in by
//! [`render_template`]. Request templates end with the exact JSON shape the
//! caller parses; notification templates are appended to agent histories
//! and never parsed back.

// ---------------------------------------------------------------------------
// Home
// ---------------------------------------------------------------------------

/// Sent once per agent when it first enters the world.
pub const KICK_OFF: &str = r"# Notice! You are at {stage_name}.

{kick_off_message}

Reply in character, in one short paragraph, with what you do first.";

/// Free-time planning at home.
pub const HOME_PLAN: &str = r#"# Instruction! You are at {stage_name}. Decide what you do now.

## Who is here

{present}

## Rules

- `speak` maps a listener name (from the list above) to what you say to them.
- `announce` is one line addressed to everyone here, or null.
- Doing nothing is allowed: return empty `speak` and null `announce`.

## Output format (JSON)

{"speak": {"<listener>": "<line>"}, "announce": "<line or null>"}"#;

/// Delivered to a listener when someone speaks to them.
pub const SPEAK_NOTICE: &str = r"# Notice! {speaker} says to {listener}: {line}";

/// Delivered to everyone on the stage.
pub const ANNOUNCE_NOTICE: &str = r"# Notice! {speaker} announces to everyone at {stage_name}: {line}";

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

/// Opening status effects, requested once per participant at combat start.
pub const COMBAT_INIT: &str = r#"# Instruction! Combat begins at {stage_name}.

## Participants

{participants}

Assess your readiness: preparation, surroundings, state of mind, equipment.
Describe any status effects you start this combat with.

## Output format (JSON)

{"status_effects": [{"name": "<name>", "description": "<cause and impact>", "duration": <rounds>}]}"#;

/// Card draw on the first round. There is no hp to report yet.
pub const DRAW_CARDS_FIRST_ROUND: &str = r#"# Instruction! Combat opens. Assess the field and create your first {card_count} cards.

## Action order (left acts first and may change the field for those after)

{action_order}

## Rules

**cards**: actions you may take this round.
- Each card has an effect on its targets: damage, healing, shield, buff or debuff.
- Each card costs its user something. The stronger the effect, the heavier the cost.

**status_effects**: new effects on yourself this round.
- Opening effects: preparation, surroundings, state of mind, equipment, experience.
- Do not repeat an effect you already have.

## Output format (JSON)

{"cards": [{"name": "<name>", "description": "<effect and cost>", "targets": ["<name>"]}], "status_effects": [{"name": "<name>", "description": "<cause and impact>", "duration": <rounds>}]}

Output exactly {card_count} cards. Strict JSON, no blank lines."#;

/// Card draw from the second round on. The agent reads its hp back from the
/// last round's combat log.
pub const DRAW_CARDS_LATER_ROUND: &str = r#"# Instruction! Review the fight so far and create your {card_count} cards for this round.

## Action order (left acts first and may change the field for those after)

{action_order}

## Rules

**update_hp**: your current hp, read from the most recent combat log.

**cards**: actions you may take this round.
- Each card has an effect on its targets: damage, healing, shield, buff or debuff.
- Each card costs its user something. The stronger the effect, the heavier the cost.

**status_effects**: new effects on yourself this round.
- Effects caused by last round's cards and their costs.
- Do not repeat an effect you already have.

If you are dead (hp <= 0) or believe the fight is over, return empty `cards` and `status_effects` but still fill `update_hp`.

## Output format (JSON)

{"update_hp": <number>, "cards": [{"name": "<name>", "description": "<effect and cost>", "targets": ["<name>"]}], "status_effects": [{"name": "<name>", "description": "<cause and impact>", "duration": <rounds>}]}

Output exactly {card_count} cards. Strict JSON, no blank lines."#;

/// Recorded in an actor's history when it commits a card.
pub const PLAY_CARD_NOTICE: &str = r"# Notice! Round {round_number}: you play [{card_name}] on {targets}.

{card_description}";

/// One request resolves the whole round.
pub const ARBITRATION: &str = r#"# Instruction! Round {round_number}: resolve the fight and narrate it.

## Action order

{action_order}

Earlier actors resolve first and may change the field for later ones.

## Combatants

{combatants}

## Arbitration rules

- Actors may use or alter objects in the environment, first come first served.
- Environmental changes affect later actions.
- Status effects count toward every calculation.

## Output format (JSON)

{"combat_log": "<actor -> card -> environment -> damage -> hp change, as Name.HP=X/Y>", "narrative": "<sensory account, no numbers>", "hp_updates": {"<name>": <final hp>}}"#;

/// Broadcast to every participant once the round is resolved.
pub const ROUND_RESULT_NOTICE: &str = r"# Notice! Round {round_number} resolved.

## What happened

{narrative}

## Combat log

{combat_log}

Your current hp is in the combat log under your name (Name.HP=X/Y).";

/// Sent when status effects run out at a round boundary.
pub const STATUS_EFFECTS_EXPIRED_NOTICE: &str = r"# Notice! These status effects on you have expired:

{effects}";

/// Broadcast to living allies when combat ends. Tagged so the combat can be
/// compressed afterwards.
pub const COMBAT_OUTCOME_NOTICE: &str = r"# Notice! The combat at {stage_name} is over: {outcome}.";

/// First-person summary requested from each ally after combat.
pub const COMBAT_SUMMARY: &str = r"# Instruction! {actor_name} just fought at {stage_name}. Record the experience in first person.

Briefly cover:
- the scene and the opponents
- how the fight went: opening, key moments, ending
- how you feel now
- how your companions did, if any

One compact paragraph, no numbered lists, under 150 words.";

/// Replaces the whole combat transcript in an ally's history.
pub const COMBAT_ARCHIVE: &str = r"# Notice! The combat of {actor_name} at {stage_name} is over.

{summary}

This experience has been recorded.";

// ---------------------------------------------------------------------------
// Social deduction
// ---------------------------------------------------------------------------

/// Private role reveal.
pub const ROLE_NOTICE: &str = r"# Notice! Your secret role is {role}. {role_hint}";

/// Night phase, werewolves only.
pub const NIGHT_KILL: &str = r#"# Instruction! Night {night}. Choose someone to kill.

## Living players you may target

{candidates}

## Output format (JSON)

{"target": "<name>", "reason": "<short reason>"}"#;

/// Public morning announcement.
pub const NIGHT_DEATH_NOTICE: &str = r"# Notice! Morning of day {day}: {victim} was found dead.";

/// Day phase, every living player.
pub const DAY_VOTE: &str = r#"# Instruction! Day {day}. Speak to the table and vote on whom to eliminate.

## Living players

{candidates}

A vote for nobody is allowed: use null.

## Output format (JSON)

{"speech": "<what you say>", "vote": "<name or null>"}"#;

/// Broadcast of each day speech.
pub const DAY_SPEECH_NOTICE: &str = r"# Notice! {speaker} says: {speech}";

/// Broadcast of the vote result.
pub const VOTE_RESULT_NOTICE: &str = r"# Notice! Day {day}: the town eliminated {victim}.";

/// Broadcast of a tied or empty vote.
pub const VOTE_TIE_NOTICE: &str = r"# Notice! Day {day}: the vote was split and nobody was eliminated.";

/// End-of-game broadcast.
pub const SOCIAL_OUTCOME_NOTICE: &str = r"# Notice! The game is over. The {winner} win.";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value. Unknown placeholders and
/// literal braces are left untouched.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// `- item` per line.
#[must_use]
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering_works() {
        let rendered = render_template(
            "Hello {name}, you are a {role}.",
            &[("name", "Kael"), ("role", "knight")],
        );
        assert_eq!(rendered, "Hello Kael, you are a knight.");
    }

    #[test]
    fn template_handles_missing_vars() {
        let rendered = render_template("Hello {name}, {unknown}.", &[("name", "Kael")]);
        assert_eq!(rendered, "Hello Kael, {unknown}.");
    }

    #[test]
    fn json_braces_survive_rendering() {
        let rendered = render_template(NIGHT_KILL, &[("night", "2"), ("candidates", "- Mira")]);
        assert!(rendered.contains(r#"{"target": "<name>""#));
        assert!(rendered.contains("Night 2"));
    }

    #[test]
    fn bullets() {
        assert_eq!(bullet_list(&["a", "b"]), "- a\n- b");
        assert_eq!(bullet_list::<&str>(&[]), "");
    }
}
