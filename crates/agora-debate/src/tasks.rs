//! Task templates
//!
//! Every template ends with the exact JSON shape expected back, so the
//! parser and the repair loop agree with what the model was asked for.

use agora_core::{Attitude, ReactionType, Stance, VoteStance};

use crate::responses::{
    NarrativeResponse, OpinionResponse, PlannerResult, ReflectionResponse, StructuredResponse, UtteranceResponse,
    VoteResponse,
};

/// Characters of the speaker's utterance quoted in a reaction task
pub const SPEECH_PREVIEW_CHARS: usize = 100;

fn preview(text: &str) -> String {
    if text.chars().count() > SPEECH_PREVIEW_CHARS {
        let cut: String = text.chars().take(SPEECH_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn participants_line(ids: &[&str]) -> String {
    format!("Participants: {}", ids.join(", "))
}

pub fn narrative_task() -> String {
    format!(
        "You live in the area described in the local context. Based on your persona, talk naturally about:\n\
         1. How you came to live in this neighbourhood.\n\
         2. Where, from whom and how you heard about the redevelopment.\n\
         3. Whether you know terms such as contribution ratio, union or appraisal, and how well.\n\
         4. How redevelopment would change your life.\n\
         5. What you do for a living and what a typical day looks like.\n\
         6. Which neighbours you see often, and whether you join local meetings.\n\
         7. How you usually behave when a group disagrees.\n\
         8. What everyday problem worries you most apart from redevelopment.\n\n\
         Response format:\n{}",
        NarrativeResponse::shape()
    )
}

pub fn initial_opinion_task() -> String {
    format!(
        "The debate has not started and you have not heard anyone else yet. Based on your persona and \
         circumstances, state your position on the proposed plan together with your conditions and concerns.\n\n\
         Response format:\n{}",
        OpinionResponse::shape()
    )
}

pub fn speaking_task(round: u32) -> String {
    format!(
        "This is round {}. It is your turn to speak.\n\n\
         Response format:\n{}\n\n\
         - nominations: participants you address directly, or [] if you address no one\n\
         - attitude: your attitude toward the nominated participant's view, one of {}",
        round,
        UtteranceResponse::shape(),
        Attitude::choices()
    )
}

pub fn reaction_task(listener_id: &str, speaker_id: &str, code: &str, speech: &str) -> String {
    format!(
        "You are {listener}. In the timeline, lines by {listener} are your own.\n\n\
         {speaker} said (code: {code}):\n\"{speech}\"\n\n\
         Consider why they said it and what you, {listener}, think about it.\n\n\
         Response format:\n\
         {{\"referenced_code\": \"{code}\", \"reaction_type\": \"one of {choices}\", \"thought\": \"your thoughts\"}}",
        listener = listener_id,
        speaker = speaker_id,
        code = code,
        speech = preview(speech),
        choices = ReactionType::choices()
    )
}

pub fn reflection_task(participant_id: &str, round: u32) -> String {
    format!(
        "You are {id}. In the timeline, lines by {id} are your own.\n\n\
         Round {round} has ended. From your own point of view, note which opinion you heard stuck with you \
         most and why.\n\n\
         Response format:\n{shape}",
        id = participant_id,
        round = round,
        shape = ReflectionResponse::shape()
    )
}

pub fn final_opinion_task() -> String {
    format!(
        "The debate is over. Having heard every other participant, what is your final position on the \
         proposed plan?\n\n\
         Response format:\n{}",
        OpinionResponse::shape()
    )
}

pub fn planner_task() -> String {
    format!(
        "You are an urban planner. Read the full debate transcript and the participants' final opinions. \
         List the contested issues and write one compromise proposal that the most participants could accept.\n\n\
         Response format:\n{}",
        PlannerResult::shape()
    )
}

pub fn vote_task(participant_id: &str) -> String {
    format!(
        "You are {}. The planner has published a compromise proposal (shown as the last line by planner in \
         the timeline). Decide whether you accept it.\n\n\
         Response format:\n{}",
        participant_id,
        VoteResponse::shape()
    )
}

/// Wrap a single-participant shape into a batch array instruction
fn batch_format(shape: &str, ids: &[&str]) -> String {
    format!(
        "{}\n\nRespond with a JSON array containing exactly one object per participant, in this order. \
         Each object has an \"id\" field plus:\n{}",
        participants_line(ids),
        shape
    )
}

pub fn batch_narrative_task(ids: &[&str]) -> String {
    format!(
        "Each participant lives in the area described in the local context. For each participant, tell \
         their story: how they came here, how they heard about the redevelopment and how it would change \
         their life.\n{}",
        batch_format(&NarrativeResponse::shape(), ids)
    )
}

pub fn batch_opinion_task(ids: &[&str], final_round: bool) -> String {
    let lead = if final_round {
        "The debate is over. Give each participant's final position on the proposed plan."
    } else {
        "The debate has not started. Give each participant's initial position on the proposed plan."
    };
    format!("{}\n{}", lead, batch_format(&OpinionResponse::shape(), ids))
}

pub fn batch_speaking_task(round: u32, ids: &[&str]) -> String {
    format!(
        "This is round {}. Every participant speaks once, in order, responding to what was said before.\n{}",
        round,
        batch_format(&UtteranceResponse::shape(), ids)
    )
}

pub fn batch_vote_task(ids: &[&str]) -> String {
    format!(
        "The planner has published a compromise proposal. For each participant, decide whether they \
         accept it.\n{}",
        batch_format(&VoteResponse::shape(), ids)
    )
}

/// Stance labels as shown in summaries
pub fn stance_legend() -> String {
    format!("stances: {}; votes: {}", Stance::choices(), VoteStance::choices())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_task_names_code_and_truncates() {
        let speech = "a".repeat(150);
        let task = reaction_task("resident_02", "resident_01", "resident_01_r1_01_r", &speech);
        assert!(task.contains("resident_01_r1_01_r"));
        assert!(task.contains(&format!("{}...", "a".repeat(100))));
        assert!(!task.contains(&"a".repeat(101)));
    }

    #[test]
    fn test_batch_tasks_list_participants() {
        let task = batch_speaking_task(2, &["resident_01", "resident_02"]);
        assert!(task.contains("Participants: resident_01, resident_02"));
        assert!(task.contains("round 2"));
    }

    #[test]
    fn test_speaking_task_lists_attitudes() {
        assert!(speaking_task(1).contains("empathy/criticism/citation/question"));
    }
}
