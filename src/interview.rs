//! Interview policy: fixed prompts, control markers, the exchange counter and
//! the mode dispatcher.
//!
//! A request is either a conversational turn (streamed back through the frame
//! relay) or an evaluation request (answered with one JSON body). The
//! dispatcher decides which, and for chat turns picks the instruction that is
//! submitted to the provider after the formatted history.

use std::borrow::Cow;

use crate::conversion::{format_history, with_preamble};
use crate::models::chat::{Message, Role};
use crate::models::gemini::{Content, GenerationConfig, TurnRole};
use crate::provider::GenerateRequest;

/// Control substring that switches a request into evaluation mode.
pub const EVALUATION_TRIGGER: &str = "[EVALUATE_CANDIDATE]";

/// Marker the model appends to its closing message; tells the UI to move on
/// to the evaluation flow. Must be stripped before display.
pub const END_INTERVIEW_MARKER: &str = "[END_INTERVIEW]";

/// Candidate turns after which the interview is forced to close.
pub const MAX_EXCHANGES: usize = 5;

macro_rules! closing_sentence {
    () => {
        "Thank you for your time today. I've gathered enough information for our initial assessment. The recruiter will contact you with next steps. [END_INTERVIEW]"
    };
}

/// Sentence the model must reproduce verbatim when the interview is forced to end.
pub const CLOSING_SENTENCE: &str = closing_sentence!();

/// Synthetic user turn standing in for a system prompt.
pub const PREAMBLE_INSTRUCTION: &str = "SYSTEM INSTRUCTION: You're Alex, an AI Hiring Assistant from TalentScout conducting an interview. Respond directly as Alex speaking to the candidate. Be conversational, don't list multiple questions at once, don't include stage directions or explanatory notes in parentheses, and never use placeholders. Ask only one question at a time.";

/// Synthetic model turn acknowledging [`PREAMBLE_INSTRUCTION`].
pub const PREAMBLE_ACKNOWLEDGEMENT: &str = "I understand. I am Alex from TalentScout. I will conduct the interview in a conversational manner, asking one question at a time, without any stage directions or notes. I'll speak directly to the candidate as if we're having a real conversation.";

pub const TERMINATION_INSTRUCTION: &str = concat!(
    "RESPOND AS ALEX: This is the FINAL response. Thank the candidate for their time, mention you've gathered enough information, and explicitly end with: '",
    closing_sentence!(),
    "'"
);

pub const INTRODUCTION_INSTRUCTION: &str = "RESPOND AS ALEX: Introduce yourself as Alex from TalentScout. Start the interview with a friendly introduction and ask only ONE question to begin.";

pub const EVALUATION_INSTRUCTION: &str = r#"
Based on the conversation history, provide a detailed evaluation of the candidate.
Return your evaluation in the following JSON format:

{
  "technicalSkills": {
    "score": <number between 1-10>,
    "assessment": "<detailed explanation of technical skills assessment>"
  },
  "communicationSkills": {
    "score": <number between 1-10>,
    "assessment": "<detailed explanation of communication skills assessment>"
  },
  "culturalFit": {
    "score": <number between 1-10>,
    "assessment": "<detailed explanation of cultural fit assessment>"
  },
  "overallRecommendation": "<Reject, Consider, Strong Consider, or Hire>",
  "strengths": [
    "<strength 1>",
    "<strength 2>",
    "<strength 3>"
  ],
  "areasForImprovement": [
    "<area 1>",
    "<area 2>",
    "<area 3>"
  ],
  "suggestedFollowUpQuestions": [
    "<question 1>",
    "<question 2>",
    "<question 3>"
  ]
}

Ensure your response is properly formatted JSON that can be parsed. Do not include any explanatory text outside the JSON structure."#;

/// Streamed when the provider call fails before producing anything.
pub const CHAT_FALLBACK: &str =
    "I'm having trouble responding right now. Let's continue the interview when the system is stable.";

/// Returned as the evaluation `response` when the provider call fails.
pub const EVALUATION_FALLBACK: &str =
    "I couldn't generate a detailed evaluation at this time. Please try again later.";

/// True when any user message contains the evaluation trigger.
///
/// This is a substring test: candidate-authored text that happens to contain
/// the trigger also flips the request into evaluation mode.
pub fn is_evaluation_request(messages: &[Message]) -> bool {
    messages.iter().any(|m| {
        m.role == Role::User
            && m
                .as_str()
                .is_some_and(|content| content.contains(EVALUATION_TRIGGER))
    })
}

/// Number of candidate turns so far.
///
/// Zero while the history has two entries or fewer; otherwise the number of
/// user turns after the first entry (the first is the seed message).
pub fn exchange_count(history: &[Content]) -> usize {
    if history.len() <= 2 {
        return 0;
    }
    history
        .iter()
        .skip(1)
        .filter(|turn| turn.role == TurnRole::User)
        .count()
}

pub fn should_end_interview(exchange_count: usize) -> bool {
    exchange_count >= MAX_EXCHANGES
}

/// Instruction submitted after the history on a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Close the interview with [`CLOSING_SENTENCE`].
    Terminate,
    /// Opening turn.
    Introduce,
    FollowUp { exchange: usize },
}

impl Instruction {
    pub fn select(exchange_count: usize, history_len: usize) -> Self {
        if should_end_interview(exchange_count) {
            Instruction::Terminate
        } else if history_len <= 1 {
            Instruction::Introduce
        } else {
            Instruction::FollowUp {
                exchange: exchange_count,
            }
        }
    }

    pub fn text(&self) -> Cow<'static, str> {
        match self {
            Instruction::Terminate => Cow::Borrowed(TERMINATION_INSTRUCTION),
            Instruction::Introduce => Cow::Borrowed(INTRODUCTION_INSTRUCTION),
            Instruction::FollowUp { exchange } => Cow::Owned(format!(
                "RESPOND AS ALEX: Respond to the candidate's last message. This is exchange {exchange} out of {MAX_EXCHANGES}. Keep your response conversational, as if this is a real-time interview. Ask just one follow-up question."
            )),
        }
    }
}

/// A conversational turn, ready to be sent to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPlan {
    /// Formatted turns without the preamble pair.
    pub history: Vec<Content>,
    pub exchange_count: usize,
    pub instruction: Instruction,
}

impl ChatPlan {
    pub fn should_end_interview(&self) -> bool {
        should_end_interview(self.exchange_count)
    }

    /// Session history (preamble pair prepended) plus the instruction.
    pub fn into_request(self, generation: GenerationConfig) -> GenerateRequest {
        let prompt = self.instruction.text().into_owned();
        GenerateRequest::new(with_preamble(self.history), prompt, generation)
    }
}

/// An evaluation request: formatted history, trigger removed, no preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationPlan {
    pub history: Vec<Content>,
}

impl EvaluationPlan {
    pub fn into_request(self, generation: GenerationConfig) -> GenerateRequest {
        GenerateRequest::new(self.history, EVALUATION_INSTRUCTION, generation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterviewMode {
    Chat(ChatPlan),
    Evaluation(EvaluationPlan),
}

impl InterviewMode {
    pub fn name(&self) -> &'static str {
        match self {
            InterviewMode::Chat(_) => "chat",
            InterviewMode::Evaluation(_) => "evaluation",
        }
    }
}

/// Classify a request and prepare what the provider needs for it.
pub fn dispatch(messages: &[Message]) -> InterviewMode {
    let evaluation = is_evaluation_request(messages);
    let history = format_history(messages, evaluation);

    if evaluation {
        return InterviewMode::Evaluation(EvaluationPlan { history });
    }

    let exchange_count = exchange_count(&history);
    let instruction = Instruction::select(exchange_count, history.len());
    InterviewMode::Chat(ChatPlan {
        history,
        exchange_count,
        instruction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(candidate_turns: usize) -> Vec<Message> {
        let mut msgs = vec![Message::user("Name: Ada. Stack: Rust, Go.")];
        for i in 0..candidate_turns {
            msgs.push(Message::assistant(format!("Question {i}?")));
            msgs.push(Message::user(format!("Answer {i}")));
        }
        msgs
    }

    #[test]
    fn trigger_is_a_substring_match_on_user_messages() {
        assert!(is_evaluation_request(&[Message::user(
            "please [EVALUATE_CANDIDATE] now"
        )]));
        assert!(!is_evaluation_request(&[Message::assistant(
            "[EVALUATE_CANDIDATE]"
        )]));
        assert!(!is_evaluation_request(&[Message::system(
            "[EVALUATE_CANDIDATE]"
        )]));
        assert!(!is_evaluation_request(&[Message::user("evaluate me")]));
    }

    #[test]
    fn short_histories_count_zero() {
        assert_eq!(exchange_count(&[]), 0);
        assert_eq!(exchange_count(&[Content::user("a")]), 0);
        assert_eq!(exchange_count(&[Content::user("a"), Content::user("b")]), 0);
    }

    #[test]
    fn counts_user_turns_after_the_first() {
        let history = vec![
            Content::user("seed"),
            Content::model("q1"),
            Content::user("a1"),
            Content::model("q2"),
            Content::user("a2"),
        ];
        assert_eq!(exchange_count(&history), 2);
    }

    #[test]
    fn fewer_than_two_messages_never_end() {
        for msgs in [vec![], vec![Message::user("hi")]] {
            match dispatch(&msgs) {
                InterviewMode::Chat(plan) => {
                    assert_eq!(plan.exchange_count, 0);
                    assert!(!plan.should_end_interview());
                    assert_eq!(plan.instruction, Instruction::Introduce);
                }
                other => panic!("expected chat, got {}", other.name()),
            }
        }
    }

    #[test]
    fn follow_up_cites_exchange_number() {
        let InterviewMode::Chat(plan) = dispatch(&conversation(2)) else {
            panic!("expected chat");
        };
        assert_eq!(plan.instruction, Instruction::FollowUp { exchange: 2 });
        assert!(plan
            .instruction
            .text()
            .contains("This is exchange 2 out of 5."));
    }

    #[test]
    fn system_messages_do_not_count() {
        let mut msgs = conversation(1);
        msgs.insert(0, Message::system("ignored"));
        msgs.push(Message::system("ignored too"));
        let InterviewMode::Chat(plan) = dispatch(&msgs) else {
            panic!("expected chat");
        };
        assert_eq!(plan.history.len(), 3);
        assert_eq!(plan.exchange_count, 1);
    }

    #[test]
    fn termination_is_forced_from_fifth_exchange() {
        for turns in 5..9 {
            let InterviewMode::Chat(plan) = dispatch(&conversation(turns)) else {
                panic!("expected chat");
            };
            assert!(plan.should_end_interview());
            assert_eq!(plan.instruction, Instruction::Terminate);
            assert!(plan.instruction.text().contains(CLOSING_SENTENCE));
        }
        let InterviewMode::Chat(plan) = dispatch(&conversation(4)) else {
            panic!("expected chat");
        };
        assert!(!plan.should_end_interview());
    }

    #[test]
    fn closing_sentence_ends_with_marker() {
        assert!(CLOSING_SENTENCE.ends_with(END_INTERVIEW_MARKER));
        assert!(TERMINATION_INSTRUCTION.ends_with("[END_INTERVIEW]'"));
    }

    #[test]
    fn evaluation_plan_drops_trigger_and_uses_json_instruction() {
        let mut msgs = conversation(3);
        msgs.push(Message::user(EVALUATION_TRIGGER));
        let InterviewMode::Evaluation(plan) = dispatch(&msgs) else {
            panic!("expected evaluation");
        };
        assert_eq!(plan.history.len(), 7);
        assert!(plan
            .history
            .iter()
            .all(|turn| turn.text() != EVALUATION_TRIGGER));

        let request = plan.into_request(GenerationConfig::evaluation());
        assert_eq!(request.history.len(), 7);
        assert_eq!(request.history[0].text(), "Name: Ada. Stack: Rust, Go.");
        assert!(request.prompt.contains("\"technicalSkills\""));
        assert_eq!(request.generation.max_output_tokens, 2048);
    }

    #[test]
    fn chat_request_prepends_preamble() {
        let InterviewMode::Chat(plan) = dispatch(&conversation(1)) else {
            panic!("expected chat");
        };
        let request = plan.into_request(GenerationConfig::chat());
        assert_eq!(request.history.len(), 5);
        assert_eq!(request.history[0].text(), PREAMBLE_INSTRUCTION);
        assert_eq!(request.history[1].text(), PREAMBLE_ACKNOWLEDGEMENT);
        assert_eq!(request.history[2].text(), "Name: Ada. Stack: Rust, Go.");
    }
}
