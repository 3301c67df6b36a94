//! Prompt rendering for speaker selection and message generation
//!
//! Everything here is a pure function of its inputs: the same transcript,
//! roster, topic and persona always render the same string.

use crate::llm::HistoryMessage;
use crate::persona::{Persona, Roster};

use super::message::Transcript;

const STYLE_RULES: &str = " Avoid greeting phrases. Avoid typing names if not absolutely necessary. \
Answer as casually as possible unless the description of yourself contradicts being casual. \
Don't be afraid including one or two emojis (maximum one emoji per sentence), but do not overdo it. \
Only send a message from yourself. The message should be in the form of a SMS message. \
Do not use phrases such as \"hey guys\" or \"hello everyone\" in the beginning of the message. \
Do not include any names in the beginning of the message, avoid for example \"([NAME])\" and \"Hey [NAME]\") etc.";

/// Renders model instructions from conversation state
pub struct PromptBuilder;

impl PromptBuilder {
    /// Instruction asking the model to pick the next speaker by number.
    ///
    /// Candidates are the roster minus `last_speaker`, numbered from 1 in
    /// roster order.
    pub fn build_selection_prompt(
        transcript: &Transcript,
        roster: &Roster,
        topic: &str,
        last_speaker: Option<&str>,
    ) -> String {
        let topic = topic.trim();
        let mut prompt = if transcript.is_empty() {
            let mut start = String::from("Choose the best person to start the conversation");
            if !topic.is_empty() {
                start.push_str(&format!(" based on the topic \"{}\"", topic));
            }
            start.push('.');
            start
        } else {
            let mut reply = String::from("Choose the best person to respond to the latest message");
            if !topic.is_empty() {
                reply.push_str(&format!(" and the topic \"{}\"", topic));
            }
            reply.push_str(
                ", but also consider the message history as a whole. \
                 Do not select the person who wrote the latest message.",
            );
            reply
        };

        let candidates = roster
            .others(last_speaker)
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p))
            .collect::<Vec<_>>()
            .join("\n");

        prompt.push_str(
            " Only respond with an integer representing the number of a person in the list below \
             (example response: 1). Here's the list of the people to choose from:\n",
        );
        prompt.push_str(&candidates);
        prompt
    }

    /// Instruction asking the model to write the next message as `speaker`
    pub fn build_generation_prompt(
        transcript: &Transcript,
        roster: &Roster,
        topic: &str,
        speaker: &Persona,
    ) -> String {
        let topic = topic.trim();
        let group = roster.len();
        let mut prompt = format!("You are writing a message as {}.", speaker.name);

        if transcript.is_empty() {
            prompt.push_str(" Come up with a short to medium sized text message");
            if !topic.is_empty() {
                prompt.push_str(&format!(" based on the topic \"{}\"", topic));
            }
            prompt.push_str(" that ends with a question or a statement.");
        } else {
            prompt.push_str(
                " Answer the previous message with a short to medium sized message (about one paragraph). \
                 Analyze the message history to understand the context of the conversation.",
            );
            if !topic.is_empty() {
                prompt.push_str(&format!(" The discussion is around the topic \"{}\".", topic));
            }
            prompt.push_str(
                " Look at the name in the beginning of each message to identify each writer. \
                 The message should keep the conversation going, do not say good-bye.",
            );
        }

        prompt.push_str(&format!(
            " You know the {} in the chat very well.",
            if group > 2 { "people" } else { "other person" }
        ));

        if group == 2 {
            prompt.push_str(
                " There are only you and one other person in the chat. \
                 Only talk to the other person directly. \
                 Avoid greeting the other people in the beginning of the message.",
            );
        } else {
            prompt.push_str(
                " Include all participants in the chat as much as possible, \
                 but do not include their names in the message.",
            );
        }

        let participants = roster
            .iter()
            .map(|p| format!("\u{2022} {}", p))
            .collect::<Vec<_>>()
            .join("\n");

        prompt.push_str(STYLE_RULES);
        prompt.push_str(&format!(
            " There are a total of {} people involved in the conversation. \
             Here's a list of the participants (including yourself) together with names \
             and a personal descriptions:\n{}",
            group, participants
        ));
        prompt
    }

    /// Transcript as model context, each entry prefixed with its author
    pub fn history(transcript: &Transcript, roster: &Roster) -> Vec<HistoryMessage> {
        transcript
            .iter()
            .map(|message| {
                let author = message
                    .persona_name
                    .as_deref()
                    .or_else(|| {
                        message
                            .persona_id
                            .as_deref()
                            .and_then(|id| roster.get(id))
                            .map(|p| p.name.as_str())
                    })
                    .unwrap_or("Unknown");

                HistoryMessage {
                    role: message.role.into(),
                    content: format!("{}: {}", author, message.content),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::{ChatMessage, Role};
    use crate::llm::HistoryRole;
    use crate::persona::PersonaColor;

    fn roster(n: usize) -> Roster {
        let people = [
            ("a", "Alice", "Barista who loves espresso"),
            ("b", "Bob", "Tea drinker and skeptic"),
            ("c", "Carol", "Night owl programmer"),
        ];
        Roster::from_personas(
            people[..n]
                .iter()
                .enumerate()
                .map(|(i, (id, name, desc))| {
                    Persona::with_id(*id, *name, *desc, PersonaColor::for_index(i))
                })
                .collect(),
        )
        .unwrap()
    }

    fn transcript_with(roster: &Roster, author: &str, text: &str) -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::assistant(roster.get(author).unwrap(), text));
        transcript
    }

    #[test]
    fn test_selection_prompt_start_with_topic() {
        let roster = roster(3);
        let prompt =
            PromptBuilder::build_selection_prompt(&Transcript::new(), &roster, "coffee", None);

        assert!(prompt.starts_with(
            "Choose the best person to start the conversation based on the topic \"coffee\"."
        ));
        assert!(prompt.ends_with(
            "choose from:\n1. Alice - Barista who loves espresso\n2. Bob - Tea drinker and skeptic\n3. Carol - Night owl programmer"
        ));
    }

    #[test]
    fn test_selection_prompt_reply_excludes_last_speaker() {
        let roster = roster(3);
        let transcript = transcript_with(&roster, "a", "Who wants a flat white?");
        let prompt = PromptBuilder::build_selection_prompt(&transcript, &roster, "", Some("a"));

        assert!(prompt.starts_with(
            "Choose the best person to respond to the latest message, but also consider"
        ));
        assert!(!prompt.contains("topic"));
        assert!(prompt.contains("1. Bob - Tea drinker and skeptic\n2. Carol - Night owl programmer"));
        assert!(!prompt.contains("Alice"));
    }

    #[test]
    fn test_generation_prompt_opening_pair() {
        let roster = roster(2);
        let alice = roster.get("a").unwrap();
        let prompt =
            PromptBuilder::build_generation_prompt(&Transcript::new(), &roster, "coffee", alice);

        assert!(prompt.starts_with("You are writing a message as Alice. Come up with"));
        assert!(prompt.contains("based on the topic \"coffee\" that ends with a question"));
        assert!(prompt.contains("You know the other person in the chat very well."));
        assert!(prompt.contains("There are only you and one other person in the chat."));
        assert!(prompt.contains("maximum one emoji per sentence"));
        assert!(prompt.contains("There are a total of 2 people"));
        assert!(prompt.ends_with(
            "\n\u{2022} Alice - Barista who loves espresso\n\u{2022} Bob - Tea drinker and skeptic"
        ));
    }

    #[test]
    fn test_generation_prompt_group_reply() {
        let roster = roster(3);
        let transcript = transcript_with(&roster, "a", "Espresso or bust.");
        let carol = roster.get("c").unwrap();
        let prompt = PromptBuilder::build_generation_prompt(&transcript, &roster, "coffee", carol);

        assert!(prompt.starts_with("You are writing a message as Carol. Answer the previous message"));
        assert!(prompt.contains("The discussion is around the topic \"coffee\"."));
        assert!(prompt.contains("do not say good-bye."));
        assert!(prompt.contains("You know the people in the chat very well."));
        assert!(prompt.contains("Include all participants in the chat"));
        assert!(!prompt.contains("only you and one other person"));
        assert!(prompt.contains("\u{2022} Carol - Night owl programmer"));
    }

    #[test]
    fn test_prompts_are_pure() {
        let roster = roster(3);
        let transcript = transcript_with(&roster, "b", "Tea is better.");
        let bob = roster.get("b").unwrap();

        let first = PromptBuilder::build_selection_prompt(&transcript, &roster, "tea", Some("b"));
        let second = PromptBuilder::build_selection_prompt(&transcript, &roster, "tea", Some("b"));
        assert_eq!(first, second);

        let first = PromptBuilder::build_generation_prompt(&transcript, &roster, "tea", bob);
        let second = PromptBuilder::build_generation_prompt(&transcript, &roster, "tea", bob);
        assert_eq!(first, second);
    }

    #[test]
    fn test_history_uses_cached_then_roster_then_unknown() {
        let roster = roster(2);
        let mut transcript = transcript_with(&roster, "a", "first");

        let mut by_id = ChatMessage::assistant(roster.get("b").unwrap(), "second");
        by_id.persona_name = None;
        transcript.push(by_id);

        let mut orphan = ChatMessage::assistant(roster.get("b").unwrap(), "third");
        orphan.persona_name = None;
        orphan.persona_id = Some("gone".to_string());
        orphan.role = Role::User;
        transcript.push(orphan);

        let history = PromptBuilder::history(&transcript, &roster);
        assert_eq!(history[0].content, "Alice: first");
        assert_eq!(history[1].content, "Bob: second");
        assert_eq!(history[2].content, "Unknown: third");
        assert_eq!(history[0].role, HistoryRole::Assistant);
        assert_eq!(history[2].role, HistoryRole::User);
    }
}
