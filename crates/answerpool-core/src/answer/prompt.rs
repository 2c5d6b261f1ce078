//! Prompt construction and answer cleanup.
//!
//! `build_messages` turns a normalized question into the chat messages sent
//! upstream; `clean_answer` reduces the raw completion to the bare answer
//! that gets cached and returned.

use answerpool_types::answer::AnswerRequest;
use answerpool_types::upstream::ChatMessage;

/// Question types with dedicated answer instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Single,
    Multiple,
    Judge,
    Completion,
    Other,
}

impl QuestionKind {
    pub fn parse(question_type: Option<&str>) -> Self {
        match question_type.map(|t| t.trim().to_lowercase()).as_deref() {
            Some("single") => QuestionKind::Single,
            Some("multiple") => QuestionKind::Multiple,
            Some("judge") | Some("judgement") => QuestionKind::Judge,
            Some("completion") => QuestionKind::Completion,
            _ => QuestionKind::Other,
        }
    }

    fn label(self) -> Option<&'static str> {
        match self {
            QuestionKind::Single => Some("单选题"),
            QuestionKind::Multiple => Some("多选题"),
            QuestionKind::Judge => Some("判断题"),
            QuestionKind::Completion => Some("填空题"),
            QuestionKind::Other => None,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            QuestionKind::Multiple => {
                "注意：这是多选题，请直接给出每个正确选项的内容，多个答案之间用#分隔，\
                 例如：选项内容1#选项内容2。不要包含选项字母(A、B、C、D)。"
            }
            QuestionKind::Single => {
                "注意：这是单选题，请直接给出正确选项的内容，不要包含选项字母(A、B、C、D)。"
            }
            QuestionKind::Judge => "注意：这是判断题，请只回答'正确'或'错误'。",
            QuestionKind::Completion | QuestionKind::Other => "请直接给出答案，不需要解释过程。",
        }
    }
}

/// Build the system + user messages for one question.
pub fn build_messages(system_prompt: &str, request: &AnswerRequest) -> Vec<ChatMessage> {
    let kind = QuestionKind::parse(request.question_type.as_deref());

    let mut prompt = format!("请回答以下题目：\n\n题目：{}\n", request.question.trim());
    match (kind.label(), request.question_type.as_deref()) {
        (Some(label), _) => prompt.push_str(&format!("题型：{label}\n")),
        (None, Some(raw)) if !raw.trim().is_empty() => {
            prompt.push_str(&format!("题型：{}\n", raw.trim()))
        }
        _ => {}
    }
    if let Some(options) = request.options.as_deref().filter(|o| !o.trim().is_empty()) {
        prompt.push_str(&format!("选项：\n{}\n", options.trim()));
    }
    prompt.push('\n');
    prompt.push_str(kind.instruction());
    prompt.push_str("\n\n你的整个回复应该只包含答案本身，不要包含任何额外的文字、解释或选项字母。");

    let mut messages = Vec::with_capacity(2);
    if !system_prompt.trim().is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

const ANSWER_PREFIXES: &[&str] = &[
    "正确答案是：",
    "正确答案是:",
    "正确答案：",
    "正确答案:",
    "答案是：",
    "答案是:",
    "答案：",
    "答案:",
    "Answer:",
    "answer:",
    "选项",
];

const NEGATIVE_MARKERS: &[&str] = &["不正确", "不对", "错误", "错", "false", "×", "✗"];
const POSITIVE_MARKERS: &[&str] = &["正确", "对", "true", "√", "✓"];

/// Reduce a raw completion to the bare answer. Returns an empty string when
/// nothing usable remains.
pub fn clean_answer(raw: &str, question_type: Option<&str>) -> String {
    let mut answer = strip_reasoning(raw).trim().to_string();

    for prefix in ANSWER_PREFIXES {
        if let Some(rest) = answer.strip_prefix(prefix) {
            answer = rest.trim().to_string();
        }
    }

    if QuestionKind::parse(question_type) == QuestionKind::Judge {
        if let Some(verdict) = normalize_judgement(&answer) {
            return verdict.to_string();
        }
    }

    answer
        .split('#')
        .map(|part| strip_option_letter(part.trim()))
        .collect::<Vec<_>>()
        .join("#")
}

/// Keep only the text after the last `</think>` when a reasoning block is
/// present. A reply that is all reasoning yields an empty string.
fn strip_reasoning(content: &str) -> &str {
    if content.contains("<think>") {
        if let Some(end) = content.rfind("</think>") {
            return content[end + "</think>".len()..].trim();
        }
    }
    content
}

fn normalize_judgement(answer: &str) -> Option<&'static str> {
    let lowered = answer.trim().to_lowercase();
    if matches!(lowered.as_str(), "n" | "no" | "f")
        || NEGATIVE_MARKERS.iter().any(|m| lowered.contains(m))
    {
        return Some("错误");
    }
    if matches!(lowered.as_str(), "y" | "yes" | "t")
        || POSITIVE_MARKERS.iter().any(|m| lowered.contains(m))
    {
        return Some("正确");
    }
    None
}

/// Drop a leading `A.` / `B、` / `C:` / `D ` option marker.
fn strip_option_letter(part: &str) -> &str {
    let mut chars = part.chars();
    match (chars.next(), chars.next()) {
        (Some('A'..='D'), Some(sep)) if matches!(sep, '.' | '、' | ':' | '：') || sep.is_whitespace() => {
            chars.as_str().trim_start()
        }
        _ => part,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use answerpool_types::upstream::ChatRole;

    #[test]
    fn test_build_messages_for_multiple_choice() {
        let req = AnswerRequest::new("  Which are primes? ")
            .with_type("multiple")
            .with_options("A. 2\nB. 3\nC. 4");
        let messages = build_messages("sys", &req);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        let user = &messages[1].content;
        assert!(user.contains("题目：Which are primes?\n"));
        assert!(user.contains("题型：多选题"));
        assert!(user.contains("选项：\nA. 2\nB. 3\nC. 4"));
        assert!(user.contains("#分隔"));
    }

    #[test]
    fn test_build_messages_free_type_and_no_system() {
        let req = AnswerRequest::new("q").with_type("essay");
        let messages = build_messages("", &req);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("题型：essay"));
        assert!(messages[0].content.contains("不需要解释过程"));
    }

    #[test]
    fn test_clean_strips_reasoning_and_prefix() {
        let raw = "<think>hmm, B seems right</think>\n答案：B. 北京";
        assert_eq!(clean_answer(raw, Some("single")), "北京");
    }

    #[test]
    fn test_clean_multiple_strips_letters_after_separator() {
        assert_eq!(clean_answer("A. 2# B、3", Some("multiple")), "2#3");
    }

    #[test]
    fn test_clean_judge_normalizes() {
        assert_eq!(clean_answer("True", Some("judge")), "正确");
        assert_eq!(clean_answer("答案：√", Some("judge")), "正确");
        assert_eq!(clean_answer("不正确", Some("judge")), "错误");
        assert_eq!(clean_answer("no", Some("judgement")), "错误");
    }

    #[test]
    fn test_clean_leaves_plain_answers() {
        assert_eq!(clean_answer("  Avogadro constant ", None), "Avogadro constant");
        assert_eq!(clean_answer("42", Some("completion")), "42");
    }

    #[test]
    fn test_clean_empty_after_reasoning_only() {
        assert_eq!(clean_answer("   ", None), "");
        assert_eq!(clean_answer("答案：", None), "");
        assert_eq!(clean_answer("<think>working it out</think>\n", None), "");
    }
}
