//! Seed data: built-in challenges and the fixed fallback challenge.

use crate::domain::{Challenge, ChallengeKind, ChallengeOrigin, Difficulty};

/// Id of the fixed last-resort challenge.
pub const FALLBACK_ID: &str = "fallback";

#[allow(clippy::too_many_arguments)]
fn seed(
  id: &str,
  difficulty: Difficulty,
  topic: &str,
  question: &str,
  code_snippet: &str,
  correct_answer: &str,
  explanation: &str,
  options: &[&str],
) -> Challenge {
  Challenge {
    id: id.into(),
    topic: topic.into(),
    difficulty,
    kind: if options.is_empty() { ChallengeKind::ShortAnswer } else { ChallengeKind::MultipleChoice },
    origin: ChallengeOrigin::Seed,
    question: question.into(),
    code_snippet: code_snippet.into(),
    correct_answer: correct_answer.into(),
    explanation: explanation.into(),
    options: options.iter().map(|o| o.to_string()).collect(),
  }
}

/// Minimal set of built-in challenges that keep the arena playable
/// without external config or an OpenAI key.
pub fn seed_challenges() -> Vec<Challenge> {
  vec![
    seed(
      "seed-n1",
      Difficulty::Novice,
      "Operators & Expressions",
      "What does this program print?",
      "#include <stdio.h>\n\nint main() {\n  int x = 7 / 2;\n  printf(\"%d\", x);\n  return 0;\n}",
      "3",
      "Integer division truncates toward zero.",
      &[],
    ),
    seed(
      "seed-n2",
      Difficulty::Novice,
      "Variables & Data Types",
      "Which format specifier prints a char?",
      "char c = 'A';\nprintf(\"%?\", c);",
      "%c",
      "%c prints a single character; %s expects a NUL-terminated string.",
      &["%d", "%s", "%c", "%f"],
    ),
    seed(
      "seed-i1",
      Difficulty::Intermediate,
      "Pointers & Memory Addressing",
      "What is printed?",
      "int a[] = {10, 20, 30};\nint *p = a;\np++;\nprintf(\"%d\", *p);",
      "20",
      "Incrementing p moves it to the next int element.",
      &[],
    ),
    seed(
      "seed-i2",
      Difficulty::Intermediate,
      "Strings & String Library",
      "What does strlen return here?",
      "char s[10] = \"abc\";\nprintf(\"%zu\", strlen(s));",
      "3",
      "strlen counts characters before the terminating NUL, not the buffer size.",
      &["3", "4", "10", "9"],
    ),
    seed(
      "seed-e1",
      Difficulty::Expert,
      "Bitwise Operators",
      "What is printed?",
      "unsigned x = 0xF0;\nprintf(\"%u\", (x >> 4) ^ 0x5);",
      "10",
      "0xF0 >> 4 is 15; 15 XOR 5 is 10.",
      &[],
    ),
    seed(
      "seed-e2",
      Difficulty::Expert,
      "Structures & Unions",
      "On a typical 64-bit ABI, what is sizeof(struct S)?",
      "struct S {\n  char c;\n  double d;\n  int i;\n};",
      "24",
      "d is 8-byte aligned after c, and the struct is padded to a multiple of 8.",
      &["13", "16", "20", "24"],
    ),
  ]
}

/// Absolute last-resort challenge used whenever sourcing fails.
pub fn hard_fallback_challenge(difficulty: Difficulty) -> Challenge {
  Challenge {
    id: FALLBACK_ID.into(),
    topic: "Fallback".into(),
    difficulty,
    kind: ChallengeKind::ShortAnswer,
    origin: ChallengeOrigin::Fallback,
    question: "What is the output of printf(\"%d\", 10 + 20);?".into(),
    code_snippet: "#include <stdio.h>\n\nint main() {\n  printf(\"%d\", 10 + 20);\n  return 0;\n}".into(),
    correct_answer: "30".into(),
    explanation: "Basic arithmetic addition.".into(),
    options: Vec::new(),
  }
}
