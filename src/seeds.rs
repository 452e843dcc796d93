//! Seed data: the bootstrap admin account, built-in problems and starter snippets.

use chrono::Utc;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::domain::{Difficulty, Language, Problem, ProblemOrigin, Role, Sample, TestCase, User};
use crate::error::AppResult;

pub const SEED_ADMIN_USERNAME: &str = "admin";
pub const SEED_ADMIN_PASSWORD: &str = "password";

/// Starter code shown in the editor for each language.
pub fn default_snippet(lang: Language) -> &'static str {
  match lang {
    Language::Python => "def solve():\n    # Read input\n    # Process and print output\n    pass\n\nsolve()",
    Language::JavaScript => "function solve() {\n    // Read input from process.stdin\n    // Process and console.log(output)\n}\n\nsolve();",
    Language::TypeScript => "function solve(): void {\n    // Read input\n    // Process and console.log(output)\n}\n\nsolve();",
    Language::Java => "import java.util.*;\nimport java.io.*;\n\npublic class Main {\n    public static void main(String[] args) {\n        // Your code here\n    }\n}",
    Language::Cpp => "#include <iostream>\n#include <vector>\n#include <string>\n\nvoid solve() {\n    // Your code here\n}\n\nint main() {\n    std::ios_base::sync_with_stdio(false);\n    std::cin.tie(NULL);\n    solve();\n    return 0;\n}",
    Language::Go => "package main\n\nimport \"fmt\"\n\nfunc main() {\n    // Your code here\n}",
    Language::Rust => "fn main() {\n    // Your code here\n}",
  }
}

/// True if `code` is exactly one of the starter snippets.
pub fn is_default_snippet(code: &str) -> bool {
  Language::ALL.iter().any(|l| default_snippet(*l) == code)
}

/// The account that exists on a fresh install.
pub fn seed_users() -> AppResult<Vec<User>> {
  Ok(vec![User {
    id: "user_admin".into(),
    username: SEED_ADMIN_USERNAME.into(),
    password_hash: hash_password(SEED_ADMIN_PASSWORD)?,
    role: Role::Admin,
    created_at: Utc::now(),
  }])
}

/// Minimal set of built-in problems so the app is usable without config
/// or a reachable judge model.
pub fn seed_problems() -> Vec<Problem> {
  vec![
    Problem {
      id: "p_sum".into(),
      title: "Sum of Two Numbers".into(),
      description: "Read two integers `a` and `b` and print their sum.".into(),
      input_format: "A single line with two integers `a` and `b`.".into(),
      output_format: "A single integer: `a + b`.".into(),
      constraints: vec!["-10^9 <= a, b <= 10^9".into()],
      samples: vec![],
      difficulty: Some(Difficulty::Easy),
      test_cases: vec![
        tc("1 2", "3", true),
        tc("-5 5", "0", false),
        tc("1000000000 1000000000", "2000000000", false),
      ],
      origin: ProblemOrigin::Seed,
      created_at: Utc::now(),
    },
    Problem {
      id: "p_reverse".into(),
      title: "Reverse a String".into(),
      description: "Given a string `s`, print it reversed.".into(),
      input_format: "A single line containing `s`.".into(),
      output_format: "The reversed string.".into(),
      constraints: vec!["1 <= |s| <= 10^5".into(), "`s` contains printable ASCII only".into()],
      samples: vec![Sample {
        input: "hello".into(),
        output: "olleh".into(),
        explanation: Some("Characters are printed from last to first.".into()),
      }],
      difficulty: Some(Difficulty::Easy),
      test_cases: vec![
        tc("hello", "olleh", true),
        tc("racecar", "racecar", false),
        tc("ab cd", "dc ba", false),
      ],
      origin: ProblemOrigin::Seed,
      created_at: Utc::now(),
    },
  ]
}

fn tc(input: &str, output: &str, is_public: bool) -> TestCase {
  TestCase {
    id: Uuid::new_v4().to_string(),
    input: input.into(),
    output: output.into(),
    is_public,
  }
}
