//! Per-session code editor state.

use serde::{Deserialize, Serialize};

use crate::domain::Language;
use crate::seeds::is_default_snippet;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Editor {
  pub language: Language,
  pub code: String,
}

impl Default for Editor {
  fn default() -> Self {
    let language = Language::default();
    Self { language, code: language.default_snippet().to_string() }
  }
}

impl Editor {
  /// Empty or still one of the starter snippets.
  pub fn is_untouched(&self) -> bool {
    self.code.trim().is_empty() || is_default_snippet(&self.code)
  }

  /// Switch language. An untouched buffer is replaced with the new
  /// language's starter snippet; custom code is kept. Returns true if the
  /// buffer was replaced.
  pub fn change_language(&mut self, language: Language) -> bool {
    self.language = language;
    if self.is_untouched() {
      self.code = language.default_snippet().to_string();
      true
    } else {
      false
    }
  }

  pub fn set_code(&mut self, code: String) {
    self.code = code;
  }
}
