use std::fmt::{Display, Write};

use crate::webhooks::github::Repository;

const SEPARATOR: &str = " — ";

/// Builds a single line notice. Line breaks written through [`std::fmt::Write`] are turned into
/// spaces, so whatever ends up in a title can't split a notice in two.
#[derive(Default)]
pub struct NoticeBuilder {
    plain: String,
}

impl NoticeBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn build(self) -> String {
        self.plain
    }

    pub fn separator(&mut self) {
        self.plain.push_str(SEPARATOR);
    }

    /// Link to something inside `repository`, e.g. `<html_url>/pull/42`
    pub fn repo_link(&mut self, repository: &Repository, kind: &str, id: impl Display) {
        write!(self, "{}/{}/{}", repository.link_prefix(), kind, id).unwrap();
    }
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0B' | '\x0C' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

impl std::fmt::Write for NoticeBuilder {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let mut last = 0;
        for (i, c) in s.char_indices() {
            if !is_line_break(c) {
                continue;
            }

            self.plain.push_str(&s[last..i]);
            self.plain.push(' ');
            last = i + c.len_utf8();
        }

        if last < s.len() {
            self.plain.push_str(&s[last..]);
        }

        Ok(())
    }
}
