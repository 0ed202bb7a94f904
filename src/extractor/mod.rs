//! Embedded script extraction for HTML documents
//!
//! Architectural Principle: Pure Transformation - the extractor is a finite state machine
//! - Each input line maps to exactly one output line so reported positions stay valid
//! - Only text between `<script ...>` and `</script>` survives, everything else is blanked
//! - Tag matching is case-insensitive and is not a general HTML parser

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

lazy_static! {
    /// `<script` followed by whitespace, `>` or the end of the line
    static ref START_TAG: Regex = RegexBuilder::new(r"(<\s*script)(?:[\s>]|$)")
        .case_insensitive(true)
        .build()
        .expect("start tag pattern is valid");
    /// `</script` followed by whitespace, `>` or the end of the line
    static ref END_TAG: Regex = RegexBuilder::new(r"</\s*script(?:[\s>]|$)")
        .case_insensitive(true)
        .build()
        .expect("end tag pattern is valid");
}

/// Where the extractor is relative to the script tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorState {
    /// Outside any script element
    #[default]
    Ignore,
    /// Inside an opening `<script ...` tag, waiting for its `>`
    SeekingTagClose,
    /// Inside a script body
    PassingThrough,
}

/// Apply one input line to the machine.
///
/// Returns the line to emit and the state to use for the next line. The
/// emitted line is `"\n"` when nothing but whitespace survives; otherwise
/// blanked characters in front of kept script text become spaces and the
/// input's own line terminator is preserved.
pub fn transition(state: ExtractorState, line: &str) -> (String, ExtractorState) {
    let (body, terminator) = split_terminator(line);
    let mut emitted = String::new();
    let mut blanked = 0usize;
    let mut rest = body;
    let mut state = state;

    loop {
        match state {
            ExtractorState::Ignore => match START_TAG.captures(rest) {
                Some(caps) => {
                    let end = caps.get(1).map_or(0, |m| m.end());
                    blanked += rest[..end].chars().count();
                    rest = &rest[end..];
                    state = ExtractorState::SeekingTagClose;
                }
                None => break,
            },
            ExtractorState::SeekingTagClose => match rest.find('>') {
                Some(pos) => {
                    blanked += rest[..=pos].chars().count();
                    rest = &rest[pos + 1..];
                    state = ExtractorState::PassingThrough;
                }
                None => break,
            },
            ExtractorState::PassingThrough => match END_TAG.find(rest) {
                Some(close) => {
                    keep(&mut emitted, &mut blanked, &rest[..close.start()]);
                    let tail = after_closing_tag(rest, close.end());
                    blanked += rest[close.start()..rest.len() - tail.len()].chars().count();
                    rest = tail;
                    state = ExtractorState::Ignore;
                }
                None => {
                    keep(&mut emitted, &mut blanked, rest);
                    break;
                }
            },
        }
    }

    if emitted.trim().is_empty() {
        ("\n".to_string(), state)
    } else {
        emitted.push_str(terminator);
        (emitted, state)
    }
}

/// Line-preserving script extractor
#[derive(Debug, Default)]
pub struct ScriptExtractor {
    state: ExtractorState,
}

impl ScriptExtractor {
    /// Create an extractor positioned outside any script element
    pub fn new() -> Self {
        Self::default()
    }

    /// Current machine state
    pub fn state(&self) -> ExtractorState {
        self.state
    }

    /// Feed the next line of a document and get its transformed form
    pub fn feed(&mut self, line: &str) -> String {
        let (emitted, next) = transition(self.state, line);
        self.state = next;
        emitted
    }

    /// Run a fresh machine over a whole line sequence
    pub fn process<I, S>(lines: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::lines(lines).collect()
    }

    /// Run a fresh machine over text, splitting it into newline-terminated lines
    pub fn process_text(text: &str) -> String {
        Self::lines(split_lines(text)).collect()
    }

    /// Lazily transform a line sequence
    pub fn lines<I, S>(lines: I) -> ScriptLines<I::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ScriptLines { inner: lines.into_iter(), extractor: Self::new() }
    }
}

/// Iterator adapter returned by [`ScriptExtractor::lines`]
#[derive(Debug)]
pub struct ScriptLines<I> {
    inner: I,
    extractor: ScriptExtractor,
}

impl<I, S> Iterator for ScriptLines<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let line = self.inner.next()?;
        Some(self.extractor.feed(line.as_ref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Split text into lines that keep their `\n` terminators
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn keep(emitted: &mut String, blanked: &mut usize, segment: &str) {
    if segment.is_empty() {
        return;
    }
    emitted.extend(std::iter::repeat(' ').take(*blanked));
    *blanked = 0;
    emitted.push_str(segment);
}

/// Remainder of the line after a closing tag whose match ended at `match_end`
fn after_closing_tag(rest: &str, match_end: usize) -> &str {
    if rest[..match_end].ends_with('>') {
        return &rest[match_end..];
    }
    match rest[match_end..].find('>') {
        Some(pos) => &rest[match_end + pos + 1..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn extract(text: &str) -> Vec<String> {
        ScriptExtractor::process(split_lines(text))
    }

    #[test]
    fn test_script_body_is_preserved() {
        let output = extract("<script>\nalert(1);\n</script>\n");
        assert_eq!(output, vec!["\n", "alert(1);\n", "\n"]);
    }

    #[test]
    fn test_multi_line_opening_tag() {
        let output = extract("<script\n  type='text/javascript'>\nx=1;\n</script>\n");
        assert_eq!(output, vec!["\n", "\n", "x=1;\n", "\n"]);
    }

    #[test]
    fn test_html_without_scripts_is_blank() {
        let input = "<html>\n<body>\n  <p>Hello</p>\n</body>\n</html>\n";
        let output = extract(input);
        assert_eq!(output.len(), 5);
        assert!(output.iter().all(|line| line == "\n"));
    }

    #[test]
    fn test_inline_script_keeps_columns() {
        let output = extract("<p>x</p><script>var a = 1;</script><p>y</p>\n");
        assert_eq!(output, vec![format!("{}var a = 1;\n", " ".repeat(16))]);
    }

    #[test]
    fn test_two_scripts_on_one_line() {
        let output = extract("<script>a();</script><script>b();</script>\n");
        assert_eq!(output.len(), 1);
        assert_eq!(output[0], format!("{}a();{}b();\n", " ".repeat(8), " ".repeat(17)));
    }

    #[rstest]
    #[case("<SCRIPT>\nx();\n</SCRIPT>\n")]
    #[case("<Script type=\"module\">\nx();\n</sCrIpT>\n")]
    #[case("< script >\nx();\n</ script>\n")]
    #[case("<script\n>\nx();\n</script\n>\n")]
    fn test_tag_variants(#[case] input: &str) {
        let output = extract(input);
        assert_eq!(output.len(), input.lines().count());
        assert!(output.iter().any(|line| line == "x();\n"));
        assert!(output.iter().filter(|line| *line != "x();\n").all(|line| line == "\n"));
    }

    #[test]
    fn test_scriptlike_tag_names_are_ignored() {
        let output = extract("<scripted>\nx();\n</scripted>\n");
        assert!(output.iter().all(|line| line == "\n"));
    }

    #[test]
    fn test_whitespace_only_script_lines_are_blank() {
        let output = extract("<script>\n   \n\tfoo();\n</script>\n");
        assert_eq!(output, vec!["\n", "\n", "\tfoo();\n", "\n"]);
    }

    #[test]
    fn test_content_before_closing_tag_is_kept() {
        let output = extract("<script>\n  done();</script> <p>after</p>\n<p>more</p>\n");
        assert_eq!(output, vec!["\n", "  done();\n", "\n"]);
    }

    #[test]
    fn test_nested_open_tag_does_not_end_passthrough() {
        let output = extract("<script>\nvar s = '<script>';\n</script>\n");
        assert_eq!(output[1], "var s = '<script>';\n");
    }

    #[test]
    fn test_crlf_terminators_are_preserved_for_kept_lines() {
        let output = extract("<script>\r\nrun();\r\n</script>\r\n");
        assert_eq!(output, vec!["\n", "run();\r\n", "\n"]);
    }

    #[test]
    fn test_last_line_without_newline() {
        let output = extract("<script>\nlast()");
        assert_eq!(output, vec!["\n", "last()"]);
    }

    #[test]
    fn test_unclosed_script_passes_through_to_end() {
        let output = extract("<p>\n<script>\na();\nb();\n");
        assert_eq!(output, vec!["\n", "\n", "a();\n", "b();\n"]);
    }

    #[test]
    fn test_line_count_is_invariant() {
        let inputs = [
            "",
            "\n",
            "<script></script>\n",
            "<script>a</script>\n<script>\nb\n",
            "text\n<script type='x'\ndata-a='1'\n>c\n</script>tail\n<script>d</script>",
            "<script>\n</script><script>\n</script>\n\n\n",
        ];
        for input in inputs {
            let lines: Vec<&str> = split_lines(input).collect();
            assert_eq!(extract(input).len(), lines.len(), "input: {input:?}");
        }
    }

    #[test]
    fn test_transition_is_pure() {
        let (line, state) = transition(ExtractorState::Ignore, "<script type='text/javascript'\n");
        assert_eq!(line, "\n");
        assert_eq!(state, ExtractorState::SeekingTagClose);

        let (line, state) = transition(ExtractorState::SeekingTagClose, "  defer>go();\n");
        assert_eq!(line, format!("{}go();\n", " ".repeat(8)));
        assert_eq!(state, ExtractorState::PassingThrough);

        let (line, state) = transition(ExtractorState::PassingThrough, "</script>\n");
        assert_eq!(line, "\n");
        assert_eq!(state, ExtractorState::Ignore);
    }

    #[test]
    fn test_streaming_feed_matches_batch() {
        let input = "<div>\n<script>\nlet a = 1;\n</script>\n</div>\n";
        let mut extractor = ScriptExtractor::new();
        let streamed: Vec<String> = split_lines(input).map(|l| extractor.feed(l)).collect();
        assert_eq!(streamed, extract(input));
        assert_eq!(extractor.state(), ExtractorState::Ignore);
    }

    #[test]
    fn test_process_text_joins_lines() {
        let text = ScriptExtractor::process_text("<b>\n<script>\nx=1;\n</script>\n");
        assert_eq!(text, "\n\nx=1;\n\n");
        assert_eq!(text.lines().count(), 4);
    }
}
