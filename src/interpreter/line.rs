//! Splitting a script line into instructions

/// Lines starting with this character are text to display
pub const TEXT_DELIMITER: char = '`';
/// A trailing page-break marker
pub const PAGE_BREAK: char = '\\';

pub const TEXT_OPCODE: &str = "`";
pub const PAGE_OPCODE: &str = "\\";

/// One opcode and its raw argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: String,
    pub argument: String,
}

impl Instruction {
    pub fn new(opcode: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            argument: argument.into(),
        }
    }
}

/// Parse one line into the instructions it expands to, in execution order.
///
/// - `` `text `` is the text opcode with the rest of the line as argument
/// - `!w500` splits before the first digit (`!w`, `500`)
/// - anything else splits at the first space
///
/// An argument ending in `\` becomes the command followed by a page break.
/// `if` is left whole: its body is split when the condition holds.
pub fn parse_line(line: &str) -> Vec<Instruction> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let (opcode, argument) = if let Some(text) = line.strip_prefix(TEXT_DELIMITER) {
        (TEXT_OPCODE, text)
    } else if line.starts_with('!') {
        match line.find(|c: char| c.is_ascii_digit()) {
            Some(at) => line.split_at(at),
            None => (line, ""),
        }
    } else {
        match line.split_once(' ') {
            Some((opcode, argument)) => (opcode, argument.trim()),
            None => (line, ""),
        }
    };

    if opcode != PAGE_OPCODE
        && opcode != "if"
        && let Some(body) = argument.strip_suffix(PAGE_BREAK)
    {
        return vec![
            Instruction::new(opcode, body),
            Instruction::new(PAGE_OPCODE, ""),
        ];
    }
    vec![Instruction::new(opcode, argument)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_line_keeps_inner_spacing() {
        assert_eq!(
            parse_line("`  Hello, world@"),
            vec![Instruction::new("`", "  Hello, world@")]
        );
    }

    #[test]
    fn trailing_page_break_splits_into_two() {
        assert_eq!(
            parse_line("`Hello@World\\"),
            vec![Instruction::new("`", "Hello@World"), Instruction::new("\\", "")]
        );
        assert_eq!(
            parse_line("bg black,%1,500\\"),
            vec![Instruction::new("bg", "black,%1,500"), Instruction::new("\\", "")]
        );
    }

    #[test]
    fn bare_page_break_is_single_instruction() {
        assert_eq!(parse_line("\\"), vec![Instruction::new("\\", "")]);
    }

    #[test]
    fn inline_timer_splits_at_first_digit() {
        assert_eq!(parse_line("!w500"), vec![Instruction::new("!w", "500")]);
        assert_eq!(parse_line("!sd"), vec![Instruction::new("!sd", "")]);
    }

    #[test]
    fn opcode_splits_at_first_space() {
        assert_eq!(parse_line("mov $x,5"), vec![Instruction::new("mov", "$x,5")]);
        assert_eq!(parse_line("  return  "), vec![Instruction::new("return", "")]);
        assert!(parse_line("   ").is_empty());
    }

    #[test]
    fn if_body_is_not_split_early() {
        assert_eq!(
            parse_line("if %flg1==1 `Yes\\"),
            vec![Instruction::new("if", "%flg1==1 `Yes\\")]
        );
    }
}
