//! Equation verbalization: math markup → spoken-language string.
//!
//! Two tiers, first success wins, composed with explicit per-tier results
//! rather than caught panics:
//!
//! 1. **Symbolic** — lex the markup into an operator/operand token stream
//!    and validate it against a conventional expression grammar. On
//!    success the token stream is spoken in its original left-to-right
//!    order with each operator replaced by its phrase.
//! 2. **Pattern** — textual rewriting for markup the grammar rejects
//!    (LaTeX commands, fractions, sub/superscripts): cosmetic-delimiter
//!    stripping, longest-match-first symbol substitution, and
//!    balanced-brace resolution of `\frac`/`^`/`_` constructs.
//!
//! Both tiers failing yields a verbatim fallback that labels the raw
//! markup, which makes [`verbalize`] total over arbitrary input — a
//! garbled equation degrades the narration, never the job.

use once_cell::sync::Lazy;
use regex::Regex;

/// Convert one math-markup string into a natural-language description.
///
/// Total function: never panics, never returns an empty string.
pub fn verbalize(markup: &str) -> String {
    match symbolic::verbalize(markup) {
        Ok(spoken) => spoken,
        Err(_) => match pattern::verbalize(markup) {
            Ok(spoken) => spoken,
            Err(_) => format!("the mathematical expression {}", markup),
        },
    }
}

/// A tier declining its input; the next strategy in line runs.
#[derive(Debug)]
pub(crate) struct NeedsFallback {
    #[allow(dead_code)]
    pub reason: String,
}

impl NeedsFallback {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// ── Tier 1: symbolic ─────────────────────────────────────────────────────

mod symbolic {
    use super::NeedsFallback;

    #[derive(Debug, Clone, PartialEq)]
    enum Token {
        Number(String),
        Ident(String),
        Plus,
        Minus,
        Star,
        Slash,
        Caret,
        Equals,
        LParen,
        RParen,
        Comma,
    }

    /// Lex into tokens; any character outside the expression alphabet
    /// (LaTeX backslashes, braces, underscores) sends the markup to the
    /// pattern tier.
    fn lex(input: &str) -> Result<Vec<Token>, NeedsFallback> {
        let mut tokens = Vec::new();
        let mut chars = input.chars().peekable();

        while let Some(&c) = chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '0'..='9' => {
                    let mut num = String::new();
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_digit() || d == '.' {
                            num.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token::Number(num));
                }
                c if c.is_alphabetic() => {
                    let mut ident = String::new();
                    while let Some(&a) = chars.peek() {
                        if a.is_alphanumeric() {
                            ident.push(a);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(Token::Ident(ident));
                }
                '+' => {
                    chars.next();
                    tokens.push(Token::Plus);
                }
                '-' => {
                    chars.next();
                    tokens.push(Token::Minus);
                }
                '*' => {
                    chars.next();
                    tokens.push(Token::Star);
                }
                '/' => {
                    chars.next();
                    tokens.push(Token::Slash);
                }
                '^' => {
                    chars.next();
                    tokens.push(Token::Caret);
                }
                '=' => {
                    chars.next();
                    tokens.push(Token::Equals);
                }
                '(' => {
                    chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    chars.next();
                    tokens.push(Token::RParen);
                }
                ',' => {
                    chars.next();
                    tokens.push(Token::Comma);
                }
                other => {
                    return Err(NeedsFallback::new(format!(
                        "character '{other}' outside expression alphabet"
                    )))
                }
            }
        }

        if tokens.is_empty() {
            return Err(NeedsFallback::new("empty markup"));
        }
        Ok(tokens)
    }

    /// Recursive-descent validation against:
    ///
    /// ```text
    /// equation := expr ('=' expr)*
    /// expr     := term (('+'|'-') term)*
    /// term     := factor (('*'|'/') factor)*
    /// factor   := unary ('^' factor)?
    /// unary    := '-' unary | primary
    /// primary  := Number | Ident ['(' expr (',' expr)* ')'] | '(' expr ')'
    /// ```
    struct Parser<'a> {
        tokens: &'a [Token],
        pos: usize,
    }

    impl<'a> Parser<'a> {
        fn peek(&self) -> Option<&'a Token> {
            self.tokens.get(self.pos)
        }

        fn bump(&mut self) -> Option<&'a Token> {
            let t = self.tokens.get(self.pos);
            if t.is_some() {
                self.pos += 1;
            }
            t
        }

        fn eat(&mut self, expected: &Token) -> bool {
            if self.peek() == Some(expected) {
                self.pos += 1;
                true
            } else {
                false
            }
        }

        fn equation(&mut self) -> Result<(), NeedsFallback> {
            self.expr()?;
            while self.eat(&Token::Equals) {
                self.expr()?;
            }
            Ok(())
        }

        fn expr(&mut self) -> Result<(), NeedsFallback> {
            self.term()?;
            while self.eat(&Token::Plus) || self.eat(&Token::Minus) {
                self.term()?;
            }
            Ok(())
        }

        fn term(&mut self) -> Result<(), NeedsFallback> {
            self.factor()?;
            while self.eat(&Token::Star) || self.eat(&Token::Slash) {
                self.factor()?;
            }
            Ok(())
        }

        fn factor(&mut self) -> Result<(), NeedsFallback> {
            self.unary()?;
            if self.eat(&Token::Caret) {
                self.factor()?;
            }
            Ok(())
        }

        fn unary(&mut self) -> Result<(), NeedsFallback> {
            if self.eat(&Token::Minus) {
                return self.unary();
            }
            self.primary()
        }

        fn primary(&mut self) -> Result<(), NeedsFallback> {
            match self.bump() {
                Some(Token::Number(_)) => Ok(()),
                Some(Token::Ident(_)) => {
                    if self.eat(&Token::LParen) {
                        self.expr()?;
                        while self.eat(&Token::Comma) {
                            self.expr()?;
                        }
                        if !self.eat(&Token::RParen) {
                            return Err(NeedsFallback::new("unclosed function call"));
                        }
                    }
                    Ok(())
                }
                Some(Token::LParen) => {
                    self.expr()?;
                    if !self.eat(&Token::RParen) {
                        return Err(NeedsFallback::new("unclosed parenthesis"));
                    }
                    Ok(())
                }
                _ => Err(NeedsFallback::new("expected operand")),
            }
        }
    }

    /// Speak the token stream in original order, operators replaced.
    /// Grouping parentheses and argument commas are not spoken.
    fn speak(tokens: &[Token]) -> String {
        let mut words: Vec<String> = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Number(n) => words.push(n.clone()),
                Token::Ident(name) => {
                    if name == "sqrt" && tokens.get(i + 1) == Some(&Token::LParen) {
                        words.push("the square root of".to_string());
                    } else {
                        words.push(name.clone());
                    }
                }
                Token::Plus => words.push("plus".to_string()),
                Token::Minus => words.push("minus".to_string()),
                Token::Star => words.push("times".to_string()),
                Token::Slash => words.push("divided by".to_string()),
                Token::Caret => words.push("to the power of".to_string()),
                Token::Equals => words.push("equals".to_string()),
                Token::LParen | Token::RParen | Token::Comma => {}
            }
        }
        words.join(" ")
    }

    pub(super) fn verbalize(markup: &str) -> Result<String, NeedsFallback> {
        let tokens = lex(markup)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
        };
        parser.equation()?;
        if parser.pos != tokens.len() {
            return Err(NeedsFallback::new("trailing tokens after expression"));
        }
        Ok(speak(&tokens))
    }
}

// ── Tier 2: pattern ──────────────────────────────────────────────────────

mod pattern {
    use super::{NeedsFallback, Lazy, Regex};

    /// Symbol/command → spoken phrase.
    ///
    /// Substitution is longest-match-first so `\int` never fires inside
    /// `\into`-style longer commands and `\in` never fires inside `\int`
    /// or `\infty`.
    const SYMBOLS: &[(&str, &str)] = &[
        // Greek letters (lowercase)
        ("\\alpha", "alpha"),
        ("\\beta", "beta"),
        ("\\gamma", "gamma"),
        ("\\delta", "delta"),
        ("\\epsilon", "epsilon"),
        ("\\zeta", "zeta"),
        ("\\eta", "eta"),
        ("\\theta", "theta"),
        ("\\iota", "iota"),
        ("\\kappa", "kappa"),
        ("\\lambda", "lambda"),
        ("\\mu", "mu"),
        ("\\nu", "nu"),
        ("\\xi", "xi"),
        ("\\pi", "pi"),
        ("\\rho", "rho"),
        ("\\sigma", "sigma"),
        ("\\tau", "tau"),
        ("\\upsilon", "upsilon"),
        ("\\phi", "phi"),
        ("\\chi", "chi"),
        ("\\psi", "psi"),
        ("\\omega", "omega"),
        // Greek letters (uppercase)
        ("\\Gamma", "capital gamma"),
        ("\\Delta", "capital delta"),
        ("\\Theta", "capital theta"),
        ("\\Lambda", "capital lambda"),
        ("\\Xi", "capital xi"),
        ("\\Pi", "capital pi"),
        ("\\Sigma", "capital sigma"),
        ("\\Phi", "capital phi"),
        ("\\Psi", "capital psi"),
        ("\\Omega", "capital omega"),
        // Structural commands
        ("\\sqrt", "the square root of"),
        ("\\sum", "the sum of"),
        ("\\prod", "the product of"),
        ("\\int", "the integral of"),
        ("\\partial", "the partial derivative of"),
        ("\\infty", "infinity"),
        ("\\nabla", "nabla"),
        // Relations and operators
        ("\\leq", "less than or equal to"),
        ("\\geq", "greater than or equal to"),
        ("\\neq", "not equal to"),
        ("\\approx", "approximately equal to"),
        ("\\sim", "is distributed as"),
        ("\\propto", "is proportional to"),
        ("\\rightarrow", "tends to"),
        ("\\to", "tends to"),
        ("\\in", "in"),
        ("\\cdot", "times"),
        ("\\times", "times"),
        ("\\pm", "plus or minus"),
        ("=", "equals"),
        ("+", "plus"),
        ("-", "minus"),
        ("*", "times"),
        ("/", "divided by"),
        ("<", "less than"),
        (">", "greater than"),
    ];

    /// Cosmetic delimiter commands that carry no spoken content.
    const COSMETIC: &[&str] = &[
        "\\left", "\\right", "\\Bigg", "\\bigg", "\\Big", "\\big", "\\,", "\\;", "\\:", "\\!",
    ];

    static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

    /// Symbol table sorted by pattern length, longest first.
    static ORDERED_SYMBOLS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
        let mut table: Vec<_> = SYMBOLS.to_vec();
        table.sort_by_key(|(pat, _)| std::cmp::Reverse(pat.len()));
        table
    });

    pub(super) fn verbalize(markup: &str) -> Result<String, NeedsFallback> {
        // (a) strip cosmetics, collapse whitespace
        let mut text = markup.to_string();
        for cmd in COSMETIC {
            text = text.replace(cmd, " ");
        }
        let mut text = WHITESPACE_RUNS.replace_all(&text, " ").trim().to_string();

        // (b) longest-match-first symbol substitution
        for (pat, phrase) in ORDERED_SYMBOLS.iter() {
            if text.contains(pat) {
                text = text.replace(pat, &format!(" {phrase} "));
            }
        }

        // (c)–(e) structural resolution
        let text = resolve_fractions(&text);
        let text = resolve_scripts(&text, '^', " to the power of ");
        let text = resolve_scripts(&text, '_', " sub ");

        // Leftover grouping braces carry no spoken content.
        let text = text.replace(['{', '}'], " ");
        let text = WHITESPACE_RUNS.replace_all(&text, " ").trim().to_string();

        if text.is_empty() {
            Err(NeedsFallback::new("nothing speakable in markup"))
        } else {
            Ok(text)
        }
    }

    /// Resolve `\frac{A}{B}` → "A divided by B".
    ///
    /// Handles nested balanced groups by re-scanning after every
    /// substitution: an inner `\frac` surfaced by an outer replacement is
    /// resolved on the following pass. Running this on already-resolved
    /// text is a no-op.
    pub(super) fn resolve_fractions(input: &str) -> String {
        let mut text = input.to_string();
        let mut search_from = 0;

        while let Some(rel) = text[search_from..].find("\\frac") {
            let pos = search_from + rel;
            let after = pos + "\\frac".len();
            match parse_two_groups(&text[after..]) {
                Some((a, b, consumed)) => {
                    let replacement = format!("{} divided by {}", a.trim(), b.trim());
                    text.replace_range(pos..after + consumed, &replacement);
                    // Restart from the replacement: it may contain an
                    // inner \frac lifted out of the groups.
                    search_from = pos;
                }
                None => {
                    // Malformed occurrence stays verbatim; skip past it.
                    search_from = after;
                }
            }
        }
        text
    }

    /// Parse two consecutive balanced `{...}` groups, returning their
    /// contents and how many bytes were consumed.
    fn parse_two_groups(input: &str) -> Option<(String, String, usize)> {
        let (a, after_a) = parse_group(input)?;
        let (b, after_b) = parse_group(&input[after_a..])?;
        Some((a, b, after_a + after_b))
    }

    /// Parse one balanced `{...}` group (leading whitespace allowed).
    fn parse_group(input: &str) -> Option<(String, usize)> {
        let mut offset = 0;
        let mut chars = input.char_indices().peekable();

        // Skip leading whitespace
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
            } else {
                offset = i;
                break;
            }
        }

        let (_, c) = chars.next()?;
        if c != '{' {
            return None;
        }

        let mut depth = 1usize;
        for (i, c) in chars {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let content = &input[offset + 1..i];
                        return Some((content.to_string(), i + 1));
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Resolve `^{...}`/`^x` and `_{...}`/`_x` constructs.
    ///
    /// A brace group is taken whole (balanced); otherwise the next
    /// alphanumeric run counts as the single-token operand.
    fn resolve_scripts(input: &str, marker: char, phrase: &str) -> String {
        let mut text = input.to_string();
        let mut search_from = 0;

        while let Some(rel) = text[search_from..].find(marker) {
            let pos = search_from + rel;
            let after = pos + marker.len_utf8();
            let rest = &text[after..];

            if let Some((group, consumed)) = parse_group(rest) {
                let replacement = format!("{}{}", phrase, group.trim());
                text.replace_range(pos..after + consumed, &replacement);
                search_from = pos + phrase.len();
            } else {
                // Single token: the next alphanumeric run (leading
                // whitespace allowed).
                let skipped = rest.len() - rest.trim_start().len();
                let token_len = rest
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_alphanumeric())
                    .map(char::len_utf8)
                    .sum::<usize>();
                if token_len == 0 {
                    search_from = after;
                    continue;
                }
                let token = rest.trim_start()[..token_len].to_string();
                let replacement = format!("{}{}", phrase, token);
                text.replace_range(pos..after + skipped + token_len, &replacement);
                search_from = pos + phrase.len();
            }
        }
        text
    }

    #[cfg(test)]
    pub(super) fn resolve_fractions_for_tests(input: &str) -> String {
        resolve_fractions(input)
    }
}
