#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Out,
    Append,
    Clobber,
    OutErr,
    OutErrAppend,
    ReadWrite,
    In,
    Heredoc,
    HereString,
    Duplicate,
}

impl RedirectKind {
    pub fn writes_file(self) -> bool {
        matches!(
            self,
            Self::Out
                | Self::Append
                | Self::Clobber
                | Self::OutErr
                | Self::OutErrAppend
                | Self::ReadWrite
        )
    }

    pub fn operator(self) -> &'static str {
        match self {
            Self::Out => ">",
            Self::Append => ">>",
            Self::Clobber => ">|",
            Self::OutErr => "&>",
            Self::OutErrAppend => "&>>",
            Self::ReadWrite => "<>",
            Self::In => "<",
            Self::Heredoc => "<<",
            Self::HereString => "<<<",
            Self::Duplicate => ">&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Pipe,
    And,
    Or,
    Semi,
    Background,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellToken {
    Word(String),
    Redirect {
        fd: Option<u32>,
        kind: RedirectKind,
        inline_target: Option<String>,
    },
    Separator(Separator),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub fd: Option<u32>,
    pub kind: RedirectKind,
    pub target: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleCommand {
    pub words: Vec<String>,
    pub redirects: Vec<Redirection>,
    /// Stdin comes from the previous command through `|`.
    pub piped: bool,
}

const COMMAND_KEYWORDS: &[&str] = &[
    "{", "}", "!", "if", "then", "else", "elif", "fi", "do", "done", "while", "until", "time",
];

const COMMAND_WRAPPERS: &[&str] = &[
    "sudo",
    "env",
    "nohup",
    "command",
    "builtin",
    "exec",
    "nice",
    "xargs",
    "caffeinate",
    "timeout",
];

impl SimpleCommand {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.redirects.is_empty()
    }

    pub fn program_index(&self) -> Option<usize> {
        let mut index = 0;
        let mut after_wrapper = false;
        while index < self.words.len() {
            let word = self.words[index].as_str();
            if COMMAND_KEYWORDS.contains(&word) || is_assignment(word) {
                index += 1;
                continue;
            }
            if after_wrapper && (word.starts_with('-') || word.parse::<f64>().is_ok()) {
                index += 1;
                continue;
            }
            if COMMAND_WRAPPERS.contains(&basename(word)) {
                after_wrapper = true;
                index += 1;
                continue;
            }
            return Some(index);
        }
        None
    }

    pub fn program(&self) -> Option<&str> {
        self.program_index()
            .map(|index| basename(self.words[index].as_str()))
    }

    pub fn args(&self) -> &[String] {
        match self.program_index() {
            Some(index) => &self.words[index + 1..],
            None => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedShell {
    pub commands: Vec<SimpleCommand>,
    pub substitutions: Vec<String>,
}

impl ParsedShell {
    pub fn all_words(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().flat_map(|command| {
            command.words.iter().map(String::as_str).chain(
                command
                    .redirects
                    .iter()
                    .filter(|redirect| redirect.kind != RedirectKind::Duplicate)
                    .filter_map(|redirect| redirect.target.as_deref()),
            )
        })
    }
}

pub fn basename(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

fn is_assignment(word: &str) -> bool {
    let Some((name, _)) = word.split_once('=') else {
        return false;
    };
    let mut chars = name.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn parse(input: &str) -> ParsedShell {
    let Lexed {
        tokens,
        substitutions,
        heredoc_bodies,
    } = tokenize(input);
    let mut commands = Vec::new();
    let mut current = SimpleCommand::default();
    let mut tokens = tokens.into_iter().peekable();
    let mut heredoc_bodies = heredoc_bodies.into_iter();

    while let Some(token) = tokens.next() {
        match token {
            ShellToken::Word(word) => current.words.push(word),
            ShellToken::Redirect {
                fd,
                kind,
                inline_target,
            } => {
                let target = if kind == RedirectKind::Duplicate {
                    inline_target
                } else if let Some(ShellToken::Word(_)) = tokens.peek() {
                    match tokens.next() {
                        Some(ShellToken::Word(word)) => Some(word),
                        _ => None,
                    }
                } else {
                    None
                };
                let body = if kind == RedirectKind::Heredoc {
                    heredoc_bodies.next()
                } else {
                    None
                };
                current.redirects.push(Redirection {
                    fd,
                    kind,
                    target,
                    body,
                });
            }
            ShellToken::Separator(separator) => {
                let pipe = separator == Separator::Pipe;
                if !current.is_empty() {
                    commands.push(std::mem::take(&mut current));
                    current.piped = pipe;
                } else if pipe {
                    current.piped = true;
                }
            }
        }
    }
    if !current.is_empty() {
        commands.push(current);
    }

    ParsedShell {
        commands,
        substitutions,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexed {
    pub tokens: Vec<ShellToken>,
    pub substitutions: Vec<String>,
    /// One body per `<<` operator, in operator order.
    pub heredoc_bodies: Vec<String>,
}

pub fn tokenize(input: &str) -> Lexed {
    let mut lexer = Lexer {
        chars: input.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
        word: String::new(),
        word_started: false,
        word_quoted: false,
        substitutions: Vec::new(),
        awaiting_heredoc: false,
        pending_heredocs: Vec::new(),
        heredoc_bodies: Vec::new(),
    };
    lexer.run();
    Lexed {
        tokens: lexer.tokens,
        substitutions: lexer.substitutions,
        heredoc_bodies: lexer.heredoc_bodies,
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<ShellToken>,
    word: String,
    word_started: bool,
    word_quoted: bool,
    substitutions: Vec<String>,
    awaiting_heredoc: bool,
    pending_heredocs: Vec<String>,
    heredoc_bodies: Vec<String>,
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn finish_word(&mut self) {
        if !self.word_started {
            return;
        }
        let word = std::mem::take(&mut self.word);
        if self.awaiting_heredoc {
            self.pending_heredocs.push(word.clone());
            self.awaiting_heredoc = false;
        }
        self.tokens.push(ShellToken::Word(word));
        self.word_started = false;
        self.word_quoted = false;
    }

    fn separator(&mut self, separator: Separator, width: usize) {
        self.finish_word();
        self.tokens.push(ShellToken::Separator(separator));
        self.pos += width;
    }

    fn run(&mut self) {
        while let Some(c) = self.peek(0) {
            match c {
                ' ' | '\t' | '\r' => {
                    self.finish_word();
                    self.pos += 1;
                }
                '\n' => {
                    self.separator(Separator::Semi, 1);
                    if !self.pending_heredocs.is_empty() {
                        self.read_heredoc_bodies();
                    }
                }
                '\\' => {
                    match self.peek(1) {
                        Some('\n') => {}
                        Some(escaped) => {
                            self.word.push(escaped);
                            self.word_started = true;
                        }
                        None => {}
                    }
                    self.pos += 2;
                }
                '\'' => {
                    self.word_started = true;
                    self.word_quoted = true;
                    self.pos += 1;
                    while let Some(inner) = self.peek(0) {
                        self.pos += 1;
                        if inner == '\'' {
                            break;
                        }
                        self.word.push(inner);
                    }
                }
                '"' => {
                    self.word_started = true;
                    self.word_quoted = true;
                    self.pos += 1;
                    self.read_double_quoted();
                }
                '$' if self.peek(1) == Some('(') => {
                    self.word_started = true;
                    self.read_substitution(2, "$(");
                }
                '`' => {
                    self.word_started = true;
                    self.read_backtick();
                }
                '#' if !self.word_started => {
                    while let Some(inner) = self.peek(0) {
                        if inner == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                '(' | ')' => self.separator(Separator::Semi, 1),
                '|' => match self.peek(1) {
                    Some('|') => self.separator(Separator::Or, 2),
                    Some('&') => self.separator(Separator::Pipe, 2),
                    _ => self.separator(Separator::Pipe, 1),
                },
                '&' => match self.peek(1) {
                    Some('&') => self.separator(Separator::And, 2),
                    Some('>') => {
                        self.finish_word();
                        if self.peek(2) == Some('>') {
                            self.push_redirect(None, RedirectKind::OutErrAppend, None, 3);
                        } else {
                            self.push_redirect(None, RedirectKind::OutErr, None, 2);
                        }
                    }
                    _ => self.separator(Separator::Background, 1),
                },
                ';' => self.separator(Separator::Semi, 1),
                '>' | '<' => {
                    let fd = self.take_fd_prefix();
                    if c == '>' {
                        self.read_output_redirect(fd);
                    } else {
                        self.read_input_redirect(fd);
                    }
                }
                other => {
                    self.word.push(other);
                    self.word_started = true;
                    self.pos += 1;
                }
            }
        }
        self.finish_word();
    }

    fn take_fd_prefix(&mut self) -> Option<u32> {
        let is_fd = self.word_started
            && !self.word_quoted
            && !self.word.is_empty()
            && self.word.chars().all(|c| c.is_ascii_digit());
        if is_fd {
            let fd = self.word.parse().ok();
            self.word.clear();
            self.word_started = false;
            fd
        } else {
            self.finish_word();
            None
        }
    }

    fn push_redirect(
        &mut self,
        fd: Option<u32>,
        kind: RedirectKind,
        inline_target: Option<String>,
        width: usize,
    ) {
        self.tokens.push(ShellToken::Redirect {
            fd,
            kind,
            inline_target,
        });
        self.pos += width;
    }

    fn read_output_redirect(&mut self, fd: Option<u32>) {
        match self.peek(1) {
            Some('>') => self.push_redirect(fd, RedirectKind::Append, None, 2),
            Some('|') => self.push_redirect(fd, RedirectKind::Clobber, None, 2),
            Some('&') => {
                self.pos += 2;
                let target = self.read_fd_digits();
                if target.is_empty() {
                    self.push_redirect(fd, RedirectKind::OutErr, None, 0);
                } else {
                    self.push_redirect(fd, RedirectKind::Duplicate, Some(target), 0);
                }
            }
            Some('(') => {
                self.word_started = true;
                self.read_substitution(2, ">(");
            }
            _ => self.push_redirect(fd, RedirectKind::Out, None, 1),
        }
    }

    fn read_input_redirect(&mut self, fd: Option<u32>) {
        match (self.peek(1), self.peek(2)) {
            (Some('<'), Some('<')) => self.push_redirect(fd, RedirectKind::HereString, None, 3),
            (Some('<'), next) => {
                let width = if next == Some('-') { 3 } else { 2 };
                self.push_redirect(fd, RedirectKind::Heredoc, None, width);
                self.awaiting_heredoc = true;
            }
            (Some('&'), _) => {
                self.pos += 2;
                let target = self.read_fd_digits();
                self.push_redirect(fd, RedirectKind::Duplicate, Some(target), 0);
            }
            (Some('>'), _) => self.push_redirect(fd, RedirectKind::ReadWrite, None, 2),
            (Some('('), _) => {
                self.word_started = true;
                self.read_substitution(2, "<(");
            }
            _ => self.push_redirect(fd, RedirectKind::In, None, 1),
        }
    }

    fn read_fd_digits(&mut self) -> String {
        let mut digits = String::new();
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() || (c == '-' && digits.is_empty()) {
                digits.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        digits
    }

    fn read_double_quoted(&mut self) {
        while let Some(c) = self.peek(0) {
            match c {
                '"' => {
                    self.pos += 1;
                    return;
                }
                '\\' if matches!(self.peek(1), Some('"' | '\\' | '$' | '`')) => {
                    if let Some(escaped) = self.peek(1) {
                        self.word.push(escaped);
                    }
                    self.pos += 2;
                }
                '$' if self.peek(1) == Some('(') => self.read_substitution(2, "$("),
                '`' => self.read_backtick(),
                other => {
                    self.word.push(other);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_substitution(&mut self, opener_width: usize, opener: &str) {
        self.pos += opener_width;
        let mut depth = 1usize;
        let mut body = String::new();
        let mut quote: Option<char> = None;
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            match quote {
                Some(open) => {
                    if c == open {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => quote = Some(c),
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                },
            }
            body.push(c);
        }
        self.word.push_str(opener);
        self.word.push_str(&body);
        self.word.push(')');
        self.substitutions.push(body);
    }

    fn read_backtick(&mut self) {
        self.pos += 1;
        let mut body = String::new();
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '`' {
                break;
            }
            body.push(c);
        }
        self.word.push('`');
        self.word.push_str(&body);
        self.word.push('`');
        self.substitutions.push(body);
    }

    fn read_heredoc_bodies(&mut self) {
        let mut body = String::new();
        while !self.pending_heredocs.is_empty() && self.pos < self.chars.len() {
            let start = self.pos;
            while let Some(c) = self.peek(0) {
                self.pos += 1;
                if c == '\n' {
                    break;
                }
            }
            let line: String = self.chars[start..self.pos].iter().collect();
            if line.trim() == self.pending_heredocs[0] {
                self.pending_heredocs.remove(0);
                self.heredoc_bodies.push(std::mem::take(&mut body));
            } else {
                body.push_str(&line);
            }
        }
        // Unterminated bodies run to the end of the input.
        for _ in self.pending_heredocs.drain(..) {
            self.heredoc_bodies.push(std::mem::take(&mut body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_every_separator() {
        let parsed = parse("a 1 | b && c || d ; e & f");
        let programs: Vec<_> = parsed
            .commands
            .iter()
            .filter_map(SimpleCommand::program)
            .collect();
        assert_eq!(programs, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn quotes_and_escapes_are_removed() {
        let parsed = parse(r#"echo 'a b' "c \"d\"" e\ f"#);
        assert_eq!(parsed.commands[0].words, vec!["echo", "a b", "c \"d\"", "e f"]);
    }

    #[test]
    fn redirect_operators_bind_to_nearest_target() {
        let parsed = parse("cmd >out.txt 2>>err.log &>both >|clob 2>&1 < in.txt");
        let redirects = &parsed.commands[0].redirects;
        let summary: Vec<_> = redirects
            .iter()
            .map(|r| (r.fd, r.kind, r.target.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (None, RedirectKind::Out, "out.txt".to_string()),
                (Some(2), RedirectKind::Append, "err.log".to_string()),
                (None, RedirectKind::OutErr, "both".to_string()),
                (None, RedirectKind::Clobber, "clob".to_string()),
                (Some(2), RedirectKind::Duplicate, "1".to_string()),
                (None, RedirectKind::In, "in.txt".to_string()),
            ]
        );
        assert_eq!(parsed.commands[0].words, vec!["cmd"]);
    }

    #[test]
    fn quoted_digits_are_not_fd_prefixes() {
        let parsed = parse("echo '2'>x");
        assert_eq!(parsed.commands[0].words, vec!["echo", "2"]);
        assert_eq!(parsed.commands[0].redirects[0].fd, None);
    }

    #[test]
    fn heredoc_bodies_are_not_parsed_as_commands() {
        let parsed = parse("cat <<'EOF' > notes.txt\nrm -rf / > x\nEOF\necho done");
        let programs: Vec<_> = parsed
            .commands
            .iter()
            .filter_map(SimpleCommand::program)
            .collect();
        assert_eq!(programs, vec!["cat", "echo"]);
        let redirects = &parsed.commands[0].redirects;
        assert_eq!(redirects[0].kind, RedirectKind::Heredoc);
        assert_eq!(redirects[0].target.as_deref(), Some("EOF"));
        assert_eq!(redirects[1].target.as_deref(), Some("notes.txt"));
        assert_eq!(redirects[0].body.as_deref(), Some("rm -rf / > x\n"));
    }

    #[test]
    fn stacked_heredocs_keep_their_own_bodies() {
        let parsed = parse("cat <<A; bash <<-'B'\none\nA\n\techo two\n\tB\nls");
        let bodies: Vec<_> = parsed
            .commands
            .iter()
            .flat_map(|command| &command.redirects)
            .map(|redirect| redirect.body.clone().unwrap_or_default())
            .collect();
        assert_eq!(bodies, vec!["one\n".to_string(), "\techo two\n".to_string()]);
        assert_eq!(parsed.commands.last().and_then(SimpleCommand::program), Some("ls"));

        let unterminated = parse("sh <<EOF\necho x > a.rb");
        assert_eq!(
            unterminated.commands[0].redirects[0].body.as_deref(),
            Some("echo x > a.rb")
        );
    }

    #[test]
    fn pipe_readers_are_marked() {
        let parsed = parse("echo 'ls' | sh; cat x && wc -l |& (tee y)");
        let piped: Vec<_> = parsed.commands.iter().map(|command| command.piped).collect();
        assert_eq!(piped, vec![false, true, false, false, true]);
    }

    #[test]
    fn substitutions_are_collected() {
        let parsed = parse("echo \"$(sed -i s/a/b/ f.rb)\" `touch x`");
        assert_eq!(
            parsed.substitutions,
            vec!["sed -i s/a/b/ f.rb".to_string(), "touch x".to_string()]
        );
    }

    #[test]
    fn program_skips_wrappers_and_assignments() {
        let parsed = parse("FOO=1 sudo -n env BAR=2 /usr/bin/sed -i s/x/y/ a.rb");
        let command = &parsed.commands[0];
        assert_eq!(command.program(), Some("sed"));
        assert_eq!(command.args()[0], "-i");
    }
}
