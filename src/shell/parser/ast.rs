use std::fmt;

/// A parsed line (or the inside of a `( ... )` group): pipelines joined by
/// `;`, `&`, `&&` and `||`, executed in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandList {
    pub entries: Vec<ListEntry>,
}

impl CommandList {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One element of a list together with the separator that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub pipeline: Pipeline,
    pub link: Link,
}

impl ListEntry {
    pub fn is_background(&self) -> bool {
        self.link == Link::Background
    }
}

/// How an entry hands control to the entry after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Link {
    /// `;` or end of list
    #[default]
    Sequential,
    /// `&`
    Background,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Stages connected by `|`. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Simple(SimpleCommand),
    Group(CommandList),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleCommand {
    /// Program name first, never empty.
    pub argv: Vec<String>,
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub append: bool,
}

impl SimpleCommand {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn arguments(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    let plain = !word.is_empty()
        && !word
            .chars()
            .any(|c| c.is_whitespace() || "\"'\\#;&|()<>".contains(c));
    if plain {
        return f.write_str(word);
    }
    f.write_str("'")?;
    for c in word.chars() {
        if c == '\'' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("'")
}

impl fmt::Display for SimpleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.argv.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write_word(f, arg)?;
        }
        if let Some(input) = &self.input_file {
            f.write_str(" < ")?;
            write_word(f, input)?;
        }
        if let Some(output) = &self.output_file {
            f.write_str(if self.append { " >> " } else { " > " })?;
            write_word(f, output)?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Simple(simple) => write!(f, "{simple}"),
            Command::Group(list) => write!(f, "({list})"),
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.entries.len().saturating_sub(1);
        for (i, entry) in self.entries.iter().enumerate() {
            write!(f, "{}", entry.pipeline)?;
            let sep = match entry.link {
                Link::Sequential if i == last => "",
                Link::Sequential => " ;",
                Link::Background => " &",
                Link::And => " &&",
                Link::Or => " ||",
            };
            f.write_str(sep)?;
            if i != last {
                f.write_str(" ")?;
            }
        }
        Ok(())
    }
}
