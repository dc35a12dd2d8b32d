/// One CoLa-A telegram: a command type, a command name and its parameters.
///
/// On the wire this is `<STX>sRN LMPscancfg<ETX>`, i.e. the tokens joined by single spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Command type such as `sRN`, `sMN`, `sAN` or `sSN`.
    pub kind: String,

    /// Command name such as `LMPscancfg`.
    pub name: String,

    /// Remaining space separated parameters, kept as raw ASCII tokens.
    pub params: Vec<String>,
}

impl Message {
    /// Creates a new message without parameters.
    ///
    /// # Arguments
    ///
    /// * `kind` - The command type, e.g. `sRN`.
    /// * `name` - The command name, e.g. `LMPscancfg`.
    pub fn new(kind: &str, name: &str) -> Message {
        Message::with_params::<&str>(kind, name, &[])
    }

    /// Creates a new message with parameters.
    #[inline]
    pub fn with_params<S: AsRef<str>>(kind: &str, name: &str, params: &[S]) -> Message {
        Message {
            kind: kind.to_owned(),
            name: name.to_owned(),
            params: params.iter().map(|p| p.as_ref().to_owned()).collect(),
        }
    }

    /// Splits a telegram body (without framing bytes) into a message.
    ///
    /// Returns `None` when the body has fewer than two tokens.
    pub fn parse(body: &str) -> Option<Message> {
        let mut tokens = body.split_ascii_whitespace();
        let kind = tokens.next()?;
        let name = tokens.next()?;
        Some(Message {
            kind: kind.to_owned(),
            name: name.to_owned(),
            params: tokens.map(str::to_owned).collect(),
        })
    }

    /// The telegram body as sent on the wire (without framing bytes).
    pub fn body(&self) -> String {
        let mut body = format!("{} {}", self.kind, self.name);
        for param in &self.params {
            body.push(' ');
            body.push_str(param);
        }
        body
    }
}
