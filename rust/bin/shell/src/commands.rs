//! Shell command parsing.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Navigate to a route.
    Go(String),
    Back,
    /// Re-run the current route (the error view's retry button).
    Retry,
    /// The error view's home button.
    Home,
    Get(String),
    /// Set a key; the value is parsed as JSON, falling back to a string.
    Set(String, Value),
    Delete(String),
    Keys,
    History,
    Lang(String),
    Ask(String),
    /// Select a region, or clear the selection.
    Region(Option<String>),
    /// Press a key chord, e.g. `alt+d`.
    Key(String),
    Online,
    Offline,
    Notes,
    Dismiss(u64),
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let need = |what: &str| -> Result<String, String> {
            if rest.is_empty() {
                Err(format!("usage: {} <{}>", verb, what))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match verb {
            "go" => Command::Go(need("path")?),
            "back" => Command::Back,
            "retry" => Command::Retry,
            "home" => Command::Home,
            "get" => Command::Get(need("key")?),
            "set" => {
                let rest = need("key> <value")?;
                let (key, raw) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: set <key> <value>".to_string())?;
                let raw = raw.trim();
                let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
                Command::Set(key.to_string(), value)
            }
            "del" | "delete" => Command::Delete(need("key")?),
            "keys" => Command::Keys,
            "history" => Command::History,
            "lang" => Command::Lang(need("language")?),
            "ask" => Command::Ask(need("question")?),
            "region" => Command::Region((!rest.is_empty()).then(|| rest.to_string())),
            "key" => Command::Key(need("chord")?),
            "online" => Command::Online,
            "offline" => Command::Offline,
            "notes" => Command::Notes,
            "dismiss" => {
                let id = need("id")?;
                Command::Dismiss(id.parse().map_err(|_| format!("not a notification id: {}", id))?)
            }
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            "" => return Err(String::new()),
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
go <path>          navigate (/, /dashboard, /chat, /explorer, /profiles)
back               previous route
retry | home       error view actions
get <key>          print a state value
set <key> <json>   set a state value
del <key>          delete a state value
keys | history     list keys / recent changes
lang <code>        switch language (en, hi, bn, ta, te)
ask <question>     query the ARGO agent
region [name]      select a region for profiles
key <chord>        press a shortcut, e.g. alt+d
online | offline   simulate connectivity changes
notes | dismiss <id>
status             route and connection summary
quit";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_navigation() {
        assert_eq!(Command::parse("go /chat"), Ok(Command::Go("/chat".into())));
        assert_eq!(Command::parse("  back "), Ok(Command::Back));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn parse_set_json_or_string() {
        assert_eq!(
            Command::parse(r#"set filters {"region": "arabian_sea"}"#),
            Ok(Command::Set("filters".into(), json!({"region": "arabian_sea"})))
        );
        assert_eq!(
            Command::parse("set theme dark mode"),
            Ok(Command::Set("theme".into(), json!("dark mode")))
        );
        assert_eq!(
            Command::parse("set count 3"),
            Ok(Command::Set("count".into(), json!(3)))
        );
    }

    #[test]
    fn parse_optional_and_required_arguments() {
        assert_eq!(Command::parse("region"), Ok(Command::Region(None)));
        assert_eq!(
            Command::parse("region bay_of_bengal"),
            Ok(Command::Region(Some("bay_of_bengal".into())))
        );
        assert_eq!(Command::parse("go"), Err("usage: go <path>".to_string()));
        assert!(Command::parse("set theme").is_err());
        assert!(Command::parse("dismiss x").is_err());
        assert_eq!(Command::parse("dismiss 4"), Ok(Command::Dismiss(4)));
    }

    #[test]
    fn unknown_command() {
        assert!(Command::parse("launch").unwrap_err().contains("unknown command"));
    }
}
