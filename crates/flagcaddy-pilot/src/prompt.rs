//! Environment that makes the wrapped shell's prompt end in the sentinel.
//!
//! The recorder only sees a command as finished when the sentinel shows up in
//! the output stream, so the child's prompt must end with it and nothing else
//! may print it mid-command.

use std::path::Path;

use flagcaddy_types::SessionName;

/// Variable exported to the child naming the flagcaddy session.
pub const SESSION_ENV: &str = "FLAGCADDY_SESSION";

/// Variable exported to the child holding the raw sentinel.
pub const SENTINEL_ENV: &str = "FLAGCADDY_SENTINEL";

/// Shell families with different prompt-escape syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Bash,
    Zsh,
    Other,
}

impl ShellKind {
    /// Classify by the program's file name.
    pub fn detect(program: &str) -> Self {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program)
            .trim_start_matches('-');
        match name {
            "bash" => ShellKind::Bash,
            "zsh" => ShellKind::Zsh,
            _ => ShellKind::Other,
        }
    }
}

/// Variables to set and remove in the child's environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildEnv {
    pub set: Vec<(String, String)>,
    pub unset: Vec<String>,
}

impl ChildEnv {
    /// Look up a variable this env sets.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.set
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Build the child environment for wrapping `program`.
pub fn prompt_env(program: &str, sentinel: &str, session: &SessionName) -> ChildEnv {
    let mut env = ChildEnv::default();
    env.set.push((SESSION_ENV.into(), session.to_string()));
    env.set.push((SENTINEL_ENV.into(), sentinel.into()));

    match ShellKind::detect(program) {
        ShellKind::Bash => {
            let marker = format!("\\[{}\\]", sentinel.replace('\\', "\\\\"));
            env.set
                .push(("PS1".into(), format!("\\u@\\h:\\w\\$ {marker}")));
            // rc files often replace PS1; put the marker back before each
            // prompt without ever printing it.
            env.set.push((
                "PROMPT_COMMAND".into(),
                format!(
                    "case \"$PS1\" in *\"${SENTINEL_ENV}\"*) ;; *) PS1=\"$PS1\\[${SENTINEL_ENV}\\]\" ;; esac"
                ),
            ));
        }
        ShellKind::Zsh => {
            let marker = format!("%{{{}%}}", sentinel.replace('%', "%%"));
            env.set.push(("PS1".into(), format!("%n@%m:%~%# {marker}")));
            env.unset.push("PROMPT_COMMAND".into());
            env.unset.push("RPROMPT".into());
        }
        ShellKind::Other => {
            env.set.push(("PS1".into(), format!("$ {sentinel}")));
            env.unset.push("PROMPT_COMMAND".into());
        }
    }

    env
}
