//! Shell quoting of file-name tokens.

/// Turns a single token into text safe to splice into a shell command line.
pub trait Escape: Send + Sync {
    fn escape(&self, token: &str) -> String;
}

/// POSIX `sh`: wrap in single quotes, splicing each embedded quote as `'\''`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixEscape;

impl Escape for PosixEscape {
    fn escape(&self, token: &str) -> String {
        let mut out = String::with_capacity(token.len() + 2);
        out.push('\'');
        for c in token.chars() {
            if c == '\'' {
                out.push_str("'\\''");
            } else {
                out.push(c);
            }
        }
        out.push('\'');
        out
    }
}

/// `cmd.exe`: double-quote the token only when it contains a space.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsQuote;

impl Escape for WindowsQuote {
    fn escape(&self, token: &str) -> String {
        if token.contains(' ') {
            format!("\"{token}\"")
        } else {
            token.to_string()
        }
    }
}
