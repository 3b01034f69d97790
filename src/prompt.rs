use std::io::{self, BufRead, Write};

/// Capability for synchronously collecting input from the person driving the
/// sign-in, e.g. MFA verification codes.
pub trait Prompter {
    /// Block until the user supplies a non-empty string.
    fn string_required(&self, prompt: &str) -> String;
}

/// Prompter over stdin/stdout.
pub struct StdPrompter;

impl Prompter for StdPrompter {
    fn string_required(&self, prompt: &str) -> String {
        let stdin = io::stdin();
        let mut text = String::new();
        while text.trim().is_empty() {
            print!("{}: ", prompt);
            let _ = io::stdout().flush();
            text.clear();
            if stdin.lock().read_line(&mut text).unwrap_or(0) == 0 {
                break;
            }
        }
        text.trim().to_string()
    }
}
